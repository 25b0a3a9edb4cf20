// Organization and membership handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use orgkit_core::{
    Role, TenancyError,
    organization::{OrgType, OrganizationUpdate},
    rbac::ASSIGNABLE_ROLES,
};

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    http::{json_with_cookies, no_content_with_cookies},
    state::AppState,
    types::{
        CreateOrganizationRequest, MemberResponse, OrganizationResponse, RoleResponse,
        UpdateMemberRoleRequest, UpdateOrganizationRequest,
    },
};

pub(crate) fn parse_role(value: &str) -> Result<Role, AppError> {
    value
        .parse::<Role>()
        .map_err(|err| AppError::from(TenancyError::from(err)))
}

/// Roles a member can be given, most privileged first.
pub(crate) async fn list_roles_handler() -> Json<Vec<RoleResponse>> {
    Json(ASSIGNABLE_ROLES.into_iter().map(RoleResponse::from).collect())
}

pub(crate) async fn list_organizations_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let organizations = state
        .organization_service
        .list_for_user(&auth.user.id)
        .await?;

    let body: Vec<OrganizationResponse> = organizations
        .into_iter()
        .map(OrganizationResponse::from)
        .collect();
    json_with_cookies(StatusCode::OK, body, &auth.set_cookies)
}

pub(crate) async fn create_organization_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let organization = state
        .organization_service
        .create_organization(&auth.user.id, &payload.name, OrgType::Team)
        .await?;

    json_with_cookies(
        StatusCode::CREATED,
        OrganizationResponse::with_role(organization, Some(Role::Owner)),
        &auth.set_cookies,
    )
}

pub(crate) async fn get_organization_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let organization = state
        .organization_service
        .fetch_organization(&org_id, &auth.user.id)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        OrganizationResponse::from(organization),
        &auth.set_cookies,
    )
}

pub(crate) async fn get_organization_by_slug_handler(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let organization = state
        .organization_service
        .fetch_by_slug(slug.trim(), &auth.user.id)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        OrganizationResponse::from(organization),
        &auth.set_cookies,
    )
}

pub(crate) async fn update_organization_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateOrganizationRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let UpdateOrganizationRequest {
        name,
        avatar_url,
        remove_avatar,
    } = payload;
    let avatar_url = if remove_avatar.unwrap_or(false) {
        Some(None)
    } else {
        avatar_url.map(|value| Some(value.trim().to_owned()))
    };

    let organization = state
        .organization_service
        .update_organization(
            &org_id,
            &auth.user.id,
            OrganizationUpdate { name, avatar_url },
        )
        .await?;

    json_with_cookies(
        StatusCode::OK,
        OrganizationResponse::with_role(organization, None),
        &auth.set_cookies,
    )
}

pub(crate) async fn delete_organization_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .organization_service
        .delete_organization(&org_id, &auth.user.id)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}

pub(crate) async fn list_members_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let members = state
        .organization_service
        .list_members(&org_id, &auth.user.id)
        .await?;

    let body: Vec<MemberResponse> = members.into_iter().map(MemberResponse::from).collect();
    json_with_cookies(StatusCode::OK, body, &auth.set_cookies)
}

pub(crate) async fn update_member_role_handler(
    Path((org_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let role = parse_role(&payload.role)?;
    let member = state
        .organization_service
        .update_member_role(&org_id, &auth.user.id, &user_id, role)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        MemberResponse::from(member),
        &auth.set_cookies,
    )
}

pub(crate) async fn remove_member_handler(
    Path((org_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .organization_service
        .remove_member(&org_id, &auth.user.id, &user_id)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}

pub(crate) async fn leave_organization_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .organization_service
        .leave_organization(&org_id, &auth.user.id)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, setup_state, sign_up_user};
    use serde_json::Value as JsonValue;

    async fn create_team(state: &AppState, headers: &HeaderMap, name: &str) -> JsonValue {
        let response = create_organization_handler(
            State(state.clone()),
            headers.clone(),
            Json(CreateOrganizationRequest { name: name.into() }),
        )
        .await
        .expect("create organization");
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn anonymous_requests_are_rejected() {
        let (_temp_dir, _database, state) = setup_state().await;
        let err = list_organizations_handler(State(state), HeaderMap::new())
            .await
            .expect_err("no session");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_and_list_organizations() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, headers) = sign_up_user(&state, "alice@example.com", Some("Alice")).await;

        let created = create_team(&state, &headers, "Acme").await;
        assert_eq!(created["slug"], "acme");
        assert_eq!(created["type"], "team");
        assert_eq!(created["role"], "owner");

        let second = create_team(&state, &headers, "Acme").await;
        assert_eq!(second["slug"], "acme-1");

        let response = list_organizations_handler(State(state), headers)
            .await
            .expect("list");
        let json = body_json(response).await;
        let list = json.as_array().expect("array");
        assert_eq!(list.len(), 3);
        assert_eq!(list[0]["type"], "personal");
    }

    #[tokio::test]
    async fn assignable_roles_are_listed_without_owner() {
        let Json(roles) = list_roles_handler().await;
        let values: Vec<Role> = roles.iter().map(|role| role.value).collect();
        assert_eq!(values, [Role::Admin, Role::Member, Role::Viewer]);
        assert_eq!(roles[0].label, "Admin");
        assert!(roles.iter().all(|role| !role.description.is_empty()));
    }

    #[tokio::test]
    async fn organization_is_found_by_slug_for_members_only() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, alice_headers) = sign_up_user(&state, "alice@example.com", None).await;
        let (_mallory, mallory_headers) =
            sign_up_user(&state, "mallory@example.com", None).await;
        let created = create_team(&state, &alice_headers, "Acme").await;

        let response = get_organization_by_slug_handler(
            Path("acme".into()),
            State(state.clone()),
            alice_headers.clone(),
        )
        .await
        .expect("lookup by slug");
        let json = body_json(response).await;
        assert_eq!(json["id"], created["id"]);
        assert_eq!(json["role"], "owner");

        let err = get_organization_by_slug_handler(
            Path("acme".into()),
            State(state.clone()),
            mallory_headers,
        )
        .await
        .expect_err("outsider");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = get_organization_by_slug_handler(
            Path("missing".into()),
            State(state),
            alice_headers,
        )
        .await
        .expect_err("unknown slug");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_keeps_slug() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, headers) = sign_up_user(&state, "alice@example.com", None).await;
        let created = create_team(&state, &headers, "Acme").await;
        let org_id = created["id"].as_str().expect("id").to_owned();

        let response = update_organization_handler(
            Path(org_id),
            State(state),
            headers,
            Json(UpdateOrganizationRequest {
                name: Some("Acme Corp".into()),
                ..Default::default()
            }),
        )
        .await
        .expect("update");
        let json = body_json(response).await;
        assert_eq!(json["name"], "Acme Corp");
        assert_eq!(json["slug"], "acme");
    }

    #[tokio::test]
    async fn outsiders_see_not_found() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, alice_headers) = sign_up_user(&state, "alice@example.com", None).await;
        let (_mallory, mallory_headers) =
            sign_up_user(&state, "mallory@example.com", None).await;
        let created = create_team(&state, &alice_headers, "Acme").await;
        let org_id = created["id"].as_str().expect("id").to_owned();

        let err = list_members_handler(
            Path(org_id.clone()),
            State(state.clone()),
            mallory_headers.clone(),
        )
        .await
        .expect_err("not a member");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = delete_organization_handler(Path(org_id), State(state), mallory_headers)
            .await
            .expect_err("not a member");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn member_role_changes_and_owner_protection() {
        let (_temp_dir, database, state) = setup_state().await;
        let (alice, alice_headers) = sign_up_user(&state, "alice@example.com", None).await;
        let (bob, bob_headers) = sign_up_user(&state, "bob@example.com", None).await;
        let created = create_team(&state, &alice_headers, "Acme").await;
        let org_id = created["id"].as_str().expect("id").to_owned();

        sqlx::query(
            "INSERT INTO organization_members (org_id, user_id, role, created_at) VALUES (?, ?, 'member', 0)",
        )
        .bind(&org_id)
        .bind(bob.id.as_str())
        .execute(database.pool())
        .await
        .expect("add bob");

        let response = update_member_role_handler(
            Path((org_id.clone(), bob.id.to_string())),
            State(state.clone()),
            alice_headers.clone(),
            Json(UpdateMemberRoleRequest {
                role: "admin".into(),
            }),
        )
        .await
        .expect("promote bob");
        assert_eq!(body_json(response).await["role"], "admin");

        let err = update_member_role_handler(
            Path((org_id.clone(), bob.id.to_string())),
            State(state.clone()),
            alice_headers.clone(),
            Json(UpdateMemberRoleRequest {
                role: "superuser".into(),
            }),
        )
        .await
        .expect_err("unknown role");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = remove_member_handler(
            Path((org_id.clone(), alice.id.to_string())),
            State(state.clone()),
            bob_headers.clone(),
        )
        .await
        .expect_err("owner cannot be removed");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = delete_organization_handler(
            Path(org_id.clone()),
            State(state.clone()),
            bob_headers.clone(),
        )
        .await
        .expect_err("admin cannot delete");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let response =
            leave_organization_handler(Path(org_id.clone()), State(state.clone()), bob_headers)
                .await
                .expect("bob leaves");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = list_members_handler(Path(org_id), State(state), alice_headers)
            .await
            .expect("members");
        let json = body_json(response).await;
        let members = json.as_array().expect("array");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["role"], "owner");
        assert_eq!(members[0]["email"], "alice@example.com");
    }
}
