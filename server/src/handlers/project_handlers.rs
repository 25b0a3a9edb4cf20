// Project handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use orgkit_core::project::ProjectUpdate;

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    handlers::org_handlers::parse_role,
    http::{json_with_cookies, no_content_with_cookies},
    state::AppState,
    types::{
        CreateProjectRequest, ProjectMemberResponse, ProjectResponse, UpdateMemberRoleRequest,
        UpdateProjectRequest,
    },
};

pub(crate) async fn list_projects_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let projects = state
        .project_service
        .list_projects(&org_id, &auth.user.id)
        .await?;

    let body: Vec<ProjectResponse> = projects.into_iter().map(ProjectResponse::from).collect();
    json_with_cookies(StatusCode::OK, body, &auth.set_cookies)
}

pub(crate) async fn create_project_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let project = state
        .project_service
        .create_project(
            &org_id,
            &auth.user.id,
            &payload.name,
            payload.description.as_deref(),
        )
        .await?;

    json_with_cookies(
        StatusCode::CREATED,
        ProjectResponse::from(project),
        &auth.set_cookies,
    )
}

pub(crate) async fn get_project_handler(
    Path((org_id, project_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let project = state
        .project_service
        .fetch_project(&org_id, &project_id, &auth.user.id)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        ProjectResponse::from(project),
        &auth.set_cookies,
    )
}

pub(crate) async fn update_project_handler(
    Path((org_id, project_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let UpdateProjectRequest { name, description } = payload;
    let description = description.map(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    });

    let project = state
        .project_service
        .update_project(
            &org_id,
            &project_id,
            &auth.user.id,
            ProjectUpdate { name, description },
        )
        .await?;

    json_with_cookies(
        StatusCode::OK,
        ProjectResponse::from(project),
        &auth.set_cookies,
    )
}

pub(crate) async fn delete_project_handler(
    Path((org_id, project_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .project_service
        .delete_project(&org_id, &project_id, &auth.user.id)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}

pub(crate) async fn list_project_members_handler(
    Path((org_id, project_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let members = state
        .project_service
        .list_project_members(&org_id, &project_id, &auth.user.id)
        .await?;

    let body: Vec<ProjectMemberResponse> = members
        .into_iter()
        .map(ProjectMemberResponse::from)
        .collect();
    json_with_cookies(StatusCode::OK, body, &auth.set_cookies)
}

pub(crate) async fn update_project_member_role_handler(
    Path((org_id, project_id, user_id)): Path<(String, String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let role = parse_role(&payload.role)?;
    let member = state
        .project_service
        .update_project_member_role(&org_id, &project_id, &auth.user.id, &user_id, role)
        .await?;

    json_with_cookies(
        StatusCode::OK,
        ProjectMemberResponse::from(member),
        &auth.set_cookies,
    )
}

pub(crate) async fn remove_project_member_handler(
    Path((org_id, project_id, user_id)): Path<(String, String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .project_service
        .remove_project_member(&org_id, &project_id, &auth.user.id, &user_id)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, setup_state, sign_up_user};

    async fn personal_org_id(state: &AppState, headers: &HeaderMap) -> String {
        let auth = authenticate_rest_request(state, headers)
            .await
            .expect("authenticated");
        let orgs = state
            .organization_service
            .list_for_user(&auth.user.id)
            .await
            .expect("list orgs");
        orgs[0].organization.id.to_string()
    }

    #[tokio::test]
    async fn default_project_is_listed_first_and_undeletable() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, headers) = sign_up_user(&state, "alice@example.com", None).await;
        let org_id = personal_org_id(&state, &headers).await;

        let response = create_project_handler(
            Path(org_id.clone()),
            State(state.clone()),
            headers.clone(),
            Json(CreateProjectRequest {
                name: "Website Redesign".into(),
                description: Some("  Q3 refresh ".into()),
            }),
        )
        .await
        .expect("create project");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["slug"], "website-redesign");
        assert_eq!(created["description"], "Q3 refresh");
        assert_eq!(created["isDefault"], false);

        let response = list_projects_handler(
            Path(org_id.clone()),
            State(state.clone()),
            headers.clone(),
        )
        .await
        .expect("list projects");
        let json = body_json(response).await;
        let projects = json.as_array().expect("array");
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0]["slug"], "default");
        assert_eq!(projects[0]["isDefault"], true);

        let default_id = projects[0]["id"].as_str().expect("id").to_owned();
        let err = delete_project_handler(Path((org_id, default_id)), State(state), headers)
            .await
            .expect_err("default project is kept");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_clears_description_and_keeps_slug() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, headers) = sign_up_user(&state, "alice@example.com", None).await;
        let org_id = personal_org_id(&state, &headers).await;

        let response = create_project_handler(
            Path(org_id.clone()),
            State(state.clone()),
            headers.clone(),
            Json(CreateProjectRequest {
                name: "Docs".into(),
                description: Some("Guides".into()),
            }),
        )
        .await
        .expect("create project");
        let project_id = body_json(response).await["id"]
            .as_str()
            .expect("id")
            .to_owned();

        let response = update_project_handler(
            Path((org_id.clone(), project_id.clone())),
            State(state.clone()),
            headers.clone(),
            Json(UpdateProjectRequest {
                name: Some("Handbook".into()),
                description: Some("   ".into()),
            }),
        )
        .await
        .expect("update project");
        let json = body_json(response).await;
        assert_eq!(json["name"], "Handbook");
        assert_eq!(json["slug"], "docs");
        assert!(json.get("description").is_none());

        let response = list_project_members_handler(
            Path((org_id.clone(), project_id.clone())),
            State(state.clone()),
            headers.clone(),
        )
        .await
        .expect("project members");
        let members = body_json(response).await;
        assert_eq!(members[0]["role"], "owner");

        let response = delete_project_handler(Path((org_id, project_id)), State(state), headers)
            .await
            .expect("delete project");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn outsiders_cannot_list_projects() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (_alice, alice_headers) = sign_up_user(&state, "alice@example.com", None).await;
        let (_eve, eve_headers) = sign_up_user(&state, "eve@example.com", None).await;
        let org_id = personal_org_id(&state, &alice_headers).await;

        let err = list_projects_handler(Path(org_id), State(state), eve_headers)
            .await
            .expect_err("not a member");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
