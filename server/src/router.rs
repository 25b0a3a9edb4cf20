// Router configuration

use axum::{
    Router,
    http::Method,
    routing::{delete, get, patch, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        auth_handlers::*, health_handlers::*, invitation_handlers::*, org_handlers::*,
        project_handlers::*,
    },
    observability,
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let prefix = state.server_path.clone();
    let router = build_base_router(state);
    if let Some(path) = prefix {
        Router::new().nest(&path, router)
    } else {
        router
    }
}

fn build_base_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        // Health & Info
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        // Authentication
        .route("/api/auth/sign-up", post(sign_up_handler))
        .route("/api/auth/sign-in", post(sign_in_handler))
        .route("/api/auth/sign-out", post(sign_out_handler))
        .route("/api/auth/session", get(get_session_handler))
        .route("/api/me", patch(update_profile_handler))
        .route("/api/me/password", patch(change_password_handler))
        .route("/api/roles", get(list_roles_handler))
        // Organizations
        .route(
            "/api/orgs",
            get(list_organizations_handler).post(create_organization_handler),
        )
        .route(
            "/api/orgs/by-slug/{slug}",
            get(get_organization_by_slug_handler),
        )
        .route(
            "/api/orgs/{org_id}",
            get(get_organization_handler)
                .patch(update_organization_handler)
                .delete(delete_organization_handler),
        )
        .route("/api/orgs/{org_id}/members", get(list_members_handler))
        .route(
            "/api/orgs/{org_id}/members/{user_id}",
            patch(update_member_role_handler).delete(remove_member_handler),
        )
        .route("/api/orgs/{org_id}/leave", post(leave_organization_handler))
        // Projects
        .route(
            "/api/orgs/{org_id}/projects",
            get(list_projects_handler).post(create_project_handler),
        )
        .route(
            "/api/orgs/{org_id}/projects/{project_id}",
            get(get_project_handler)
                .patch(update_project_handler)
                .delete(delete_project_handler),
        )
        .route(
            "/api/orgs/{org_id}/projects/{project_id}/members",
            get(list_project_members_handler),
        )
        .route(
            "/api/orgs/{org_id}/projects/{project_id}/members/{user_id}",
            patch(update_project_member_role_handler).delete(remove_project_member_handler),
        )
        // Invitations
        .route(
            "/api/orgs/{org_id}/invitations",
            get(list_invitations_handler).post(create_invitation_handler),
        )
        .route(
            "/api/orgs/{org_id}/invitations/{invitation_id}",
            delete(revoke_invitation_handler),
        )
        .route(
            "/api/orgs/{org_id}/invitations/{invitation_id}/resend",
            post(resend_invitation_handler),
        )
        .route("/api/invitations/{token}", get(get_invitation_handler))
        .route(
            "/api/invitations/{token}/accept",
            post(accept_invitation_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(observability::request_id_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{body_json, setup_state};

    #[tokio::test]
    async fn health_route_responds() {
        let (_temp_dir, _database, state) = setup_state().await;
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sign_up_then_list_organizations_over_http() {
        let (_temp_dir, _database, state) = setup_state().await;
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/sign-up")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "email": "grace@example.com",
                            "password": "long password",
                            "fullName": "Grace Hopper"
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .expect("session cookie")
            .to_owned();
        assert_eq!(body_json(response).await["orgSlug"], "grace-hopper");

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/orgs")
                    .header(header::COOKIE, cookie.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["slug"], "grace-hopper");
        assert_eq!(json[0]["role"], "owner");
        let org_id = json[0]["id"].clone();

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/orgs/by-slug/grace-hopper")
                    .header(header::COOKIE, cookie.as_str())
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], org_id);
    }

    #[tokio::test]
    async fn role_table_is_public() {
        let (_temp_dir, _database, state) = setup_state().await;
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/roles")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().map(Vec::len), Some(3));
        assert_eq!(json[0]["value"], "admin");
    }

    #[tokio::test]
    async fn unknown_invitation_is_public() {
        let (_temp_dir, _database, state) = setup_state().await;
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/invitations/nope")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["screen"], "not_found");
    }
}
