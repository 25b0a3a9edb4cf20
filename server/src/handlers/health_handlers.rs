// Health check and info endpoints

use axum::{Json, extract::State, response::IntoResponse};

use crate::{state::AppState, types::HealthResponse};

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn info_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metadata.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, setup_state};

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health_handler().await.into_response();
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn info_reports_version() {
        let (_temp_dir, _database, state) = setup_state().await;
        let response = info_handler(State(state)).await.into_response();
        assert_eq!(
            body_json(response).await["version"],
            env!("CARGO_PKG_VERSION")
        );
    }
}
