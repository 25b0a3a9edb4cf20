#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::to_bytes;
use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use axum::response::Response;
use orgkit_core::{
    config::AppConfig,
    db::Database,
    notification::{InvitationEmail, InvitationNotifier, InvitationNotifierRef},
    user::UserRecord,
};
use serde_json::Value as JsonValue;
use tempfile::TempDir;
use tokio::sync::Mutex;

use crate::{
    cookies::SESSION_COOKIE_NAME,
    state::{AppState, StateBuildConfig, build_state, build_state_with_config},
};

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<InvitationEmail>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) async fn sent(&self) -> Vec<InvitationEmail> {
        self.sent.lock().await.clone()
    }

    pub(crate) fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl InvitationNotifier for RecordingNotifier {
    async fn send_invitation(&self, email: &InvitationEmail) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mailer unavailable"));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

fn test_config(temp_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    let db_path = temp_dir.path().join("test.db");
    config.database_path = db_path.to_string_lossy().into_owned();
    config.database_max_connections = 4;
    config.app_base_url = "http://app.test".to_owned();
    config
}

pub(crate) async fn setup_state() -> (TempDir, Database, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let config = test_config(&temp_dir);
    let database = Database::connect(&config).await.expect("connect database");
    let state = build_state(&database, &config).expect("build state");
    (temp_dir, database, state)
}

pub(crate) async fn setup_state_with_notifier()
-> (TempDir, Database, AppState, Arc<RecordingNotifier>) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let config = test_config(&temp_dir);
    let database = Database::connect(&config).await.expect("connect database");
    let notifier = Arc::new(RecordingNotifier::default());
    let state = build_state_with_config(
        &database,
        &config,
        StateBuildConfig {
            notifier: Some(notifier.clone() as InvitationNotifierRef),
        },
    )
    .expect("build state");
    (temp_dir, database, state, notifier)
}

pub(crate) fn session_headers(session_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("{SESSION_COOKIE_NAME}={session_id}"))
            .expect("cookie header"),
    );
    headers
}

/// Registers an account (with its personal organization) and returns it
/// with request headers carrying its session.
pub(crate) async fn sign_up_user(
    state: &AppState,
    email: &str,
    full_name: Option<&str>,
) -> (UserRecord, HeaderMap) {
    let registration = state
        .user_service
        .sign_up(email, "long password", full_name)
        .await
        .expect("sign up");
    let headers = session_headers(&registration.session.id);
    (registration.user, headers)
}

pub(crate) async fn body_json(response: Response) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
