use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::TempDir;

use crate::{
    config::AppConfig,
    db::Database,
    ids::{InvitationId, OrgId, ProjectId, UserId},
    notification::{InvitationEmail, InvitationNotifier},
    rbac::Role,
    user::UserStore,
};

pub(crate) async fn setup_database() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let config = AppConfig {
        database_path: temp_dir
            .path()
            .join("orgkit.db")
            .to_string_lossy()
            .into_owned(),
        database_max_connections: 4,
        ..AppConfig::default()
    };
    let database = Database::connect(&config).await.expect("connect database");
    (temp_dir, database)
}

pub(crate) async fn insert_user(database: &Database, email: &str) -> UserId {
    UserStore::new(database)
        .create(email, "not-a-real-hash", None)
        .await
        .expect("insert user")
        .id
}

pub(crate) async fn add_member(database: &Database, org_id: &OrgId, user_id: &UserId, role: Role) {
    sqlx::query(
        "INSERT INTO organization_members (org_id, user_id, role, created_at) VALUES (?, ?, ?, 0)",
    )
    .bind(org_id.as_str())
    .bind(user_id.as_str())
    .bind(role.as_str())
    .execute(database.pool())
    .await
    .expect("insert membership");
}

pub(crate) async fn add_project_member(
    database: &Database,
    project_id: &ProjectId,
    user_id: &UserId,
    role: Role,
) {
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role, created_at) VALUES (?, ?, ?, 0)",
    )
    .bind(project_id.as_str())
    .bind(user_id.as_str())
    .bind(role.as_str())
    .execute(database.pool())
    .await
    .expect("insert project membership");
}

/// Moves the invitation's deadline into the past.
pub(crate) async fn expire_invitation(database: &Database, invitation_id: &InvitationId) {
    sqlx::query("UPDATE invitations SET expires_at = created_at - 1 WHERE id = ?")
        .bind(invitation_id.as_str())
        .execute(database.pool())
        .await
        .expect("expire invitation");
}

pub(crate) async fn count_rows(database: &Database, table: &str, org_id: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE org_id = ?"))
        .bind(org_id)
        .fetch_one(database.pool())
        .await
        .expect("count rows")
}

/// Captures delivered invitation emails; can be switched to fail.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<InvitationEmail>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<InvitationEmail> {
        self.sent.lock().expect("notifier lock").clone()
    }

    pub(crate) fn fail_next_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl InvitationNotifier for RecordingNotifier {
    async fn send_invitation(&self, email: &InvitationEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mail provider unavailable"));
        }
        self.sent.lock().expect("notifier lock").push(email.clone());
        Ok(())
    }
}
