use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::rbac::Role;

pub const FALLBACK_INVITER_NAME: &str = "Someone";
pub const FALLBACK_ORG_NAME: &str = "the organization";

/// Payload handed to the notification sender for one invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationEmail {
    pub to: String,
    pub inviter_name: String,
    pub org_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub role: Role,
    pub acceptance_url: String,
}

/// Delivers invitation emails. Implementations report success or failure
/// only; delivery status beyond that is not tracked.
#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    async fn send_invitation(&self, email: &InvitationEmail) -> Result<()>;
}

pub type InvitationNotifierRef = Arc<dyn InvitationNotifier>;

/// Result of the delivery attempt that follows a persisted invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed(String),
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationOutcome::Sent)
    }
}

/// `{base}/invite/{token}`, tolerating a trailing slash on `base`.
pub fn acceptance_url(app_base_url: &str, token: &str) -> String {
    format!("{}/invite/{token}", app_base_url.trim_end_matches('/'))
}
