use std::env;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use serde::Serialize;

use orgkit_core::{
    config::AppConfig,
    db::Database,
    invitation::InvitationService,
    notification::InvitationNotifierRef,
    organization::OrganizationService,
    project::ProjectService,
    user::UserStore,
};

use crate::{mailer::build_notifier, user::service::UserService};

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub user_store: UserStore,
    pub user_service: Arc<UserService>,
    pub organization_service: Arc<OrganizationService>,
    pub project_service: Arc<ProjectService>,
    pub invitation_service: Arc<InvitationService>,
    pub metadata: ServerMetadata,
    pub server_path: Option<String>,
}

/// Overrides applied while assembling [`AppState`].
#[derive(Clone, Default)]
pub struct StateBuildConfig {
    /// Replaces the notifier derived from the mailer configuration.
    pub notifier: Option<InvitationNotifierRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub message: String,
}

impl ServerMetadata {
    pub fn load() -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        let message = env::var("ORGKIT_SERVER_MESSAGE")
            .unwrap_or_else(|_| format!("orgkit {version} server"));

        Self { version, message }
    }
}

pub fn build_state(database: &Database, app_config: &AppConfig) -> AnyResult<AppState> {
    build_state_with_config(database, app_config, StateBuildConfig::default())
}

pub fn build_state_with_config(
    database: &Database,
    app_config: &AppConfig,
    config: StateBuildConfig,
) -> AnyResult<AppState> {
    let notifier = match config.notifier {
        Some(notifier) => notifier,
        None => build_notifier(&app_config.mailer)?,
    };

    let user_store = UserStore::new(database);
    let organization_service = Arc::new(OrganizationService::new(database));
    let project_service = Arc::new(ProjectService::new(database));
    let invitation_service = Arc::new(InvitationService::new(
        database,
        notifier,
        app_config.app_base_url.clone(),
    ));
    let user_service = Arc::new(UserService::new(
        user_store.clone(),
        organization_service.as_ref().clone(),
    ));

    Ok(AppState {
        database: database.clone(),
        user_store,
        user_service,
        organization_service,
        project_service,
        invitation_service,
        metadata: ServerMetadata::load(),
        server_path: detect_server_path(),
    })
}

fn detect_server_path() -> Option<String> {
    let value = env::var("ORGKIT_SERVER_PATH").ok()?;
    normalize_server_path(&value)
}

fn normalize_server_path(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut path = if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    };

    while path.ends_with('/') && path.len() > 1 {
        path.pop();
    }

    if path == "/" { None } else { Some(path) }
}
