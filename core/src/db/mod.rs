use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};

use self::{
    invitation_repo::InvitationRepositoryRef,
    membership_repo::MembershipRepositoryRef,
    organization_repo::OrganizationRepositoryRef,
    project_repo::ProjectRepositoryRef,
    sqlite::{
        connection as sqlite_connection, invitation_repo::SqliteInvitationRepository,
        membership_repo::SqliteMembershipRepository,
        organization_repo::SqliteOrganizationRepository, project_repo::SqliteProjectRepository,
    },
};
use crate::config::AppConfig;

pub mod errors;
pub mod invitation_repo;
pub mod membership_repo;
pub mod organization_repo;
pub mod project_repo;
pub mod sqlite;

pub struct RepositoryRegistry {
    organization_repo: OrganizationRepositoryRef,
    membership_repo: MembershipRepositoryRef,
    project_repo: ProjectRepositoryRef,
    invitation_repo: InvitationRepositoryRef,
}

impl RepositoryRegistry {
    pub fn new(
        organization_repo: OrganizationRepositoryRef,
        membership_repo: MembershipRepositoryRef,
        project_repo: ProjectRepositoryRef,
        invitation_repo: InvitationRepositoryRef,
    ) -> Self {
        Self {
            organization_repo,
            membership_repo,
            project_repo,
            invitation_repo,
        }
    }

    pub fn organization_repo(&self) -> OrganizationRepositoryRef {
        self.organization_repo.clone()
    }

    pub fn membership_repo(&self) -> MembershipRepositoryRef {
        self.membership_repo.clone()
    }

    pub fn project_repo(&self) -> ProjectRepositoryRef {
        self.project_repo.clone()
    }

    pub fn invitation_repo(&self) -> InvitationRepositoryRef {
        self.invitation_repo.clone()
    }
}

/// Explicitly constructed storage handle shared by every service.
#[derive(Clone)]
pub struct Database {
    pool: sqlite_connection::SqlitePool,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let path = PathBuf::from(&config.database_path);
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory: {}", parent.display())
            })?;
        }

        let pool = sqlite_connection::create_pool(&path, config.database_max_connections).await?;
        sqlite_connection::run_migrations(&pool).await?;

        Ok(Self::from_pool(pool, path))
    }

    pub fn from_pool(pool: sqlite_connection::SqlitePool, path: PathBuf) -> Self {
        let repositories = Arc::new(RepositoryRegistry::new(
            Arc::new(SqliteOrganizationRepository::new(pool.clone())),
            Arc::new(SqliteMembershipRepository::new(pool.clone())),
            Arc::new(SqliteProjectRepository::new(pool.clone())),
            Arc::new(SqliteInvitationRepository::new(pool.clone())),
        ));

        Self {
            pool,
            path,
            repositories,
        }
    }

    pub fn pool(&self) -> &sqlite_connection::SqlitePool {
        &self.pool
    }

    pub fn database_path(&self) -> &Path {
        &self.path
    }

    pub fn repositories(&self) -> Arc<RepositoryRegistry> {
        self.repositories.clone()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
