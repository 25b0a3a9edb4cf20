use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::{OrgId, ProjectId, UserId},
    project::ProjectRecord,
};

#[derive(Debug, Clone)]
pub struct CreateProjectParams {
    pub id: ProjectId,
    pub org_id: OrgId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub creator_id: UserId,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct UpdateProjectParams {
    pub org_id: String,
    pub id: String,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub updated_at: i64,
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn list_slugs_with_prefix(&self, org_id: &str, prefix: &str) -> Result<Vec<String>>;

    /// Inserts the project with its creator as project `owner`.
    async fn create_project(&self, params: CreateProjectParams) -> Result<ProjectRecord>;

    async fn fetch_project(&self, org_id: &str, project_id: &str) -> Result<Option<ProjectRecord>>;

    async fn list_projects(&self, org_id: &str) -> Result<Vec<ProjectRecord>>;

    async fn update_project(&self, params: UpdateProjectParams) -> Result<bool>;

    /// Deletes a non-default project; returns `false` when nothing matched.
    async fn delete_project(&self, org_id: &str, project_id: &str) -> Result<bool>;
}

pub type ProjectRepositoryRef = Arc<dyn ProjectRepository>;
