use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::{OrgId, ProjectId, UserId},
    organization::{OrgType, OrganizationRecord, UserOrganization},
};

#[derive(Debug, Clone)]
pub struct CreateOrganizationParams {
    pub id: OrgId,
    pub name: String,
    pub slug: String,
    pub org_type: OrgType,
    pub avatar_url: Option<String>,
    pub created_by: UserId,
    pub created_at: i64,
    pub default_project_id: ProjectId,
}

#[derive(Debug, Clone)]
pub struct UpdateOrganizationParams {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<Option<String>>,
    pub updated_at: i64,
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Slugs starting with `prefix`, fetched in one scan.
    async fn list_slugs_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Inserts the organization, the creator's `owner` membership and the
    /// default project as one transaction.
    async fn create_organization(
        &self,
        params: CreateOrganizationParams,
    ) -> Result<OrganizationRecord>;

    async fn fetch_organization(&self, id: &str) -> Result<Option<OrganizationRecord>>;

    async fn fetch_organization_by_slug(&self, slug: &str) -> Result<Option<OrganizationRecord>>;

    async fn find_personal_organization(&self, user_id: &str)
    -> Result<Option<OrganizationRecord>>;

    async fn list_organizations_for_user(&self, user_id: &str) -> Result<Vec<UserOrganization>>;

    async fn update_organization(&self, params: UpdateOrganizationParams) -> Result<bool>;

    /// Memberships, projects, project members and invitations go with it
    /// through storage-level cascades.
    async fn delete_organization(&self, id: &str) -> Result<bool>;
}

pub type OrganizationRepositoryRef = Arc<dyn OrganizationRepository>;
