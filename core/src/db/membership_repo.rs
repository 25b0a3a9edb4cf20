use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    membership::{
        MemberWithProfile, MembershipRecord, ProjectMemberRecord, ProjectMemberWithProfile,
    },
    rbac::Role,
};

/// Organization and project membership rows.
///
/// Mutations never touch a row whose role is `owner`; callers detect that
/// case up front to report it, the storage filter only backs it up.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_role(&self, org_id: &str, user_id: &str) -> Result<Option<Role>>;

    async fn get_member(&self, org_id: &str, user_id: &str) -> Result<Option<MembershipRecord>>;

    async fn list_members_with_profiles(&self, org_id: &str) -> Result<Vec<MemberWithProfile>>;

    async fn update_member_role(&self, org_id: &str, user_id: &str, role: Role) -> Result<bool>;

    /// Removes the membership and the user's project memberships inside the
    /// organization.
    async fn delete_member(&self, org_id: &str, user_id: &str) -> Result<bool>;

    async fn find_project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectMemberRecord>>;

    async fn list_project_members_with_profiles(
        &self,
        project_id: &str,
    ) -> Result<Vec<ProjectMemberWithProfile>>;

    async fn update_project_member_role(
        &self,
        project_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<bool>;

    async fn delete_project_member(&self, project_id: &str, user_id: &str) -> Result<bool>;
}

pub type MembershipRepositoryRef = Arc<dyn MembershipRepository>;
