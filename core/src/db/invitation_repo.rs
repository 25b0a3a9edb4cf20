use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    ids::{InvitationId, OrgId, ProjectId, UserId},
    invitation::{AcceptedInvitation, InvitationDetails, InvitationRecord},
    rbac::Role,
};

#[derive(Debug, Clone)]
pub struct CreateInvitationParams {
    pub id: InvitationId,
    pub org_id: OrgId,
    pub project_id: Option<ProjectId>,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub invited_by: UserId,
    pub created_at: i64,
    pub expires_at: i64,
    /// Unaccepted, expired invitation for the same address to drop first.
    pub supersedes: Option<InvitationId>,
}

#[derive(Debug, Clone, Copy)]
pub struct AcceptInvitationParams<'a> {
    pub token: &'a str,
    pub user_id: &'a str,
    pub email: &'a str,
    pub accepted_at: i64,
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn find_unaccepted_for_email(
        &self,
        org_id: &str,
        email: &str,
    ) -> Result<Option<InvitationRecord>>;

    async fn create_invitation(&self, params: CreateInvitationParams) -> Result<InvitationRecord>;

    async fn fetch_invitation(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationRecord>>;

    async fn find_by_token(&self, token: &str) -> Result<Option<InvitationRecord>>;

    async fn fetch_details(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationDetails>>;

    async fn fetch_details_by_token(&self, token: &str) -> Result<Option<InvitationDetails>>;

    async fn list_unaccepted(&self, org_id: &str) -> Result<Vec<InvitationRecord>>;

    async fn delete_unaccepted(&self, org_id: &str, invitation_id: &str) -> Result<bool>;

    /// Stamps `accepted_at` only if the token is still pending, unexpired and
    /// addressed to `email`, then upserts the organization membership (and
    /// project membership for project-scoped invites) in the same
    /// transaction. `None` means no row qualified.
    async fn accept_invitation(
        &self,
        params: AcceptInvitationParams<'_>,
    ) -> Result<Option<AcceptedInvitation>>;
}

pub type InvitationRepositoryRef = Arc<dyn InvitationRepository>;
