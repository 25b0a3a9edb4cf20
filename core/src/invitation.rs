//! Invitation ledger records and the lifecycle service built on them.
//!
//! An invitation moves from pending to accepted exactly once. Expiry is not
//! stored as a state; it is derived from `expires_at` at read time, so an
//! expired record stays in the ledger until an administrator revokes it or a
//! fresh invitation to the same address supersedes it.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    access::{AccessGuard, Caller},
    db::{
        Database,
        errors::is_unique_violation_on,
        invitation_repo::{AcceptInvitationParams, CreateInvitationParams, InvitationRepositoryRef},
        project_repo::ProjectRepositoryRef,
    },
    error::{TenancyError, TenancyResult},
    ids::{InvitationId, OrgId, ProjectId, UserId},
    notification::{
        FALLBACK_INVITER_NAME, FALLBACK_ORG_NAME, InvitationEmail, InvitationNotifierRef,
        NotificationOutcome, acceptance_url,
    },
    rbac::{PermissionAction, Role},
    validation::normalize_email,
};

pub const INVITATION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

const TOKEN_BYTES: usize = 32;

/// 256 random bits, base64url without padding.
pub fn generate_invitation_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationRecord {
    pub id: InvitationId,
    pub org_id: OrgId,
    pub project_id: Option<ProjectId>,
    pub email: String,
    pub role: Role,
    pub token: String,
    /// `None` once the inviting account has been deleted.
    pub invited_by: Option<UserId>,
    pub created_at: i64,
    pub expires_at: i64,
    pub accepted_at: Option<i64>,
}

impl InvitationRecord {
    pub fn state(&self, now: i64) -> InvitationState {
        classify(self.accepted_at, self.expires_at, now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    Pending,
    Accepted,
    Expired,
}

/// Acceptance wins over expiry: a record accepted before its deadline stays
/// accepted forever.
pub fn classify(accepted_at: Option<i64>, expires_at: i64, now: i64) -> InvitationState {
    if accepted_at.is_some() {
        InvitationState::Accepted
    } else if expires_at <= now {
        InvitationState::Expired
    } else {
        InvitationState::Pending
    }
}

/// Token-only classification shown to anyone holding the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    NotFound,
    Accepted,
    Expired,
    Pending,
}

pub fn classify_invitation(invitation: Option<&InvitationRecord>, now: i64) -> InvitationStatus {
    match invitation.map(|invitation| invitation.state(now)) {
        None => InvitationStatus::NotFound,
        Some(InvitationState::Accepted) => InvitationStatus::Accepted,
        Some(InvitationState::Expired) => InvitationStatus::Expired,
        Some(InvitationState::Pending) => InvitationStatus::Pending,
    }
}

/// Screen rendered on the acceptance page once the viewer is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationScreen {
    NotFound,
    AlreadyAccepted,
    Expired,
    SignInRequired,
    WrongAccount,
    Ready,
}

/// Invitation joined with the names needed to describe it.
#[derive(Debug, Clone)]
pub struct InvitationDetails {
    pub invitation: InvitationRecord,
    pub org_name: String,
    pub org_slug: String,
    pub project_name: Option<String>,
    pub inviter_full_name: Option<String>,
    pub inviter_email: Option<String>,
}

impl InvitationDetails {
    pub fn inviter_name(&self) -> String {
        [&self.inviter_full_name, &self.inviter_email]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or(FALLBACK_INVITER_NAME)
            .to_owned()
    }

    pub fn display_org_name(&self) -> &str {
        let name = self.org_name.trim();
        if name.is_empty() {
            FALLBACK_ORG_NAME
        } else {
            name
        }
    }
}

#[derive(Debug, Clone)]
pub struct InvitationLookup {
    pub status: InvitationStatus,
    pub details: Option<InvitationDetails>,
}

impl InvitationLookup {
    pub fn screen_for(&self, viewer: Option<&Caller>) -> InvitationScreen {
        match (self.status, &self.details) {
            (InvitationStatus::NotFound, _) | (_, None) => InvitationScreen::NotFound,
            (InvitationStatus::Accepted, _) => InvitationScreen::AlreadyAccepted,
            (InvitationStatus::Expired, _) => InvitationScreen::Expired,
            (InvitationStatus::Pending, Some(details)) => match viewer {
                None => InvitationScreen::SignInRequired,
                Some(viewer) if viewer.email != details.invitation.email => {
                    InvitationScreen::WrongAccount
                }
                Some(_) => InvitationScreen::Ready,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub role: Role,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedInvitation {
    pub invitation: InvitationRecord,
    pub notification: NotificationOutcome,
}

#[derive(Debug, Clone)]
pub struct PendingInvitation {
    pub invitation: InvitationRecord,
    pub state: InvitationState,
}

/// Outcome of a successful acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedInvitation {
    pub invitation_id: InvitationId,
    pub org_id: OrgId,
    pub org_slug: String,
    pub project_id: Option<ProjectId>,
    /// Role the user holds after acceptance. An existing owner keeps
    /// `owner` whatever the invitation granted.
    pub role: Role,
}

/// Why a conditional acceptance matched no row, in validation order.
fn rejection_reason(invitation: Option<&InvitationRecord>, email: &str, now: i64) -> TenancyError {
    let Some(invitation) = invitation else {
        return TenancyError::NotFound("invitation");
    };
    match invitation.state(now) {
        InvitationState::Accepted => TenancyError::AlreadyAccepted,
        InvitationState::Expired => TenancyError::Expired,
        InvitationState::Pending if invitation.email != email => TenancyError::EmailMismatch,
        // Pending and addressed to the caller, yet the update lost: another
        // request changed the row between the two reads.
        InvitationState::Pending => TenancyError::AlreadyAccepted,
    }
}

#[derive(Clone)]
pub struct InvitationService {
    invitations: InvitationRepositoryRef,
    projects: ProjectRepositoryRef,
    guard: AccessGuard,
    notifier: InvitationNotifierRef,
    app_base_url: String,
}

impl InvitationService {
    pub fn new(
        database: &Database,
        notifier: InvitationNotifierRef,
        app_base_url: impl Into<String>,
    ) -> Self {
        let repositories = database.repositories();
        Self {
            invitations: repositories.invitation_repo(),
            projects: repositories.project_repo(),
            guard: AccessGuard::new(repositories.membership_repo()),
            notifier,
            app_base_url: app_base_url.into(),
        }
    }

    /// Persists an invitation, then attempts delivery. A failed delivery is
    /// reported in the result and leaves the record in place for a resend.
    pub async fn create(
        &self,
        org_id: &str,
        actor_id: &UserId,
        input: NewInvitation,
    ) -> TenancyResult<CreatedInvitation> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::InviteMembers)
            .await?;

        if !input.role.is_assignable() {
            return Err(TenancyError::validation(
                "invitations cannot grant the owner role",
            ));
        }
        let email = normalize_email(&input.email)?;

        let project_id = match input.project_id.as_deref() {
            Some(project_id) => {
                self.projects
                    .fetch_project(org_id, project_id)
                    .await?
                    .ok_or_else(|| {
                        TenancyError::validation("project does not belong to this organization")
                    })?;
                Some(ProjectId::from(project_id))
            }
            None => None,
        };

        let now = Utc::now().timestamp();
        let supersedes = match self
            .invitations
            .find_unaccepted_for_email(org_id, &email)
            .await?
        {
            Some(existing) if existing.state(now) == InvitationState::Pending => {
                return Err(TenancyError::DuplicateInvitation);
            }
            Some(stale) => Some(stale.id),
            None => None,
        };

        let params = CreateInvitationParams {
            id: InvitationId::generate(),
            org_id: OrgId::from(org_id),
            project_id,
            email,
            role: input.role,
            token: generate_invitation_token(),
            invited_by: actor_id.clone(),
            created_at: now,
            expires_at: now + INVITATION_TTL_SECONDS,
            supersedes,
        };

        let invitation = match self.invitations.create_invitation(params).await {
            Ok(invitation) => invitation,
            Err(err) if is_unique_violation_on(&err, "invitations.email") => {
                return Err(TenancyError::DuplicateInvitation);
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            org_id,
            invitation_id = %invitation.id,
            role = %invitation.role,
            invited_by = %actor_id,
            "invitation created"
        );

        let notification = self.notify(&invitation).await;
        Ok(CreatedInvitation {
            invitation,
            notification,
        })
    }

    /// Hard-deletes a pending or expired invitation. Accepted invitations
    /// are terminal and stay.
    pub async fn revoke(
        &self,
        org_id: &str,
        invitation_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<()> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::InviteMembers)
            .await?;

        let invitation = self.invitation_in_org(org_id, invitation_id).await?;
        if invitation.accepted_at.is_some() {
            return Err(TenancyError::AlreadyAccepted);
        }

        if !self
            .invitations
            .delete_unaccepted(org_id, invitation_id)
            .await?
        {
            return Err(TenancyError::NotFound("invitation"));
        }

        info!(org_id, invitation_id, actor_id = %actor_id, "invitation revoked");
        Ok(())
    }

    /// Re-sends the email of a pending invitation without touching the
    /// record.
    pub async fn resend(
        &self,
        org_id: &str,
        invitation_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<NotificationOutcome> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::InviteMembers)
            .await?;

        let invitation = self.invitation_in_org(org_id, invitation_id).await?;
        match invitation.state(Utc::now().timestamp()) {
            InvitationState::Accepted => Err(TenancyError::AlreadyAccepted),
            InvitationState::Expired => Err(TenancyError::Expired),
            InvitationState::Pending => Ok(self.notify(&invitation).await),
        }
    }

    /// Unaccepted invitations of the organization, newest first, each with
    /// its current state.
    pub async fn list_pending(
        &self,
        org_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<Vec<PendingInvitation>> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::InviteMembers)
            .await?;

        let now = Utc::now().timestamp();
        Ok(self
            .invitations
            .list_unaccepted(org_id)
            .await?
            .into_iter()
            .map(|invitation| PendingInvitation {
                state: invitation.state(now),
                invitation,
            })
            .collect())
    }

    /// Public lookup; the token is the credential.
    pub async fn resolve_for_display(&self, token: &str) -> TenancyResult<InvitationLookup> {
        let details = self.invitations.fetch_details_by_token(token).await?;
        let status = classify_invitation(
            details.as_ref().map(|details| &details.invitation),
            Utc::now().timestamp(),
        );
        Ok(InvitationLookup { status, details })
    }

    /// Accepts the invitation for the signed-in caller. Concurrent calls on
    /// one token see exactly one success; the rest get `AlreadyAccepted`.
    pub async fn accept(&self, token: &str, caller: &Caller) -> TenancyResult<AcceptedInvitation> {
        let now = Utc::now().timestamp();
        let accepted = self
            .invitations
            .accept_invitation(AcceptInvitationParams {
                token,
                user_id: caller.user_id.as_str(),
                email: &caller.email,
                accepted_at: now,
            })
            .await?;

        if let Some(accepted) = accepted {
            info!(
                org_id = %accepted.org_id,
                invitation_id = %accepted.invitation_id,
                user_id = %caller.user_id,
                role = %accepted.role,
                "invitation accepted"
            );
            return Ok(accepted);
        }

        let invitation = self.invitations.find_by_token(token).await?;
        Err(rejection_reason(invitation.as_ref(), &caller.email, now))
    }

    async fn invitation_in_org(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> TenancyResult<InvitationRecord> {
        self.invitations
            .fetch_invitation(org_id, invitation_id)
            .await?
            .ok_or(TenancyError::NotFound("invitation"))
    }

    async fn notify(&self, invitation: &InvitationRecord) -> NotificationOutcome {
        let details = match self
            .invitations
            .fetch_details(invitation.org_id.as_str(), invitation.id.as_str())
            .await
        {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!(invitation_id = %invitation.id, "invitation vanished before notification");
                return NotificationOutcome::Failed("invitation no longer exists".to_owned());
            }
            Err(err) => {
                warn!(invitation_id = %invitation.id, error = %err, "failed to load invitation details");
                return NotificationOutcome::Failed(format!("{err:#}"));
            }
        };

        let email = InvitationEmail {
            to: details.invitation.email.clone(),
            inviter_name: details.inviter_name(),
            org_name: details.display_org_name().to_owned(),
            project_name: details.project_name.clone(),
            role: details.invitation.role,
            acceptance_url: acceptance_url(&self.app_base_url, &details.invitation.token),
        };

        match self.notifier.send_invitation(&email).await {
            Ok(()) => {
                info!(invitation_id = %invitation.id, "invitation email sent");
                NotificationOutcome::Sent
            }
            Err(err) => {
                warn!(
                    invitation_id = %invitation.id,
                    error = %err,
                    "failed to send invitation email"
                );
                NotificationOutcome::Failed(format!("{err:#}"))
            }
        }
    }
}
