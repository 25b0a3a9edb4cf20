// Request and response types for REST API handlers

use orgkit_core::{
    Caller, Role,
    invitation::{
        InvitationLookup, InvitationRecord, InvitationScreen, InvitationState, InvitationStatus,
    },
    membership::{MemberWithProfile, MembershipRecord, ProjectMemberRecord, ProjectMemberWithProfile},
    organization::{OrgType, OrganizationRecord, UserOrganization},
    project::ProjectRecord,
    user::UserRecord,
};
use serde::{Deserialize, Serialize};

// ========== Authentication Types ==========

pub(crate) struct AuthenticatedRestSession {
    pub(crate) user: UserRecord,
    pub(crate) set_cookies: Vec<String>,
}

impl AuthenticatedRestSession {
    pub(crate) fn caller(&self) -> Caller {
        Caller::new(self.user.id.clone(), self.user.email.clone())
    }
}

pub(crate) struct SessionLookup {
    pub(crate) user: Option<SessionUser>,
    pub(crate) cookies: Vec<String>,
}

// ========== Request Types ==========

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpRequest {
    pub(crate) email: String,
    pub(crate) password: String,
    #[serde(default)]
    pub(crate) full_name: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct SignInRequest {
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) password: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProfileRequest {
    /// Blank clears the name.
    #[serde(default)]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) avatar_url: Option<String>,
    #[serde(default)]
    pub(crate) remove_avatar: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    pub(crate) new_password: String,
}

#[derive(Deserialize)]
pub(crate) struct CreateOrganizationRequest {
    pub(crate) name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateOrganizationRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) avatar_url: Option<String>,
    #[serde(default)]
    pub(crate) remove_avatar: Option<bool>,
}

#[derive(Deserialize)]
pub(crate) struct UpdateMemberRoleRequest {
    pub(crate) role: String,
}

#[derive(Deserialize)]
pub(crate) struct CreateProjectRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct UpdateProjectRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Blank clears the description.
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateInvitationRequest {
    pub(crate) email: String,
    pub(crate) role: String,
    #[serde(default)]
    pub(crate) project_id: Option<String>,
}

// ========== Response Types ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionUser {
    pub(crate) id: String,
    pub(crate) email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) avatar_url: Option<String>,
}

impl From<&UserRecord> for SessionUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.to_string(),
            email: record.email.clone(),
            full_name: record.full_name.clone(),
            avatar_url: record.avatar_url.clone(),
        }
    }
}

#[derive(Default, Serialize)]
pub(crate) struct SessionUserPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user: Option<SessionUser>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpResponse {
    pub(crate) user: SessionUser,
    /// Slug of the personal organization created with the account.
    pub(crate) org_slug: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrganizationResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) slug: String,
    #[serde(rename = "type")]
    pub(crate) org_type: OrgType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<Role>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl OrganizationResponse {
    pub(crate) fn with_role(organization: OrganizationRecord, role: Option<Role>) -> Self {
        Self {
            id: organization.id.into_inner(),
            name: organization.name,
            slug: organization.slug,
            org_type: organization.org_type,
            avatar_url: organization.avatar_url,
            role,
            created_at: organization.created_at,
            updated_at: organization.updated_at,
        }
    }
}

impl From<UserOrganization> for OrganizationResponse {
    fn from(value: UserOrganization) -> Self {
        Self::with_role(value.organization, Some(value.role))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberResponse {
    pub(crate) user_id: String,
    pub(crate) role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) avatar_url: Option<String>,
    pub(crate) joined_at: i64,
}

impl From<MemberWithProfile> for MemberResponse {
    fn from(member: MemberWithProfile) -> Self {
        Self {
            user_id: member.user_id.into_inner(),
            role: member.role,
            email: Some(member.email),
            full_name: member.full_name,
            avatar_url: member.avatar_url,
            joined_at: member.joined_at,
        }
    }
}

impl From<MembershipRecord> for MemberResponse {
    fn from(member: MembershipRecord) -> Self {
        Self {
            user_id: member.user_id.into_inner(),
            role: member.role,
            email: None,
            full_name: None,
            avatar_url: None,
            joined_at: member.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectResponse {
    pub(crate) id: String,
    pub(crate) org_id: String,
    pub(crate) name: String,
    pub(crate) slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) is_default: bool,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<ProjectRecord> for ProjectResponse {
    fn from(project: ProjectRecord) -> Self {
        Self {
            id: project.id.into_inner(),
            org_id: project.org_id.into_inner(),
            name: project.name,
            slug: project.slug,
            description: project.description,
            is_default: project.is_default,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectMemberResponse {
    pub(crate) user_id: String,
    pub(crate) role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) full_name: Option<String>,
    pub(crate) joined_at: i64,
}

impl From<ProjectMemberWithProfile> for ProjectMemberResponse {
    fn from(member: ProjectMemberWithProfile) -> Self {
        Self {
            user_id: member.user_id.into_inner(),
            role: member.role,
            email: Some(member.email),
            full_name: member.full_name,
            joined_at: member.joined_at,
        }
    }
}

impl From<ProjectMemberRecord> for ProjectMemberResponse {
    fn from(member: ProjectMemberRecord) -> Self {
        Self {
            user_id: member.user_id.into_inner(),
            role: member.role,
            email: None,
            full_name: None,
            joined_at: member.created_at,
        }
    }
}

/// Invitation as shown to organization managers. The token is never
/// echoed back; only the email link carries it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitationResponse {
    pub(crate) id: String,
    pub(crate) org_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) project_id: Option<String>,
    pub(crate) email: String,
    pub(crate) role: Role,
    pub(crate) state: InvitationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) invited_by: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) accepted_at: Option<i64>,
}

impl InvitationResponse {
    pub(crate) fn new(invitation: InvitationRecord, state: InvitationState) -> Self {
        Self {
            id: invitation.id.into_inner(),
            org_id: invitation.org_id.into_inner(),
            project_id: invitation.project_id.map(|id| id.into_inner()),
            email: invitation.email,
            role: invitation.role,
            state,
            invited_by: invitation.invited_by.map(|id| id.into_inner()),
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
            accepted_at: invitation.accepted_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateInvitationResponse {
    pub(crate) invitation: InvitationResponse,
    pub(crate) email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResendInvitationResponse {
    pub(crate) email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email_error: Option<String>,
}

/// Public view of an invitation link.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvitationLookupResponse {
    pub(crate) status: InvitationStatus,
    pub(crate) screen: InvitationScreen,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) org_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) org_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) inviter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) expires_at: Option<i64>,
}

impl InvitationLookupResponse {
    pub(crate) fn new(lookup: &InvitationLookup, viewer: Option<&Caller>) -> Self {
        let screen = lookup.screen_for(viewer);
        let mut response = Self {
            status: lookup.status,
            screen,
            org_name: None,
            org_slug: None,
            project_name: None,
            inviter_name: None,
            role: None,
            email: None,
            expires_at: None,
        };

        if let (InvitationStatus::Pending, Some(details)) = (lookup.status, &lookup.details) {
            response.org_name = Some(details.display_org_name().to_owned());
            response.org_slug = Some(details.org_slug.clone());
            response.project_name = details.project_name.clone();
            response.inviter_name = Some(details.inviter_name());
            response.role = Some(details.invitation.role);
            response.email = Some(details.invitation.email.clone());
            response.expires_at = Some(details.invitation.expires_at);
        }

        response
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcceptInvitationResponse {
    pub(crate) org_id: String,
    pub(crate) org_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) project_id: Option<String>,
    pub(crate) role: Role,
}

/// One entry of the role picker.
#[derive(Debug, Serialize)]
pub(crate) struct RoleResponse {
    pub(crate) value: Role,
    pub(crate) label: &'static str,
    pub(crate) description: &'static str,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            value: role,
            label: role.label(),
            description: role.description(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}
