use std::{fmt, str::FromStr};

use anyhow::anyhow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    access::AccessGuard,
    db::{
        Database,
        errors::is_unique_violation_on,
        membership_repo::MembershipRepositoryRef,
        organization_repo::{
            CreateOrganizationParams, OrganizationRepositoryRef, UpdateOrganizationParams,
        },
    },
    error::{TenancyError, TenancyResult},
    ids::{OrgId, ProjectId, UserId},
    membership::{MemberWithProfile, MembershipRecord},
    rbac::{PermissionAction, Role},
    slug::{MAX_SLUG_ATTEMPTS, next_available_slug, slug_base},
    validation::{display_name, normalize_name},
};

pub const DEFAULT_PROJECT_NAME: &str = "Default";
pub const DEFAULT_PROJECT_SLUG: &str = "default";

const ORG_SLUG_FALLBACK: &str = "org";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgType {
    Personal,
    Team,
}

impl OrgType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrgType::Personal => "personal",
            OrgType::Team => "team",
        }
    }
}

impl fmt::Display for OrgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "personal" => Ok(OrgType::Personal),
            "team" => Ok(OrgType::Team),
            other => Err(anyhow!("unknown organization type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRecord {
    pub id: OrgId,
    pub name: String,
    pub slug: String,
    pub org_type: OrgType,
    pub avatar_url: Option<String>,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrganizationRecord {
    pub fn is_personal(&self) -> bool {
        self.org_type == OrgType::Personal
    }
}

/// An organization together with the viewing user's role in it.
#[derive(Debug, Clone)]
pub struct UserOrganization {
    pub organization: OrganizationRecord,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the avatar.
    pub avatar_url: Option<Option<String>>,
}

#[derive(Clone)]
pub struct OrganizationService {
    organizations: OrganizationRepositoryRef,
    memberships: MembershipRepositoryRef,
    guard: AccessGuard,
}

impl OrganizationService {
    pub fn new(database: &Database) -> Self {
        let repositories = database.repositories();
        let memberships = repositories.membership_repo();
        Self {
            organizations: repositories.organization_repo(),
            guard: AccessGuard::new(memberships.clone()),
            memberships,
        }
    }

    /// Creates an organization owned by `creator_id`, together with its
    /// owner membership and default project.
    pub async fn create_organization(
        &self,
        creator_id: &UserId,
        name: &str,
        org_type: OrgType,
    ) -> TenancyResult<OrganizationRecord> {
        let name = normalize_name(name, "organization name")?;

        if org_type == OrgType::Personal
            && self
                .organizations
                .find_personal_organization(creator_id.as_str())
                .await?
                .is_some()
        {
            return Err(TenancyError::validation(
                "user already has a personal organization",
            ));
        }

        self.insert_with_unique_slug(creator_id, name, org_type)
            .await
    }

    /// The organization every account receives at sign-up, named after the
    /// account holder.
    pub async fn create_personal_organization(
        &self,
        user_id: &UserId,
        full_name: Option<&str>,
        email: &str,
    ) -> TenancyResult<OrganizationRecord> {
        let name = display_name(full_name, email);
        self.create_organization(user_id, &name, OrgType::Personal)
            .await
    }

    async fn insert_with_unique_slug(
        &self,
        creator_id: &UserId,
        name: String,
        org_type: OrgType,
    ) -> TenancyResult<OrganizationRecord> {
        let base = slug_base(&name, ORG_SLUG_FALLBACK);

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let taken = self.organizations.list_slugs_with_prefix(&base).await?;
            let slug = next_available_slug(&base, &taken);
            let now = Utc::now().timestamp();

            let params = CreateOrganizationParams {
                id: OrgId::generate(),
                name: name.clone(),
                slug: slug.clone(),
                org_type,
                avatar_url: None,
                created_by: creator_id.clone(),
                created_at: now,
                default_project_id: ProjectId::generate(),
            };

            match self.organizations.create_organization(params).await {
                Ok(organization) => {
                    info!(
                        org_id = %organization.id,
                        slug = %organization.slug,
                        org_type = %organization.org_type,
                        created_by = %creator_id,
                        "organization created"
                    );
                    return Ok(organization);
                }
                Err(err) if is_unique_violation_on(&err, "organizations.slug") => {
                    debug!(attempt, slug = %slug, "organization slug taken, retrying");
                }
                Err(err)
                    if org_type == OrgType::Personal
                        && is_unique_violation_on(&err, "organizations.created_by") =>
                {
                    return Err(TenancyError::validation(
                        "user already has a personal organization",
                    ));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(TenancyError::StorageError(anyhow!(
            "no free organization slug for '{base}' after {MAX_SLUG_ATTEMPTS} attempts"
        )))
    }

    pub async fn fetch_organization(
        &self,
        org_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<UserOrganization> {
        let role = self
            .guard
            .require(org_id, actor_id.as_str(), PermissionAction::View)
            .await?;
        let organization = self
            .organizations
            .fetch_organization(org_id)
            .await?
            .ok_or(TenancyError::NotFound("organization"))?;
        Ok(UserOrganization { organization, role })
    }

    pub async fn fetch_by_slug(
        &self,
        slug: &str,
        actor_id: &UserId,
    ) -> TenancyResult<UserOrganization> {
        let organization = self
            .organizations
            .fetch_organization_by_slug(slug)
            .await?
            .ok_or(TenancyError::NotFound("organization"))?;
        let role = self
            .guard
            .require(
                organization.id.as_str(),
                actor_id.as_str(),
                PermissionAction::View,
            )
            .await?;
        Ok(UserOrganization { organization, role })
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> TenancyResult<Vec<UserOrganization>> {
        Ok(self
            .organizations
            .list_organizations_for_user(user_id.as_str())
            .await?)
    }

    /// Renames the organization or changes its avatar. The slug is fixed at
    /// creation and never follows the name.
    pub async fn update_organization(
        &self,
        org_id: &str,
        actor_id: &UserId,
        update: OrganizationUpdate,
    ) -> TenancyResult<OrganizationRecord> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageOrg)
            .await?;

        let name = update
            .name
            .as_deref()
            .map(|name| normalize_name(name, "organization name"))
            .transpose()?;

        if name.is_some() || update.avatar_url.is_some() {
            self.organizations
                .update_organization(UpdateOrganizationParams {
                    id: org_id.to_owned(),
                    name,
                    avatar_url: update.avatar_url,
                    updated_at: Utc::now().timestamp(),
                })
                .await?;
            info!(org_id, actor_id = %actor_id, "organization updated");
        }

        self.organizations
            .fetch_organization(org_id)
            .await?
            .ok_or(TenancyError::NotFound("organization"))
    }

    /// Deletes a team organization. Memberships, projects, project members
    /// and invitations are removed by storage cascades.
    pub async fn delete_organization(&self, org_id: &str, actor_id: &UserId) -> TenancyResult<()> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::DeleteOrg)
            .await?;

        let organization = self
            .organizations
            .fetch_organization(org_id)
            .await?
            .ok_or(TenancyError::NotFound("organization"))?;
        if organization.is_personal() {
            return Err(TenancyError::validation(
                "personal organizations cannot be deleted",
            ));
        }

        if !self.organizations.delete_organization(org_id).await? {
            return Err(TenancyError::NotFound("organization"));
        }

        info!(org_id, actor_id = %actor_id, "organization deleted");
        Ok(())
    }

    pub async fn list_members(
        &self,
        org_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<Vec<MemberWithProfile>> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::View)
            .await?;
        Ok(self.memberships.list_members_with_profiles(org_id).await?)
    }

    pub async fn update_member_role(
        &self,
        org_id: &str,
        actor_id: &UserId,
        user_id: &str,
        role: Role,
    ) -> TenancyResult<MembershipRecord> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageMembers)
            .await?;

        if !role.is_assignable() {
            return Err(TenancyError::validation("the owner role cannot be assigned"));
        }

        let member = self
            .memberships
            .get_member(org_id, user_id)
            .await?
            .ok_or(TenancyError::NotFound("member"))?;
        if member.role == Role::Owner {
            return Err(TenancyError::validation(
                "the organization owner cannot be demoted",
            ));
        }

        if !self
            .memberships
            .update_member_role(org_id, user_id, role)
            .await?
        {
            return Err(TenancyError::NotFound("member"));
        }

        info!(org_id, user_id, %role, actor_id = %actor_id, "member role updated");
        Ok(MembershipRecord { role, ..member })
    }

    pub async fn remove_member(
        &self,
        org_id: &str,
        actor_id: &UserId,
        user_id: &str,
    ) -> TenancyResult<()> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageMembers)
            .await?;

        let member = self
            .memberships
            .get_member(org_id, user_id)
            .await?
            .ok_or(TenancyError::NotFound("member"))?;
        if member.role == Role::Owner {
            return Err(TenancyError::validation(
                "the organization owner cannot be removed",
            ));
        }

        if !self.memberships.delete_member(org_id, user_id).await? {
            return Err(TenancyError::NotFound("member"));
        }

        info!(org_id, user_id, actor_id = %actor_id, "member removed");
        Ok(())
    }

    /// Drops the caller's own membership. The owner has to stay.
    pub async fn leave_organization(&self, org_id: &str, user_id: &UserId) -> TenancyResult<()> {
        let role = self
            .guard
            .role_of(org_id, user_id.as_str())
            .await?
            .ok_or(TenancyError::NotFound("organization"))?;
        if role == Role::Owner {
            return Err(TenancyError::validation(
                "the organization owner cannot leave",
            ));
        }

        if !self
            .memberships
            .delete_member(org_id, user_id.as_str())
            .await?
        {
            return Err(TenancyError::NotFound("organization"));
        }

        info!(org_id, user_id = %user_id, "member left organization");
        Ok(())
    }
}
