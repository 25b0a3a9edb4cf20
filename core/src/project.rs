use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    access::AccessGuard,
    db::{
        Database,
        errors::is_unique_violation_on,
        membership_repo::MembershipRepositoryRef,
        project_repo::{CreateProjectParams, ProjectRepositoryRef, UpdateProjectParams},
    },
    error::{TenancyError, TenancyResult},
    ids::{OrgId, ProjectId, UserId},
    membership::{ProjectMemberRecord, ProjectMemberWithProfile},
    rbac::{PermissionAction, Role},
    slug::{MAX_SLUG_ATTEMPTS, next_available_slug, slug_base},
    validation::normalize_name,
};

const PROJECT_SLUG_FALLBACK: &str = "project";
const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub org_id: OrgId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

fn normalize_description(value: Option<&str>) -> TenancyResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(TenancyError::validation(format!(
            "project description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(value.to_owned()))
}

#[derive(Clone)]
pub struct ProjectService {
    projects: ProjectRepositoryRef,
    memberships: MembershipRepositoryRef,
    guard: AccessGuard,
}

impl ProjectService {
    pub fn new(database: &Database) -> Self {
        let repositories = database.repositories();
        let memberships = repositories.membership_repo();
        Self {
            projects: repositories.project_repo(),
            guard: AccessGuard::new(memberships.clone()),
            memberships,
        }
    }

    /// Creates a project with a slug unique inside the organization. The
    /// creator becomes the project's owner.
    pub async fn create_project(
        &self,
        org_id: &str,
        actor_id: &UserId,
        name: &str,
        description: Option<&str>,
    ) -> TenancyResult<ProjectRecord> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageProjects)
            .await?;

        let name = normalize_name(name, "project name")?;
        let description = normalize_description(description)?;
        let base = slug_base(&name, PROJECT_SLUG_FALLBACK);

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let taken = self.projects.list_slugs_with_prefix(org_id, &base).await?;
            let slug = next_available_slug(&base, &taken);

            let params = CreateProjectParams {
                id: ProjectId::generate(),
                org_id: OrgId::from(org_id),
                name: name.clone(),
                slug: slug.clone(),
                description: description.clone(),
                creator_id: actor_id.clone(),
                created_at: Utc::now().timestamp(),
            };

            match self.projects.create_project(params).await {
                Ok(project) => {
                    info!(
                        org_id,
                        project_id = %project.id,
                        slug = %project.slug,
                        actor_id = %actor_id,
                        "project created"
                    );
                    return Ok(project);
                }
                Err(err) if is_unique_violation_on(&err, "projects.slug") => {
                    debug!(org_id, attempt, slug = %slug, "project slug taken, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(TenancyError::StorageError(anyhow!(
            "no free project slug for '{base}' after {MAX_SLUG_ATTEMPTS} attempts"
        )))
    }

    pub async fn fetch_project(
        &self,
        org_id: &str,
        project_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<ProjectRecord> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::View)
            .await?;
        self.project_in_org(org_id, project_id).await
    }

    /// Projects of the organization, default project first.
    pub async fn list_projects(
        &self,
        org_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<Vec<ProjectRecord>> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::View)
            .await?;
        Ok(self.projects.list_projects(org_id).await?)
    }

    pub async fn update_project(
        &self,
        org_id: &str,
        project_id: &str,
        actor_id: &UserId,
        update: ProjectUpdate,
    ) -> TenancyResult<ProjectRecord> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageProjects)
            .await?;
        self.project_in_org(org_id, project_id).await?;

        let name = update
            .name
            .as_deref()
            .map(|name| normalize_name(name, "project name"))
            .transpose()?;
        let description = update
            .description
            .map(|value| normalize_description(value.as_deref()))
            .transpose()?;

        if name.is_some() || description.is_some() {
            self.projects
                .update_project(UpdateProjectParams {
                    org_id: org_id.to_owned(),
                    id: project_id.to_owned(),
                    name,
                    description,
                    updated_at: Utc::now().timestamp(),
                })
                .await?;
            info!(org_id, project_id, actor_id = %actor_id, "project updated");
        }

        self.project_in_org(org_id, project_id).await
    }

    /// Deletes a project and, through cascades, its members and
    /// project-scoped invitations. The default project stays.
    pub async fn delete_project(
        &self,
        org_id: &str,
        project_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<()> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageProjects)
            .await?;

        let project = self.project_in_org(org_id, project_id).await?;
        if project.is_default {
            return Err(TenancyError::validation(
                "the default project cannot be deleted",
            ));
        }

        if !self.projects.delete_project(org_id, project_id).await? {
            return Err(TenancyError::NotFound("project"));
        }

        info!(org_id, project_id, actor_id = %actor_id, "project deleted");
        Ok(())
    }

    pub async fn list_project_members(
        &self,
        org_id: &str,
        project_id: &str,
        actor_id: &UserId,
    ) -> TenancyResult<Vec<ProjectMemberWithProfile>> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::View)
            .await?;
        self.project_in_org(org_id, project_id).await?;
        Ok(self
            .memberships
            .list_project_members_with_profiles(project_id)
            .await?)
    }

    pub async fn update_project_member_role(
        &self,
        org_id: &str,
        project_id: &str,
        actor_id: &UserId,
        user_id: &str,
        role: Role,
    ) -> TenancyResult<ProjectMemberRecord> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageProjects)
            .await?;
        self.project_in_org(org_id, project_id).await?;

        if !role.is_assignable() {
            return Err(TenancyError::validation("the owner role cannot be assigned"));
        }

        let member = self.project_member(project_id, user_id).await?;
        if member.role == Role::Owner {
            return Err(TenancyError::validation(
                "the project owner cannot be demoted",
            ));
        }

        if !self
            .memberships
            .update_project_member_role(project_id, user_id, role)
            .await?
        {
            return Err(TenancyError::NotFound("project member"));
        }

        info!(org_id, project_id, user_id, %role, "project member role updated");
        Ok(ProjectMemberRecord { role, ..member })
    }

    pub async fn remove_project_member(
        &self,
        org_id: &str,
        project_id: &str,
        actor_id: &UserId,
        user_id: &str,
    ) -> TenancyResult<()> {
        self.guard
            .require(org_id, actor_id.as_str(), PermissionAction::ManageProjects)
            .await?;
        self.project_in_org(org_id, project_id).await?;

        let member = self.project_member(project_id, user_id).await?;
        if member.role == Role::Owner {
            return Err(TenancyError::validation(
                "the project owner cannot be removed",
            ));
        }

        if !self
            .memberships
            .delete_project_member(project_id, user_id)
            .await?
        {
            return Err(TenancyError::NotFound("project member"));
        }

        info!(org_id, project_id, user_id, "project member removed");
        Ok(())
    }

    async fn project_in_org(&self, org_id: &str, project_id: &str) -> TenancyResult<ProjectRecord> {
        self.projects
            .fetch_project(org_id, project_id)
            .await?
            .ok_or(TenancyError::NotFound("project"))
    }

    async fn project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> TenancyResult<ProjectMemberRecord> {
        self.memberships
            .find_project_member(project_id, user_id)
            .await?
            .ok_or(TenancyError::NotFound("project member"))
    }
}
