use crate::{
    ids::{OrgId, ProjectId, UserId},
    rbac::Role,
};

/// One (organization, user) authorization row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct MemberWithProfile {
    pub org_id: OrgId,
    pub user_id: UserId,
    pub role: Role,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub joined_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMemberRecord {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: Role,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct ProjectMemberWithProfile {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: Role,
    pub email: String,
    pub full_name: Option<String>,
    pub joined_at: i64,
}
