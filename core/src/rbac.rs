//! Static role policy.
//!
//! Every authorization decision in the crate goes through [`can_do`]. Roles
//! carry an explicit action set instead of a numeric threshold so that a role
//! with a non-nested permission set can be added without touching callers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Membership role, ordered by privilege (`Viewer < Member < Admin < Owner`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    ManageOrg,
    ManageMembers,
    ManageProjects,
    InviteMembers,
    Edit,
    View,
    DeleteOrg,
}

/// Roles that may be handed out through invitations or role changes.
pub const ASSIGNABLE_ROLES: [Role; 3] = [Role::Admin, Role::Member, Role::Viewer];
pub const ALL_ROLES: [Role; 4] = [Role::Owner, Role::Admin, Role::Member, Role::Viewer];

const OWNER_ACTIONS: &[PermissionAction] = &[
    PermissionAction::ManageOrg,
    PermissionAction::ManageMembers,
    PermissionAction::ManageProjects,
    PermissionAction::InviteMembers,
    PermissionAction::Edit,
    PermissionAction::View,
    PermissionAction::DeleteOrg,
];

const ADMIN_ACTIONS: &[PermissionAction] = &[
    PermissionAction::ManageMembers,
    PermissionAction::ManageProjects,
    PermissionAction::InviteMembers,
    PermissionAction::Edit,
    PermissionAction::View,
];

const MEMBER_ACTIONS: &[PermissionAction] = &[PermissionAction::Edit, PermissionAction::View];

const VIEWER_ACTIONS: &[PermissionAction] = &[PermissionAction::View];

pub fn role_permissions(role: Role) -> &'static [PermissionAction] {
    match role {
        Role::Owner => OWNER_ACTIONS,
        Role::Admin => ADMIN_ACTIONS,
        Role::Member => MEMBER_ACTIONS,
        Role::Viewer => VIEWER_ACTIONS,
    }
}

/// Returns whether `role` may perform `action`. An absent role may do nothing.
pub fn can_do(role: Option<Role>, action: PermissionAction) -> bool {
    role.is_some_and(|role| role_permissions(role).contains(&action))
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Owner => "Owner",
            Role::Admin => "Admin",
            Role::Member => "Member",
            Role::Viewer => "Viewer",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Owner => "Full control over the organization and all projects",
            Role::Admin => "Manage members and projects, but cannot delete the organization",
            Role::Member => "Can create and edit content within projects",
            Role::Viewer => "Read-only access to organization content",
        }
    }

    pub fn is_assignable(self) -> bool {
        ASSIGNABLE_ROLES.contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            other => Err(ParseRoleError(other.to_owned())),
        }
    }
}

impl PermissionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionAction::ManageOrg => "manage_org",
            PermissionAction::ManageMembers => "manage_members",
            PermissionAction::ManageProjects => "manage_projects",
            PermissionAction::InviteMembers => "invite_members",
            PermissionAction::Edit => "edit",
            PermissionAction::View => "view",
            PermissionAction::DeleteOrg => "delete_org",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [PermissionAction; 7] = [
        PermissionAction::ManageOrg,
        PermissionAction::ManageMembers,
        PermissionAction::ManageProjects,
        PermissionAction::InviteMembers,
        PermissionAction::Edit,
        PermissionAction::View,
        PermissionAction::DeleteOrg,
    ];

    fn allowed(role: Role) -> Vec<PermissionAction> {
        ALL_ACTIONS
            .iter()
            .copied()
            .filter(|action| can_do(Some(role), *action))
            .collect()
    }

    #[test]
    fn policy_table_matches_roles() {
        use PermissionAction::*;

        assert_eq!(
            allowed(Role::Owner),
            vec![
                ManageOrg,
                ManageMembers,
                ManageProjects,
                InviteMembers,
                Edit,
                View,
                DeleteOrg
            ]
        );
        assert_eq!(
            allowed(Role::Admin),
            vec![ManageMembers, ManageProjects, InviteMembers, Edit, View]
        );
        assert_eq!(allowed(Role::Member), vec![Edit, View]);
        assert_eq!(allowed(Role::Viewer), vec![View]);
    }

    #[test]
    fn absent_role_is_denied_everything() {
        for action in ALL_ACTIONS {
            assert!(!can_do(None, action), "{action} allowed without a role");
        }
    }

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Member);
        assert!(Role::Member > Role::Viewer);
    }

    #[test]
    fn owner_is_not_assignable() {
        assert!(!Role::Owner.is_assignable());
        for role in ASSIGNABLE_ROLES {
            assert!(role.is_assignable());
        }
    }

    #[test]
    fn roles_parse_from_lowercase_names() {
        for role in ALL_ROLES {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(ParseRoleError("superuser".into()))
        );
    }
}
