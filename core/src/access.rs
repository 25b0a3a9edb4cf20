use tracing::debug;

use crate::{
    db::membership_repo::MembershipRepositoryRef,
    error::{TenancyError, TenancyResult},
    ids::UserId,
    rbac::{PermissionAction, Role, can_do},
};

/// Authenticated caller as reported by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    /// Verified address of the signed-in account.
    pub email: String,
}

impl Caller {
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// Resolves an actor's membership role and checks it against the role policy.
///
/// A user with no membership row cannot see the organization at all, so the
/// guard reports `NotFound` for them rather than `Unauthorized`.
#[derive(Clone)]
pub struct AccessGuard {
    memberships: MembershipRepositoryRef,
}

impl AccessGuard {
    pub fn new(memberships: MembershipRepositoryRef) -> Self {
        Self { memberships }
    }

    pub async fn role_of(&self, org_id: &str, user_id: &str) -> TenancyResult<Option<Role>> {
        Ok(self.memberships.find_role(org_id, user_id).await?)
    }

    pub async fn require(
        &self,
        org_id: &str,
        user_id: &str,
        action: PermissionAction,
    ) -> TenancyResult<Role> {
        let role = self.role_of(org_id, user_id).await?;
        let Some(role) = role else {
            debug!(org_id, user_id, %action, "actor is not a member");
            return Err(TenancyError::NotFound("organization"));
        };

        if can_do(Some(role), action) {
            Ok(role)
        } else {
            debug!(org_id, user_id, %role, %action, "role lacks permission");
            Err(TenancyError::Unauthorized(action))
        }
    }
}
