use anyhow::Error as AnyError;
use thiserror::Error;

use crate::rbac::{ParseRoleError, PermissionAction};

pub type TenancyResult<T> = Result<T, TenancyError>;

/// Outcome kinds shared by every organization, project and invitation
/// operation. Business-rule rejections are ordinary variants so callers can
/// render a specific message per kind; only `StorageError` is worth retrying.
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("role does not permit {0}")]
    Unauthorized(PermissionAction),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    ValidationError(String),
    #[error("a pending invitation already exists for this email")]
    DuplicateInvitation,
    #[error("invitation has already been accepted")]
    AlreadyAccepted,
    #[error("invitation has expired")]
    Expired,
    #[error("invitation was sent to a different email address")]
    EmailMismatch,
    #[error("storage failure: {0:#}")]
    StorageError(#[from] AnyError),
}

impl TenancyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Stable identifier used in logs and error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::DuplicateInvitation => "duplicate_invitation",
            Self::AlreadyAccepted => "already_accepted",
            Self::Expired => "expired",
            Self::EmailMismatch => "email_mismatch",
            Self::StorageError(_) => "storage_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }
}

impl From<ParseRoleError> for TenancyError {
    fn from(err: ParseRoleError) -> Self {
        Self::ValidationError(err.to_string())
    }
}
