pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod invitation;
pub mod membership;
pub mod notification;
pub mod organization;
pub mod project;
pub mod rbac;
pub mod slug;
pub mod user;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::Caller;
pub use error::{TenancyError, TenancyResult};
pub use rbac::{PermissionAction, Role, can_do};
