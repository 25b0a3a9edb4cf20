pub mod auth;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod http;
pub mod mailer;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;
pub mod user;

pub use error::AppError;
pub use state::{AppState, StateBuildConfig, build_state, build_state_with_config};

#[cfg(test)]
pub mod test_support;
