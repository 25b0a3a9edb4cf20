pub mod connection;
pub mod invitation_repo;
pub mod membership_repo;
pub mod organization_repo;
pub mod project_repo;
