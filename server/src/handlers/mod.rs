// HTTP handlers module structure

pub(crate) mod auth_handlers;
pub(crate) mod health_handlers;
pub(crate) mod invitation_handlers;
pub(crate) mod org_handlers;
pub(crate) mod project_handlers;
