use axum::http::HeaderMap;
use orgkit_core::{
    db::errors::is_unique_violation,
    organization::{OrganizationRecord, OrganizationService},
    user::{SessionRecord, UserRecord, UserStore},
    validation::{normalize_email, normalize_name},
};
use tracing::{info, warn};

use crate::{
    AppError,
    auth::{generate_password_hash, validate_password},
    cookies::{build_session_cookie, clear_session_cookie, extract_session_token},
    types::{AuthenticatedRestSession, SessionLookup, SessionUser, UpdateProfileRequest},
};

/// A freshly registered account with its personal organization and first
/// session.
pub(crate) struct Registration {
    pub(crate) user: UserRecord,
    pub(crate) session: SessionRecord,
    pub(crate) organization: OrganizationRecord,
}

pub struct UserService {
    user_store: UserStore,
    organizations: OrganizationService,
}

impl UserService {
    pub fn new(user_store: UserStore, organizations: OrganizationService) -> Self {
        Self {
            user_store,
            organizations,
        }
    }

    pub(crate) async fn fetch_user(&self, user_id: &str) -> Result<UserRecord, AppError> {
        self.user_store
            .find_by_id(user_id)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }

    /// Creates the account and its personal organization. The account is
    /// removed again when the organization cannot be created.
    pub(crate) async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Registration, AppError> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let full_name = full_name
            .filter(|name| !name.trim().is_empty())
            .map(|name| normalize_name(name, "full name"))
            .transpose()?;

        let password_hash =
            generate_password_hash(password).map_err(|err| AppError::internal(err.into()))?;

        let user = match self
            .user_store
            .create(&email, &password_hash, full_name.as_deref())
            .await
        {
            Ok(user) => user,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::conflict("an account with this email already exists"));
            }
            Err(err) => return Err(AppError::from_anyhow(err)),
        };

        let organization = match self
            .organizations
            .create_personal_organization(&user.id, user.full_name.as_deref(), &user.email)
            .await
        {
            Ok(organization) => organization,
            Err(err) => {
                warn!(
                    user_id = %user.id,
                    error = %err,
                    "personal organization failed; removing account"
                );
                if let Err(cleanup) = self.user_store.delete(&user.id).await {
                    warn!(user_id = %user.id, error = ?cleanup, "failed to remove account");
                }
                return Err(err.into());
            }
        };

        let session = self
            .user_store
            .create_session(&user.id)
            .await
            .map_err(AppError::from_anyhow)?;

        info!(user_id = %user.id, org_id = %organization.id, "account registered");
        Ok(Registration {
            user,
            session,
            organization,
        })
    }

    pub(crate) async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<UserRecord, AppError> {
        let UpdateProfileRequest {
            full_name,
            avatar_url,
            remove_avatar,
        } = request;

        let name_update: Option<Option<String>> = full_name
            .map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    normalize_name(trimmed, "full name").map(Some)
                }
            })
            .transpose()?;

        let avatar_update: Option<Option<String>> = if remove_avatar.unwrap_or(false) {
            Some(None)
        } else {
            avatar_url.map(|value| Some(value.trim().to_owned()))
        };

        self.user_store
            .update_profile(user_id, name_update, avatar_update)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }

    /// Rehashes the password. Existing sessions, the caller's included, stay
    /// valid.
    pub(crate) async fn change_password(
        &self,
        user_id: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        validate_password(new_password)?;
        let password_hash =
            generate_password_hash(new_password).map_err(|err| AppError::internal(err.into()))?;

        if !self
            .user_store
            .update_password_hash(user_id, &password_hash)
            .await
            .map_err(AppError::from_anyhow)?
        {
            return Err(AppError::unauthorized("authentication required"));
        }

        info!(user_id, "password changed");
        Ok(())
    }

    pub(crate) async fn authenticate_rest_request(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedRestSession, AppError> {
        let Some(session_id) = extract_session_token(headers) else {
            return Err(AppError::unauthorized("authentication required"));
        };

        let Some(session) = self
            .user_store
            .refresh_session(&session_id)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Err(AppError::unauthorized("session expired"));
        };

        let user = self.fetch_user(&session.user_id).await?;
        let set_cookies = vec![build_session_cookie(&session.id, session.expires_at)];

        Ok(AuthenticatedRestSession { user, set_cookies })
    }

    /// Session state for the current request. Never fails on a missing or
    /// stale session; the cookie is cleared instead.
    pub(crate) async fn pad_session_response(
        &self,
        headers: &HeaderMap,
    ) -> Result<SessionLookup, AppError> {
        let Some(session_id) = extract_session_token(headers) else {
            return Ok(SessionLookup {
                user: None,
                cookies: Vec::new(),
            });
        };

        let Some(session) = self
            .user_store
            .refresh_session(&session_id)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Ok(SessionLookup {
                user: None,
                cookies: vec![clear_session_cookie()],
            });
        };

        let Some(user) = self
            .user_store
            .find_by_id(&session.user_id)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            self.delete_session(&session.id).await?;
            return Ok(SessionLookup {
                user: None,
                cookies: vec![clear_session_cookie()],
            });
        };

        Ok(SessionLookup {
            user: Some(SessionUser::from(&user)),
            cookies: vec![build_session_cookie(&session.id, session.expires_at)],
        })
    }

    pub(crate) async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        self.user_store
            .delete_session(session_id)
            .await
            .map_err(AppError::from_anyhow)
    }
}
