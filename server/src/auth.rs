// Password and session authentication

use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use axum::http::HeaderMap;
use orgkit_core::user::{SessionRecord, UserRecord};

use crate::{
    error::AppError,
    state::AppState,
    types::{AuthenticatedRestSession, SessionLookup},
};

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const MAX_PASSWORD_LEN: usize = 256;

pub(crate) async fn authenticate_rest_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedRestSession, AppError> {
    state.user_service.authenticate_rest_request(headers).await
}

pub(crate) async fn authenticate_with_password(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(UserRecord, SessionRecord), AppError> {
    let Some(user) = state
        .user_store
        .find_by_email(email)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Err(AppError::unauthorized("invalid credentials"));
    };

    if user.password_hash.trim().is_empty() {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let parsed_hash =
        PasswordHash::new(&user.password_hash).map_err(|err| AppError::internal(err.into()))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::unauthorized("invalid credentials"))?;

    let session = state
        .user_store
        .create_session(&user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    Ok((user, session))
}

pub(crate) async fn pad_session_response(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<SessionLookup, AppError> {
    state.user_service.pad_session_response(headers).await
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if length > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn generate_password_hash(password: &str) -> Result<String, PasswordHashError> {
    let mut rng = OsRng;
    let salt = SaltString::generate(&mut rng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_state;

    #[test]
    fn password_length_is_bounded() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn password_round_trip_opens_a_session() {
        let (_temp_dir, _database, state) = setup_state().await;
        let hash = generate_password_hash("correct horse").expect("hash password");
        let user = state
            .user_store
            .create("carol@example.com", &hash, None)
            .await
            .expect("create user");

        let (signed_in, session) =
            authenticate_with_password(&state, "carol@example.com", "correct horse")
                .await
                .expect("sign in");
        assert_eq!(signed_in.id, user.id);
        assert_eq!(session.user_id, user.id);

        let err = authenticate_with_password(&state, "carol@example.com", "wrong password")
            .await
            .expect_err("wrong password rejected");
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);

        let err = authenticate_with_password(&state, "nobody@example.com", "correct horse")
            .await
            .expect_err("unknown user rejected");
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
