// Authentication, session and profile handlers

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    auth::{authenticate_rest_request, authenticate_with_password, pad_session_response},
    cookies::{build_session_cookie, clear_session_cookie, extract_session_token},
    error::AppError,
    http::{append_set_cookie_headers, no_content_with_cookies},
    state::AppState,
    types::{
        ChangePasswordRequest, SessionUser, SessionUserPayload, SignInRequest, SignUpRequest,
        SignUpResponse, UpdateProfileRequest,
    },
};
use orgkit_core::validation::is_valid_email;

pub(crate) async fn sign_up_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Response, AppError> {
    let SignUpRequest {
        email,
        password,
        full_name,
    } = payload;

    let registration = state
        .user_service
        .sign_up(&email, &password, full_name.as_deref())
        .await?;

    let cookies = vec![build_session_cookie(
        &registration.session.id,
        registration.session.expires_at,
    )];

    let body = SignUpResponse {
        user: SessionUser::from(&registration.user),
        org_slug: registration.organization.slug,
    };
    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    append_set_cookie_headers(&mut response, &cookies)?;
    Ok(response)
}

pub(crate) async fn sign_in_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Response, AppError> {
    let SignInRequest { email, password } = payload;
    let email = email.trim().to_owned();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("invalid email address"));
    }

    let password = password.ok_or_else(|| AppError::bad_request("password is required"))?;
    if password.is_empty() {
        return Err(AppError::bad_request("password is required"));
    }

    let (user, session) = authenticate_with_password(&state, &email, &password).await?;

    let cookies = vec![build_session_cookie(&session.id, session.expires_at)];

    let mut response = Json(SessionUser::from(&user)).into_response();
    append_set_cookie_headers(&mut response, &cookies)?;
    Ok(response)
}

pub(crate) async fn sign_out_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(session_id) = extract_session_token(&headers) {
        state.user_service.delete_session(&session_id).await?;
    }

    let mut response = Json(json!({})).into_response();
    append_set_cookie_headers(&mut response, &[clear_session_cookie()])?;
    Ok(response)
}

pub(crate) async fn get_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session_lookup = pad_session_response(&state, &headers).await?;
    let payload = SessionUserPayload {
        user: session_lookup.user,
    };
    let mut response = Json(payload).into_response();
    append_set_cookie_headers(&mut response, &session_lookup.cookies)?;
    Ok(response)
}

pub(crate) async fn update_profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let user = state
        .user_service
        .update_profile(auth.user.id.as_str(), payload)
        .await?;

    let mut response = Json(SessionUser::from(&user)).into_response();
    append_set_cookie_headers(&mut response, &auth.set_cookies)?;
    Ok(response)
}

pub(crate) async fn change_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .user_service
        .change_password(auth.user.id.as_str(), &payload.new_password)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}
