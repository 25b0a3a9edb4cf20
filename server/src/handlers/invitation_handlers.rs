// Invitation management and acceptance handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use orgkit_core::{
    Caller,
    invitation::{InvitationState, NewInvitation},
    notification::NotificationOutcome,
};

use crate::{
    auth::{authenticate_rest_request, pad_session_response},
    error::AppError,
    handlers::org_handlers::parse_role,
    http::{json_with_cookies, no_content_with_cookies},
    state::AppState,
    types::{
        AcceptInvitationResponse, CreateInvitationRequest, CreateInvitationResponse,
        InvitationLookupResponse, InvitationResponse, ResendInvitationResponse,
    },
};

fn email_outcome(outcome: NotificationOutcome) -> (bool, Option<String>) {
    match outcome {
        NotificationOutcome::Sent => (true, None),
        NotificationOutcome::Failed(reason) => (false, Some(reason)),
    }
}

pub(crate) async fn list_invitations_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let invitations = state
        .invitation_service
        .list_pending(&org_id, &auth.user.id)
        .await?;

    let body: Vec<InvitationResponse> = invitations
        .into_iter()
        .map(|pending| InvitationResponse::new(pending.invitation, pending.state))
        .collect();
    json_with_cookies(StatusCode::OK, body, &auth.set_cookies)
}

pub(crate) async fn create_invitation_handler(
    Path(org_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateInvitationRequest>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let role = parse_role(&payload.role)?;
    let project_id = payload
        .project_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty());

    let created = state
        .invitation_service
        .create(
            &org_id,
            &auth.user.id,
            NewInvitation {
                email: payload.email,
                role,
                project_id,
            },
        )
        .await?;

    let (email_sent, email_error) = email_outcome(created.notification);
    let body = CreateInvitationResponse {
        invitation: InvitationResponse::new(created.invitation, InvitationState::Pending),
        email_sent,
        email_error,
    };
    json_with_cookies(StatusCode::CREATED, body, &auth.set_cookies)
}

pub(crate) async fn revoke_invitation_handler(
    Path((org_id, invitation_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .invitation_service
        .revoke(&org_id, &invitation_id, &auth.user.id)
        .await?;
    no_content_with_cookies(&auth.set_cookies)
}

pub(crate) async fn resend_invitation_handler(
    Path((org_id, invitation_id)): Path<(String, String)>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let outcome = state
        .invitation_service
        .resend(&org_id, &invitation_id, &auth.user.id)
        .await?;

    let (email_sent, email_error) = email_outcome(outcome);
    json_with_cookies(
        StatusCode::OK,
        ResendInvitationResponse {
            email_sent,
            email_error,
        },
        &auth.set_cookies,
    )
}

/// Public: anyone holding the token may look. The screen depends on who is
/// signed in, if anyone.
pub(crate) async fn get_invitation_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session = pad_session_response(&state, &headers).await?;
    let viewer = session
        .user
        .as_ref()
        .map(|user| Caller::new(user.id.clone(), user.email.clone()));

    let lookup = state.invitation_service.resolve_for_display(&token).await?;
    json_with_cookies(
        StatusCode::OK,
        InvitationLookupResponse::new(&lookup, viewer.as_ref()),
        &session.cookies,
    )
}

pub(crate) async fn accept_invitation_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let accepted = state
        .invitation_service
        .accept(&token, &auth.caller())
        .await?;

    let body = AcceptInvitationResponse {
        org_id: accepted.org_id.into_inner(),
        org_slug: accepted.org_slug,
        project_id: accepted.project_id.map(|id| id.into_inner()),
        role: accepted.role,
    };
    json_with_cookies(StatusCode::OK, body, &auth.set_cookies)
}
