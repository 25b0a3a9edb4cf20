use std::fmt;

use anyhow::Error as AnyError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orgkit_core::error::TenancyError;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::error;

#[derive(Debug, Clone, Copy)]
struct ErrorDescriptor {
    status: StatusCode,
    name: &'static str,
    error_type: &'static str,
    default_message: &'static str,
}

const BAD_REQUEST_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::BAD_REQUEST,
    name: "BAD_REQUEST",
    error_type: "BAD_REQUEST",
    default_message: "Bad request.",
};

const UNAUTHORIZED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::UNAUTHORIZED,
    name: "AUTHENTICATION_REQUIRED",
    error_type: "AUTHENTICATION_REQUIRED",
    default_message: "You must sign in first to access this resource.",
};

const FORBIDDEN_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::FORBIDDEN,
    name: "ACTION_FORBIDDEN",
    error_type: "NO_PERMISSION",
    default_message: "Action forbidden.",
};

const NOT_FOUND_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::NOT_FOUND,
    name: "NOT_FOUND",
    error_type: "RESOURCE_NOT_FOUND",
    default_message: "Resource not found.",
};

const CONFLICT_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "RESOURCE_ALREADY_EXISTS",
    error_type: "RESOURCE_ALREADY_EXISTS",
    default_message: "Resource already exists.",
};

const DUPLICATE_INVITATION_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "DUPLICATE_INVITATION",
    error_type: "RESOURCE_ALREADY_EXISTS",
    default_message: "A pending invitation already exists for this email.",
};

const ALREADY_ACCEPTED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::CONFLICT,
    name: "INVITATION_ALREADY_ACCEPTED",
    error_type: "INVITATION_STATE",
    default_message: "This invitation has already been accepted.",
};

const EXPIRED_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::GONE,
    name: "INVITATION_EXPIRED",
    error_type: "INVITATION_STATE",
    default_message: "This invitation has expired.",
};

const EMAIL_MISMATCH_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::FORBIDDEN,
    name: "EMAIL_MISMATCH",
    error_type: "NO_PERMISSION",
    default_message: "This invitation was sent to a different email address.",
};

const INTERNAL_SERVER_ERROR_DESCRIPTOR: ErrorDescriptor = ErrorDescriptor {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    name: "INTERNAL_SERVER_ERROR",
    error_type: "INTERNAL_SERVER_ERROR",
    default_message: "An internal error occurred.",
};

#[derive(Debug)]
pub struct AppError {
    descriptor: &'static ErrorDescriptor,
    name: String,
    error_type: String,
    message: String,
    data: Option<JsonValue>,
    source: Option<AnyError>,
}

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::from_descriptor(&BAD_REQUEST_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_descriptor(&UNAUTHORIZED_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::from_descriptor(&CONFLICT_DESCRIPTOR, Some(message.into()))
    }

    pub(crate) fn internal(error: AnyError) -> Self {
        error!(?error, "internal server error");
        Self::from_descriptor(&INTERNAL_SERVER_ERROR_DESCRIPTOR, None).with_source(error)
    }

    pub(crate) fn from_anyhow(error: AnyError) -> Self {
        Self::internal(error)
    }

    /// One descriptor per error kind so clients can render a specific
    /// message for each business outcome.
    pub(crate) fn from_tenancy(error: TenancyError) -> Self {
        match error {
            TenancyError::Unauthenticated => {
                Self::from_descriptor(&UNAUTHORIZED_DESCRIPTOR, None)
            }
            TenancyError::Unauthorized(action) => Self::from_descriptor(
                &FORBIDDEN_DESCRIPTOR,
                Some(format!("Your role does not permit {action}.")),
            )
            .with_data(json!({ "action": action })),
            TenancyError::NotFound(resource) => Self::from_descriptor(
                &NOT_FOUND_DESCRIPTOR,
                Some(format!("{} not found.", capitalize(resource))),
            )
            .with_data(json!({ "resource": resource })),
            TenancyError::ValidationError(message) => {
                Self::from_descriptor(&BAD_REQUEST_DESCRIPTOR, Some(message))
                    .with_name("VALIDATION_ERROR")
            }
            TenancyError::DuplicateInvitation => {
                Self::from_descriptor(&DUPLICATE_INVITATION_DESCRIPTOR, None)
            }
            TenancyError::AlreadyAccepted => {
                Self::from_descriptor(&ALREADY_ACCEPTED_DESCRIPTOR, None)
            }
            TenancyError::Expired => Self::from_descriptor(&EXPIRED_DESCRIPTOR, None),
            TenancyError::EmailMismatch => {
                Self::from_descriptor(&EMAIL_MISMATCH_DESCRIPTOR, None)
            }
            TenancyError::StorageError(error) => Self::internal(error),
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.descriptor.status
    }

    pub(crate) fn into_payload(self) -> (StatusCode, UserFriendlyPayload) {
        let AppError {
            descriptor,
            name,
            error_type,
            message,
            data,
            source: _,
        } = self;

        let status = descriptor.status;
        let (code, reason) = code_and_reason(status);
        let payload = UserFriendlyPayload {
            status: status.as_u16(),
            code,
            reason,
            error_type,
            name,
            message,
            data,
        };

        (status, payload)
    }

    fn from_descriptor(descriptor: &'static ErrorDescriptor, message: Option<String>) -> Self {
        Self {
            descriptor,
            name: descriptor.name.to_owned(),
            error_type: descriptor.error_type.to_owned(),
            message: message.unwrap_or_else(|| descriptor.default_message.to_owned()),
            data: None,
            source: None,
        }
    }

    fn with_source(mut self, error: AnyError) -> Self {
        self.source = Some(error);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<TenancyError> for AppError {
    fn from(error: TenancyError) -> Self {
        Self::from_tenancy(error)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = self.into_payload();
        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UserFriendlyPayload {
    pub(crate) status: u16,
    pub(crate) code: String,
    pub(crate) reason: String,
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) name: String,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<JsonValue>,
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn code_and_reason(status: StatusCode) -> (String, String) {
    let reason = status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    let code = reason
        .chars()
        .map(|ch| match ch {
            'a'..='z' => ch.to_ascii_uppercase(),
            'A'..='Z' | '0'..='9' => ch,
            _ => '_',
        })
        .collect::<String>();

    (code, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use orgkit_core::rbac::PermissionAction;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body_bytes).unwrap())
    }

    #[tokio::test]
    async fn http_error_payload_matches_contract() {
        let (status, json) = body_json(AppError::bad_request("email must not be empty")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], 400);
        assert_eq!(json["code"], "BAD_REQUEST");
        assert_eq!(json["reason"], "Bad Request");
        assert_eq!(json["type"], "BAD_REQUEST");
        assert_eq!(json["name"], "BAD_REQUEST");
        assert_eq!(json["message"], "email must not be empty");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn unauthorized_action_is_forbidden_with_action_data() {
        let (status, json) = body_json(AppError::from(TenancyError::Unauthorized(
            PermissionAction::InviteMembers,
        )))
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "FORBIDDEN");
        assert_eq!(json["type"], "NO_PERMISSION");
        assert_eq!(json["message"], "Your role does not permit invite_members.");
        assert_eq!(json["data"]["action"], "invite_members");
    }

    #[tokio::test]
    async fn invitation_outcomes_have_distinct_names() {
        let cases = [
            (TenancyError::DuplicateInvitation, 409, "DUPLICATE_INVITATION"),
            (TenancyError::AlreadyAccepted, 409, "INVITATION_ALREADY_ACCEPTED"),
            (TenancyError::Expired, 410, "INVITATION_EXPIRED"),
            (TenancyError::EmailMismatch, 403, "EMAIL_MISMATCH"),
            (TenancyError::NotFound("invitation"), 404, "NOT_FOUND"),
            (TenancyError::validation("bad role"), 400, "VALIDATION_ERROR"),
            (TenancyError::Unauthenticated, 401, "AUTHENTICATION_REQUIRED"),
        ];

        for (error, status, name) in cases {
            let (actual_status, json) = body_json(AppError::from(error)).await;
            assert_eq!(actual_status.as_u16(), status, "{name}");
            assert_eq!(json["name"], name);
        }
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let (_, json) = body_json(AppError::from(TenancyError::NotFound("project"))).await;
        assert_eq!(json["message"], "Project not found.");
        assert_eq!(json["data"]["resource"], "project");
    }

    #[tokio::test]
    async fn storage_errors_hide_details() {
        let (status, json) = body_json(AppError::from(TenancyError::StorageError(
            anyhow::anyhow!("disk i/o error"),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "An internal error occurred.");
    }
}
