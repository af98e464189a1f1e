use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use time::Date;
use tracing::error;

/// Everything a handler or the lifecycle engine can fail with. Each variant
/// maps to one HTTP status and a stable `code` string so callers can
/// distinguish failures programmatically.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Member is not part of this kuri")]
    InvalidMember,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("This rotation policy is disabled for this deployment")]
    PolicyDisabled,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("User already exists")]
    DuplicateEmail,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("Winner for month {month} cannot be taken before {eligible_on}")]
    TooEarly { month: u32, eligible_on: Date },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidMember => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::PolicyDisabled => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateEmail | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TooEarly { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "missing_fields",
            Self::InvalidMember => "invalid_member",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden(_) => "forbidden",
            Self::PolicyDisabled => "policy_disabled",
            Self::NotFound(_) => "not_found",
            Self::DuplicateEmail => "duplicate_email",
            Self::Conflict(_) => "conflict",
            Self::TooEarly { .. } => "too_early",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "success": false,
            "error": message,
            "code": self.code(),
        }));
        (self.status(), body).into_response()
    }
}
