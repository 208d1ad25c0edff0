use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use praxis_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `praxis_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::AlreadyTerminal { request_id } => (
                    StatusCode::CONFLICT,
                    "ALREADY_TERMINAL",
                    format!("request {request_id} is already at a terminal step"),
                ),
                CoreError::StaleTransition { request_id, .. } => (
                    StatusCode::CONFLICT,
                    "STALE_TRANSITION",
                    format!("request {request_id} has moved on; reload it and pick a transition again"),
                ),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::AlreadyAssigned {
                    request_id,
                    assignee_id,
                } => (
                    StatusCode::CONFLICT,
                    "ALREADY_ASSIGNED",
                    format!("request {request_id} is already assigned to accountant {assignee_id}"),
                ),
                CoreError::MissingReason => (
                    StatusCode::BAD_REQUEST,
                    "MISSING_REASON",
                    "a non-empty reason is required to reassign a request".to_string(),
                ),
                CoreError::AutomationFailed {
                    action,
                    reason,
                    retryable,
                } => {
                    let status = if *retryable {
                        StatusCode::BAD_GATEWAY
                    } else {
                        StatusCode::UNPROCESSABLE_ENTITY
                    };
                    (
                        status,
                        "AUTOMATION_FAILED",
                        format!("automation '{action}' failed: {reason}"),
                    )
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        // Automation failures carry the retry hint so callers can tell a
        // transient collaborator outage from a broken workflow definition.
        let body = match &self {
            AppError::Core(CoreError::AutomationFailed { retryable, .. }) => json!({
                "error": message,
                "code": code,
                "retryable": retryable,
            }),
            _ => json!({
                "error": message,
                "code": code,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
