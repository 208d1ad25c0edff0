use crate::types::DbId;

/// Domain error taxonomy shared by the engine, the stores, and the API.
///
/// Guard failures (`AlreadyTerminal`, `StaleTransition`, `Forbidden`,
/// `AlreadyAssigned`, `MissingReason`) are terminal for the attempted
/// operation and never committed anything. `AutomationFailed` is retryable
/// only when `retryable` is set: nothing was committed, so the caller may
/// repeat the whole call.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request {request_id} is already at a terminal step")]
    AlreadyTerminal { request_id: DbId },

    #[error("Stale transition: request {request_id} has moved off step {expected_step_id}")]
    StaleTransition {
        request_id: DbId,
        expected_step_id: DbId,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Request {request_id} is already assigned to accountant {assignee_id}")]
    AlreadyAssigned { request_id: DbId, assignee_id: DbId },

    #[error("A non-empty reason is required to reassign a request")]
    MissingReason,

    #[error("Automation action '{action}' failed: {reason}")]
    AutomationFailed {
        action: &'static str,
        reason: String,
        retryable: bool,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
