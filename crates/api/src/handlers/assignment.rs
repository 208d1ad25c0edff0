//! Handlers for `/requests/{id}/assignment`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use praxis_core::request::{AssignmentHistoryEntry, ServiceRequest};
use praxis_core::types::{DbId, Timestamp};

use crate::error::AppResult;
use crate::middleware::actor::Actor;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AssignBody {
    pub accountant_id: DbId,
    /// Optional due date, recorded on the request's fields.
    pub deadline: Option<Timestamp>,
    #[validate(length(min = 1, max = 32))]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReassignBody {
    pub accountant_id: DbId,
    /// Mandatory; lands verbatim in the assignment ledger. Emptiness is
    /// checked by the engine so the dedicated error code applies.
    #[validate(length(max = 500))]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResult {
    pub request: ServiceRequest,
    pub entry: AssignmentHistoryEntry,
}

/// POST /api/v1/requests/{id}/assignment
pub async fn assign(
    actor: Actor,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(body): Json<AssignBody>,
) -> AppResult<(StatusCode, Json<AssignmentResult>)> {
    body.validate()?;
    let (request, entry) = state
        .engine
        .assign(
            request_id,
            body.accountant_id,
            actor.id,
            body.deadline,
            body.priority,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(AssignmentResult { request, entry })))
}

/// PUT /api/v1/requests/{id}/assignment
pub async fn reassign(
    actor: Actor,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
    Json(body): Json<ReassignBody>,
) -> AppResult<Json<AssignmentResult>> {
    body.validate()?;
    let (request, entry) = state
        .engine
        .reassign(request_id, body.accountant_id, actor.id, body.reason)
        .await?;
    Ok(Json(AssignmentResult { request, entry }))
}
