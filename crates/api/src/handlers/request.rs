//! Handlers for the `/requests` resource: raising, viewing, listing,
//! and executing transitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use praxis_core::graph::{Step, Transition};
use praxis_core::request::{
    AssignmentHistoryEntry, HistoryEntry, ServiceRequest, StepHistoryEntry,
};
use praxis_core::store::RequestFilter;
use praxis_core::types::DbId;
use praxis_engine::executor::{RaiseRequest, RequestView, TransitionOutcome};

use crate::error::AppResult;
use crate::middleware::actor::Actor;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct RaiseRequestBody {
    pub firm_id: DbId,
    /// Explicit workflow to run the request through.
    pub workflow_id: Option<DbId>,
    /// Service whose default workflow should be used instead.
    pub service_type: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub client_ref: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestListQuery {
    pub firm_id: DbId,
    pub step_id: Option<DbId>,
    pub assigned_to: Option<DbId>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExecuteTransitionBody {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RaisedResponse {
    pub request: ServiceRequest,
    pub creation_entry: StepHistoryEntry,
}

/// Request detail: the row, its current step, and what the acting
/// accountant may do next.
#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub request: ServiceRequest,
    pub step: Step,
    pub legal_transitions: Vec<Transition>,
}

impl From<RequestView> for RequestDetail {
    fn from(view: RequestView) -> Self {
        Self {
            request: view.request,
            step: view.step,
            legal_transitions: view.legal_transitions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionResult {
    pub request: ServiceRequest,
    pub step: Step,
    pub step_entry: StepHistoryEntry,
    pub assignment_entry: Option<AssignmentHistoryEntry>,
    pub legal_transitions: Vec<Transition>,
}

impl From<TransitionOutcome> for TransitionResult {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            request: outcome.request,
            step: outcome.step,
            step_entry: outcome.step_entry,
            assignment_entry: outcome.assignment_entry,
            legal_transitions: outcome.legal_transitions,
        }
    }
}

/// POST /api/v1/requests
pub async fn raise(
    actor: Actor,
    State(state): State<AppState>,
    Json(body): Json<RaiseRequestBody>,
) -> AppResult<(StatusCode, Json<RaisedResponse>)> {
    body.validate()?;
    let (request, creation_entry) = state
        .engine
        .raise_request(
            RaiseRequest {
                firm_id: body.firm_id,
                workflow_id: body.workflow_id,
                service_type: body.service_type,
                client_ref: body.client_ref,
                title: body.title,
            },
            actor.id,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RaisedResponse {
            request,
            creation_entry,
        }),
    ))
}

/// GET /api/v1/requests
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<Vec<ServiceRequest>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);
    let requests = state
        .store
        .list_requests(RequestFilter {
            firm_id: Some(query.firm_id),
            step_id: query.step_id,
            assigned_to: query.assigned_to,
            status: query.status,
            limit,
            offset,
        })
        .await?;
    Ok(Json(requests))
}

/// GET /api/v1/requests/{id}
pub async fn get_by_id(
    actor: Actor,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<Json<RequestDetail>> {
    let view = state.engine.view_request(request_id, actor.id).await?;
    Ok(Json(view.into()))
}

/// GET /api/v1/requests/{id}/transitions
///
/// The transitions out of the request's current step that the acting
/// accountant's roles allow.
pub async fn list_transitions(
    actor: Actor,
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<Json<Vec<Transition>>> {
    let transitions = state.engine.legal_transitions(request_id, actor.id).await?;
    Ok(Json(transitions))
}

/// POST /api/v1/requests/{id}/transitions/{transition_id}
///
/// The body is optional; when present it may carry a note for the step
/// ledger.
pub async fn execute(
    actor: Actor,
    State(state): State<AppState>,
    Path((request_id, transition_id)): Path<(DbId, DbId)>,
    body: Option<Json<ExecuteTransitionBody>>,
) -> AppResult<Json<TransitionResult>> {
    let note = body.and_then(|Json(b)| b.note);
    let outcome = state
        .engine
        .execute_transition(request_id, transition_id, actor.id, note)
        .await?;
    Ok(Json(outcome.into()))
}

/// GET /api/v1/requests/{id}/history
///
/// The merged step and assignment ledgers, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Path(request_id): Path<DbId>,
) -> AppResult<Json<Vec<HistoryEntry>>> {
    let entries = state.engine.history(request_id).await?;
    Ok(Json(entries))
}
