//! Handlers for the `/workflows` resource: definition authoring,
//! validation, activation, and default selection.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use praxis_core::graph::{AutomationAction, Step, StepKind, Transition, Workflow};
use praxis_core::store::{NewStep, NewTransition, NewWorkflow};
use praxis_core::types::DbId;
use praxis_core::validate::{ValidationFinding, ValidationReport};

use crate::error::AppResult;
use crate::middleware::actor::Actor;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkflowBody {
    pub firm_id: DbId,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub service_type: String,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowListQuery {
    pub firm_id: DbId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddStepBody {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub ordering: i32,
    pub kind: StepKind,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddTransitionBody {
    pub from_step_id: DbId,
    pub to_step_id: DbId,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// `None` means any role may execute the transition.
    pub allowed_roles: Option<Vec<String>>,
    #[serde(default)]
    pub actions: Vec<AutomationAction>,
}

/// The full definition of one workflow: the row plus its graph.
#[derive(Debug, Serialize)]
pub struct WorkflowGraphResponse {
    pub workflow: Workflow,
    pub steps: Vec<Step>,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub findings: Vec<ValidationFinding>,
}

/// POST /api/v1/workflows
pub async fn create(
    _actor: Actor,
    State(state): State<AppState>,
    Json(body): Json<CreateWorkflowBody>,
) -> AppResult<(StatusCode, Json<Workflow>)> {
    body.validate()?;
    let workflow = state
        .authoring
        .create_workflow(NewWorkflow {
            firm_id: body.firm_id,
            name: body.name,
            service_type: body.service_type,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/v1/workflows?firm_id=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<WorkflowListQuery>,
) -> AppResult<Json<Vec<Workflow>>> {
    let workflows = state.authoring.list_workflows(query.firm_id).await?;
    Ok(Json(workflows))
}

/// GET /api/v1/workflows/{id}
pub async fn get_graph(
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<Json<WorkflowGraphResponse>> {
    let graph = state.authoring.graph(workflow_id).await?;
    Ok(Json(WorkflowGraphResponse {
        workflow: graph.workflow().clone(),
        steps: graph.steps().to_vec(),
        transitions: graph.transitions().to_vec(),
    }))
}

/// POST /api/v1/workflows/{id}/steps
pub async fn add_step(
    _actor: Actor,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(body): Json<AddStepBody>,
) -> AppResult<(StatusCode, Json<Step>)> {
    body.validate()?;
    let step = state
        .authoring
        .add_step(
            workflow_id,
            NewStep {
                name: body.name,
                ordering: body.ordering,
                kind: body.kind,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(step)))
}

/// POST /api/v1/workflows/{id}/transitions
pub async fn add_transition(
    _actor: Actor,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(body): Json<AddTransitionBody>,
) -> AppResult<(StatusCode, Json<Transition>)> {
    body.validate()?;
    let transition = state
        .authoring
        .add_transition(
            workflow_id,
            NewTransition {
                from_step_id: body.from_step_id,
                to_step_id: body.to_step_id,
                name: body.name,
                allowed_roles: body.allowed_roles,
                actions: body.actions,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transition)))
}

/// GET /api/v1/workflows/{id}/validation
///
/// Runs the structural checks without activating, so authors can iterate
/// on a draft and see what still blocks activation.
pub async fn validation(
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<Json<ValidationResponse>> {
    let report: ValidationReport = state.authoring.validation_report(workflow_id).await?;
    Ok(Json(ValidationResponse {
        valid: report.is_valid(),
        findings: report.findings,
    }))
}

/// POST /api/v1/workflows/{id}/activate
pub async fn activate(
    actor: Actor,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<Json<Workflow>> {
    let workflow = state.authoring.activate(workflow_id, actor.id).await?;
    Ok(Json(workflow))
}

/// POST /api/v1/workflows/{id}/default
pub async fn set_default(
    _actor: Actor,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<Json<Workflow>> {
    let workflow = state.authoring.set_default(workflow_id).await?;
    Ok(Json(workflow))
}
