//! The transition executor: the state-machine core.
//!
//! `execute_transition` runs entirely under the per-request lock: guards
//! first (terminal, stale, role), then the automation actions with their
//! effects buffered, then one atomic store commit, and only after the
//! commit do events leave the process. A failure at any point before the
//! commit leaves no observable state change.

use std::sync::Arc;

use praxis_core::error::CoreError;
use praxis_core::graph::{AssignTarget, AutomationAction, Step, Transition, WorkflowGraph};
use praxis_core::request::{
    merge_history, status_for_step, AssignmentHistoryEntry, AssignmentKind, HistoryEntry,
    ServiceRequest, StepHistoryEntry,
};
use praxis_core::store::{AssignmentChange, EngineStore, NewRequest, TransitionCommit};
use praxis_core::types::DbId;
use praxis_events::bus::{
    EVENT_NOTIFICATION_REQUESTED, EVENT_REQUEST_ASSIGNED, EVENT_REQUEST_RAISED,
    EVENT_REQUEST_REASSIGNED, EVENT_REQUEST_TRANSITIONED,
};
use praxis_events::{EventBus, PlatformEvent};

use crate::cache::WorkflowCache;
use crate::collab::{FieldStore, RoleProvider, TaskCreator};
use crate::locks::RequestLocks;

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// Input for raising a request.
///
/// Either `workflow_id` names the workflow explicitly or `service_type`
/// selects the firm's default workflow for that service.
#[derive(Debug, Clone)]
pub struct RaiseRequest {
    pub firm_id: DbId,
    pub workflow_id: Option<DbId>,
    pub service_type: Option<String>,
    pub client_ref: String,
    pub title: String,
}

/// Everything a caller needs after a successful transition, so one call
/// refreshes the whole request view without further round trips.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: ServiceRequest,
    pub step: Step,
    pub step_entry: StepHistoryEntry,
    pub assignment_entry: Option<AssignmentHistoryEntry>,
    /// Transitions out of the new step that the acting user may execute.
    pub legal_transitions: Vec<Transition>,
}

/// Read model for the request detail surface.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub request: ServiceRequest,
    pub step: Step,
    pub legal_transitions: Vec<Transition>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The transition executor and assignment manager.
///
/// Holds the storage port, the graph cache, the collaborator interfaces,
/// and the per-request locks. Shared as `Arc<WorkflowEngine>` across
/// request handlers.
pub struct WorkflowEngine {
    store: Arc<dyn EngineStore>,
    graphs: Arc<WorkflowCache>,
    roles: Arc<dyn RoleProvider>,
    fields: Arc<dyn FieldStore>,
    tasks: Arc<dyn TaskCreator>,
    bus: Arc<EventBus>,
    locks: RequestLocks,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn EngineStore>,
        graphs: Arc<WorkflowCache>,
        roles: Arc<dyn RoleProvider>,
        fields: Arc<dyn FieldStore>,
        tasks: Arc<dyn TaskCreator>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            graphs,
            roles,
            fields,
            tasks,
            bus,
            locks: RequestLocks::new(),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn EngineStore> {
        &self.store
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn locks(&self) -> &RequestLocks {
        &self.locks
    }

    /// Read-through graph lookup. Active graphs are immutable, so a cached
    /// entry stays valid until authoring invalidates it.
    pub(crate) async fn graph(&self, workflow_id: DbId) -> Result<Arc<WorkflowGraph>, CoreError> {
        if let Some(graph) = self.graphs.get(workflow_id) {
            return Ok(graph);
        }
        let graph = self
            .store
            .load_graph(workflow_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            })?;
        Ok(self.graphs.insert(graph))
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Raise a new request at its workflow's START step, writing the
    /// creation ledger entry in the same commit.
    pub async fn raise_request(
        &self,
        input: RaiseRequest,
        actor_id: DbId,
    ) -> Result<(ServiceRequest, StepHistoryEntry), CoreError> {
        let workflow = match input.workflow_id {
            Some(id) => self
                .store
                .find_workflow(id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "workflow",
                    id,
                })?,
            None => {
                let service_type = input.service_type.as_deref().ok_or_else(|| {
                    CoreError::Validation(
                        "either workflow_id or service_type is required".to_string(),
                    )
                })?;
                self.store
                    .find_default_workflow(input.firm_id, service_type)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Validation(format!(
                            "no default workflow configured for service type '{service_type}'"
                        ))
                    })?
            }
        };

        if workflow.firm_id != input.firm_id {
            return Err(CoreError::Validation(format!(
                "workflow {} belongs to a different firm",
                workflow.id
            )));
        }
        if !workflow.is_active {
            return Err(CoreError::Validation(format!(
                "workflow {} is not active",
                workflow.id
            )));
        }

        let graph = self.graph(workflow.id).await?;
        let start = graph.start_step().ok_or_else(|| {
            CoreError::Internal(format!("active workflow {} has no start step", workflow.id))
        })?;

        let (request, entry) = self
            .store
            .insert_request(NewRequest {
                firm_id: input.firm_id,
                workflow_id: workflow.id,
                client_ref: input.client_ref,
                title: input.title,
                start_step_id: start.id,
                status: status_for_step(start),
                actor_id,
            })
            .await?;

        tracing::info!(
            request_id = request.id,
            workflow_id = workflow.id,
            step = %start.name,
            actor_id,
            "Request raised"
        );
        self.bus.publish(
            PlatformEvent::new(EVENT_REQUEST_RAISED)
                .with_entity("request", request.id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "workflow_id": workflow.id,
                    "step_id": start.id,
                    "status": request.status,
                })),
        );
        Ok((request, entry))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn view_request(
        &self,
        request_id: DbId,
        actor_id: DbId,
    ) -> Result<RequestView, CoreError> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "request",
                id: request_id,
            })?;
        let graph = self.graph(request.workflow_id).await?;
        let step = self.current_step(&graph, &request)?.clone();
        let legal_transitions = self
            .allowed_transitions(&graph, request.current_step_id, actor_id)
            .await?;
        Ok(RequestView {
            request,
            step,
            legal_transitions,
        })
    }

    /// The transitions out of the request's current step that `actor_id`
    /// may execute. This is the discovery surface: when several transitions
    /// share a from-step the caller picks one, the executor never guesses.
    pub async fn legal_transitions(
        &self,
        request_id: DbId,
        actor_id: DbId,
    ) -> Result<Vec<Transition>, CoreError> {
        Ok(self.view_request(request_id, actor_id).await?.legal_transitions)
    }

    /// Both ledgers for a request, merged into one timeline.
    pub async fn history(&self, request_id: DbId) -> Result<Vec<HistoryEntry>, CoreError> {
        if self.store.find_request(request_id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "request",
                id: request_id,
            });
        }
        let steps = self.store.step_history(request_id).await?;
        let assignments = self.store.assignment_history(request_id).await?;
        Ok(merge_history(steps, assignments))
    }

    // -----------------------------------------------------------------------
    // Transition execution
    // -----------------------------------------------------------------------

    /// Execute `transition_id` on `request_id` as `actor_id`.
    ///
    /// Guard order: terminal, stale, forbidden, then automation actions in
    /// list order. Local effects are buffered and land in one atomic store
    /// commit together with the step change, the status recompute, and the
    /// ledger appends. Events and notifications are published only after
    /// the commit succeeds.
    pub async fn execute_transition(
        &self,
        request_id: DbId,
        transition_id: DbId,
        actor_id: DbId,
        note: Option<String>,
    ) -> Result<TransitionOutcome, CoreError> {
        let _guard = self.locks.acquire(request_id).await;

        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "request",
                id: request_id,
            })?;
        let graph = self.graph(request.workflow_id).await?;

        let current_step = self.current_step(&graph, &request)?;
        if current_step.is_terminal() {
            return Err(CoreError::AlreadyTerminal { request_id });
        }

        let transition = graph
            .transition(transition_id)
            .ok_or(CoreError::NotFound {
                entity: "transition",
                id: transition_id,
            })?;
        if transition.from_step_id != request.current_step_id {
            return Err(CoreError::StaleTransition {
                request_id,
                expected_step_id: transition.from_step_id,
            });
        }

        if !self.actor_allowed(actor_id, transition).await? {
            return Err(CoreError::Forbidden(format!(
                "actor {actor_id} holds none of the roles allowed for transition '{}'",
                transition.name
            )));
        }

        // Run the automation actions in order, buffering local effects.
        // External calls (task creation) happen here and are at-least-once;
        // everything else is flushed with the commit below.
        let mut field_updates: Vec<(String, serde_json::Value)> = Vec::new();
        let mut assignment: Option<AssignmentChange> = None;
        let mut notifications: Vec<String> = Vec::new();
        let mut created_tasks: Vec<DbId> = Vec::new();
        let mut effective_assignee = request.assigned_to;

        for action in &transition.actions {
            match action {
                AutomationAction::SetField { name, value } => {
                    self.fields
                        .set_request_field(request.id, name, value)
                        .await
                        .map_err(|e| CoreError::AutomationFailed {
                            action: "set_field",
                            reason: e.reason,
                            retryable: e.retryable,
                        })?;
                    field_updates.push((name.clone(), value.clone()));
                }
                AutomationAction::AssignTo { target } => {
                    let to_user_id = self.resolve_assign_target(&request, target).await?;
                    let kind = if effective_assignee.is_some() {
                        AssignmentKind::Reassignment
                    } else {
                        AssignmentKind::Initial
                    };
                    let reason = match kind {
                        AssignmentKind::Reassignment => Some(format!(
                            "workflow automation: transition '{}'",
                            transition.name
                        )),
                        AssignmentKind::Initial => None,
                    };
                    assignment = Some(AssignmentChange {
                        from_user_id: effective_assignee,
                        to_user_id,
                        kind,
                        actor_id,
                        reason,
                    });
                    effective_assignee = Some(to_user_id);
                }
                AutomationAction::Notify { template } => {
                    notifications.push(template.clone());
                }
                AutomationAction::CreateTask { spec } => {
                    let task_id = self
                        .tasks
                        .create_task(request.id, spec)
                        .await
                        .map_err(|e| CoreError::AutomationFailed {
                            action: "create_task",
                            reason: e.reason,
                            retryable: e.retryable,
                        })?;
                    created_tasks.push(task_id);
                }
            }
        }

        let to_step = graph
            .step(transition.to_step_id)
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "workflow {} is missing step {}",
                    graph.id(),
                    transition.to_step_id
                ))
            })?
            .clone();
        let status = status_for_step(&to_step);

        let outcome = self
            .store
            .commit_transition(TransitionCommit {
                request_id,
                expected_step_id: transition.from_step_id,
                to_step_id: to_step.id,
                status,
                actor_id,
                note: note.clone(),
                field_updates,
                assignment,
            })
            .await?;

        tracing::info!(
            request_id,
            transition_id,
            from_step = %current_step.name,
            to_step = %to_step.name,
            status = %outcome.request.status,
            actor_id,
            "Transition executed"
        );

        self.bus.publish(
            PlatformEvent::new(EVENT_REQUEST_TRANSITIONED)
                .with_entity("request", request_id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "transition_id": transition.id,
                    "transition": transition.name,
                    "from_step_id": transition.from_step_id,
                    "to_step_id": to_step.id,
                    "status": outcome.request.status,
                    "note": note,
                    "task_ids": created_tasks,
                })),
        );
        if let Some(entry) = &outcome.assignment_entry {
            let event_type = match entry.kind {
                AssignmentKind::Initial => EVENT_REQUEST_ASSIGNED,
                AssignmentKind::Reassignment => EVENT_REQUEST_REASSIGNED,
            };
            self.bus.publish(
                PlatformEvent::new(event_type)
                    .with_entity("request", request_id)
                    .with_actor(actor_id)
                    .with_payload(serde_json::json!({
                        "from_user_id": entry.from_user_id,
                        "to_user_id": entry.to_user_id,
                        "via": "automation",
                    })),
            );
        }
        self.publish_notifications(&outcome.request, &to_step, actor_id, &notifications);

        let legal_transitions = self
            .allowed_transitions(&graph, outcome.request.current_step_id, actor_id)
            .await?;

        Ok(TransitionOutcome {
            request: outcome.request,
            step: to_step,
            step_entry: outcome.step_entry,
            assignment_entry: outcome.assignment_entry,
            legal_transitions,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn current_step<'g>(
        &self,
        graph: &'g WorkflowGraph,
        request: &ServiceRequest,
    ) -> Result<&'g Step, CoreError> {
        graph.step(request.current_step_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "request {} sits at step {} which is not in workflow {}",
                request.id,
                request.current_step_id,
                graph.id()
            ))
        })
    }

    async fn actor_allowed(
        &self,
        actor_id: DbId,
        transition: &Transition,
    ) -> Result<bool, CoreError> {
        let Some(allowed) = &transition.allowed_roles else {
            return Ok(true);
        };
        for role in allowed {
            if self.roles.actor_has_role(actor_id, role).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn allowed_transitions(
        &self,
        graph: &WorkflowGraph,
        step_id: DbId,
        actor_id: DbId,
    ) -> Result<Vec<Transition>, CoreError> {
        let mut allowed = Vec::new();
        for transition in graph.transitions_from(step_id) {
            if self.actor_allowed(actor_id, transition).await? {
                allowed.push(transition.clone());
            }
        }
        Ok(allowed)
    }

    async fn resolve_assign_target(
        &self,
        request: &ServiceRequest,
        target: &AssignTarget,
    ) -> Result<DbId, CoreError> {
        match target {
            AssignTarget::Accountant { id } => {
                let accountant = self.store.find_accountant(*id).await?.ok_or_else(|| {
                    CoreError::AutomationFailed {
                        action: "assign_to",
                        reason: format!("accountant {id} does not exist"),
                        retryable: false,
                    }
                })?;
                if !accountant.is_active {
                    return Err(CoreError::AutomationFailed {
                        action: "assign_to",
                        reason: format!("accountant {id} is inactive"),
                        retryable: false,
                    });
                }
                Ok(accountant.id)
            }
            AssignTarget::Role { name } => self
                .roles
                .resolve_role_assignee(request.firm_id, name)
                .await?
                .ok_or_else(|| CoreError::AutomationFailed {
                    action: "assign_to",
                    reason: format!("no active accountant holds role '{name}'"),
                    retryable: false,
                }),
        }
    }

    /// Notifications are dispatch-after-commit and fire-and-forget: the
    /// router consumes them on its own task, and delivery outcome never
    /// affects the committed transition.
    fn publish_notifications(
        &self,
        request: &ServiceRequest,
        step: &Step,
        actor_id: DbId,
        templates: &[String],
    ) {
        for template in templates {
            let Some(recipient) = request.assigned_to else {
                tracing::warn!(
                    request_id = request.id,
                    template = %template,
                    "Notify automation fired on an unassigned request; skipping"
                );
                continue;
            };
            self.bus.publish(
                PlatformEvent::new(EVENT_NOTIFICATION_REQUESTED)
                    .with_entity("request", request.id)
                    .with_actor(actor_id)
                    .with_payload(serde_json::json!({
                        "accountant_id": recipient,
                        "template": template,
                        "context": {
                            "request_id": request.id,
                            "title": request.title,
                            "status": request.status,
                            "step": step.name,
                        },
                    })),
            );
        }
    }
}
