//! Workflow authoring: drafts, appends, and the activation gate.
//!
//! The authoring surface is append-only. Steps and transitions can be
//! added but never edited or removed, which keeps published graphs (and
//! the ledger entries pointing into them) valid forever. Drafts may be
//! structurally broken while under construction; `activate` is the gate
//! that refuses to publish a graph with validation findings.

use std::sync::Arc;

use praxis_core::error::CoreError;
use praxis_core::graph::{Step, StepKind, Transition, Workflow, WorkflowGraph};
use praxis_core::store::{NewStep, NewTransition, NewWorkflow, WorkflowStore};
use praxis_core::types::DbId;
use praxis_core::validate::{validate_graph, ValidationReport};
use praxis_events::bus::EVENT_WORKFLOW_ACTIVATED;
use praxis_events::{EventBus, PlatformEvent};

use crate::cache::WorkflowCache;

pub struct WorkflowAuthoring {
    store: Arc<dyn WorkflowStore>,
    graphs: Arc<WorkflowCache>,
    bus: Arc<EventBus>,
}

impl WorkflowAuthoring {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        graphs: Arc<WorkflowCache>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self { store, graphs, bus }
    }

    pub async fn create_workflow(&self, new: NewWorkflow) -> Result<Workflow, CoreError> {
        if new.name.trim().is_empty() {
            return Err(CoreError::Validation("workflow name is required".into()));
        }
        if new.service_type.trim().is_empty() {
            return Err(CoreError::Validation("service type is required".into()));
        }
        let workflow = self.store.create_workflow(new).await?;
        tracing::info!(
            workflow_id = workflow.id,
            firm_id = workflow.firm_id,
            name = %workflow.name,
            "Workflow draft created"
        );
        Ok(workflow)
    }

    pub async fn find_workflow(&self, id: DbId) -> Result<Workflow, CoreError> {
        self.store
            .find_workflow(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id,
            })
    }

    pub async fn list_workflows(&self, firm_id: DbId) -> Result<Vec<Workflow>, CoreError> {
        self.store.list_workflows(firm_id).await
    }

    /// Full graph for the detail surface, read through the shared cache.
    pub async fn graph(&self, id: DbId) -> Result<Arc<WorkflowGraph>, CoreError> {
        if let Some(graph) = self.graphs.get(id) {
            return Ok(graph);
        }
        let graph = self
            .store
            .load_graph(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id,
            })?;
        Ok(self.graphs.insert(graph))
    }

    /// Append a step. A START step cannot be appended to an active
    /// workflow: activation already guaranteed exactly one.
    pub async fn add_step(&self, workflow_id: DbId, new: NewStep) -> Result<Step, CoreError> {
        if new.name.trim().is_empty() {
            return Err(CoreError::Validation("step name is required".into()));
        }
        let workflow = self.find_workflow(workflow_id).await?;
        if new.kind == StepKind::Start && workflow.is_active {
            return Err(CoreError::Validation(format!(
                "workflow {workflow_id} is active and already has a start step"
            )));
        }
        let step = self.store.add_step(workflow_id, new).await?;
        self.graphs.invalidate(workflow_id);
        Ok(step)
    }

    /// Append a transition. END steps are final, so an edge out of one is
    /// rejected outright rather than left for the validation report.
    pub async fn add_transition(
        &self,
        workflow_id: DbId,
        new: NewTransition,
    ) -> Result<Transition, CoreError> {
        if new.name.trim().is_empty() {
            return Err(CoreError::Validation("transition name is required".into()));
        }
        if new
            .allowed_roles
            .as_ref()
            .is_some_and(|roles| roles.is_empty())
        {
            return Err(CoreError::Validation(
                "allowed_roles must name at least one role; omit it to allow any".into(),
            ));
        }
        let graph = self
            .store
            .load_graph(workflow_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            })?;
        let from = graph.step(new.from_step_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "step {} does not belong to workflow {workflow_id}",
                new.from_step_id
            ))
        })?;
        if graph.step(new.to_step_id).is_none() {
            return Err(CoreError::Validation(format!(
                "step {} does not belong to workflow {workflow_id}",
                new.to_step_id
            )));
        }
        if from.is_terminal() {
            return Err(CoreError::Validation(format!(
                "step '{}' is an end step and cannot have outgoing transitions",
                from.name
            )));
        }
        let transition = self.store.add_transition(workflow_id, new).await?;
        self.graphs.invalidate(workflow_id);
        Ok(transition)
    }

    /// Structural findings for the current shape of the graph. Empty for
    /// a publishable workflow.
    pub async fn validation_report(&self, workflow_id: DbId) -> Result<ValidationReport, CoreError> {
        let graph = self
            .store
            .load_graph(workflow_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "workflow",
                id: workflow_id,
            })?;
        Ok(validate_graph(&graph))
    }

    /// Publish the workflow. The graph is validated against the store's
    /// current shape; any finding blocks activation.
    pub async fn activate(&self, workflow_id: DbId, actor_id: DbId) -> Result<Workflow, CoreError> {
        let report = self.validation_report(workflow_id).await?;
        if !report.is_valid() {
            return Err(CoreError::Validation(format!(
                "workflow {workflow_id} failed validation: {}",
                report.summary()
            )));
        }
        let workflow = self.store.set_workflow_active(workflow_id).await?;
        self.graphs.invalidate(workflow_id);

        tracing::info!(
            workflow_id,
            name = %workflow.name,
            service_type = %workflow.service_type,
            actor_id,
            "Workflow activated"
        );
        self.bus.publish(
            PlatformEvent::new(EVENT_WORKFLOW_ACTIVATED)
                .with_entity("workflow", workflow_id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "name": workflow.name,
                    "service_type": workflow.service_type,
                })),
        );
        Ok(workflow)
    }

    /// Make the workflow the default for its `(firm, service_type)`. The
    /// store clears the previous default in the same unit.
    pub async fn set_default(&self, workflow_id: DbId) -> Result<Workflow, CoreError> {
        let workflow = self.find_workflow(workflow_id).await?;
        if !workflow.is_active {
            return Err(CoreError::Validation(format!(
                "workflow {workflow_id} must be active before it can be the default"
            )));
        }
        let previous = self
            .store
            .find_default_workflow(workflow.firm_id, &workflow.service_type)
            .await?;
        let workflow = self.store.set_default_workflow(workflow_id).await?;
        self.graphs.invalidate(workflow_id);
        if let Some(previous) = previous {
            self.graphs.invalidate(previous.id);
        }
        tracing::info!(
            workflow_id,
            service_type = %workflow.service_type,
            "Default workflow set"
        );
        Ok(workflow)
    }
}
