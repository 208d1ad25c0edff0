//! Storage port the workflow engine runs against.
//!
//! Two implementations exist: the Postgres store in `praxis-db` and an
//! in-memory store in `praxis-engine` that backs the test suite. The commit
//! operations are atomic: every write in a commit lands together or not at
//! all, and the ledger appends happen in the same unit as the cache
//! refreshes on the request row.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::graph::{AutomationAction, Step, StepKind, Transition, Workflow, WorkflowGraph};
use crate::notification::{NewNotification, Notification};
use crate::request::{AssignmentHistoryEntry, AssignmentKind, ServiceRequest, StepHistoryEntry};
use crate::staff::Accountant;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

/// Input for creating a workflow draft.
#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub firm_id: DbId,
    pub name: String,
    pub service_type: String,
}

/// Input for appending a step to a workflow.
#[derive(Debug, Clone)]
pub struct NewStep {
    pub name: String,
    pub ordering: i32,
    pub kind: StepKind,
}

/// Input for appending a transition to a workflow.
#[derive(Debug, Clone)]
pub struct NewTransition {
    pub from_step_id: DbId,
    pub to_step_id: DbId,
    pub name: String,
    pub allowed_roles: Option<Vec<String>>,
    pub actions: Vec<AutomationAction>,
}

/// Input for raising a request. The engine resolves the workflow's START
/// step and derived status before calling the store.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub firm_id: DbId,
    pub workflow_id: DbId,
    pub client_ref: String,
    pub title: String,
    pub start_step_id: DbId,
    pub status: String,
    pub actor_id: DbId,
}

/// Filter for request listings.
#[derive(Debug, Clone)]
pub struct RequestFilter {
    pub firm_id: Option<DbId>,
    pub step_id: Option<DbId>,
    pub assigned_to: Option<DbId>,
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            firm_id: None,
            step_id: None,
            assigned_to: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// An assignment change to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct AssignmentChange {
    pub from_user_id: Option<DbId>,
    pub to_user_id: DbId,
    pub kind: AssignmentKind,
    pub actor_id: DbId,
    pub reason: Option<String>,
}

/// Everything a successful transition writes, committed as one unit.
///
/// The store must reject the commit with [`CoreError::StaleTransition`] when
/// the request's `current_step_id` no longer equals `expected_step_id`. That
/// guard makes the executor's stale check race-free across processes.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub request_id: DbId,
    pub expected_step_id: DbId,
    pub to_step_id: DbId,
    pub status: String,
    pub actor_id: DbId,
    pub note: Option<String>,
    /// Buffered `set_field` effects, applied to `fields` in key order given.
    pub field_updates: Vec<(String, serde_json::Value)>,
    /// Present when an `assign_to` automation fired on this transition.
    pub assignment: Option<AssignmentChange>,
}

/// What a committed transition produced.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub request: ServiceRequest,
    pub step_entry: StepHistoryEntry,
    pub assignment_entry: Option<AssignmentHistoryEntry>,
}

/// A manual assign/reassign, committed as one unit.
///
/// The store must reject the commit with [`CoreError::Conflict`] when the
/// request's `assigned_to` no longer equals `change.from_user_id`.
#[derive(Debug, Clone)]
pub struct AssignmentCommit {
    pub request_id: DbId,
    pub change: AssignmentChange,
    /// Assignment metadata (deadline, priority) merged into `fields`.
    pub field_updates: Vec<(String, serde_json::Value)>,
}

/// A platform event to append to the durable event log.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub actor_id: Option<DbId>,
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Workflow definitions: graphs, authoring appends, lifecycle flags.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_workflow(&self, new: NewWorkflow) -> Result<Workflow, CoreError>;

    async fn find_workflow(&self, id: DbId) -> Result<Option<Workflow>, CoreError>;

    async fn list_workflows(&self, firm_id: DbId) -> Result<Vec<Workflow>, CoreError>;

    /// Load the full graph (workflow + steps + transitions).
    async fn load_graph(&self, id: DbId) -> Result<Option<WorkflowGraph>, CoreError>;

    async fn add_step(&self, workflow_id: DbId, new: NewStep) -> Result<Step, CoreError>;

    /// Append a transition. Fails with [`CoreError::Validation`] when either
    /// endpoint does not belong to `workflow_id`.
    async fn add_transition(
        &self,
        workflow_id: DbId,
        new: NewTransition,
    ) -> Result<Transition, CoreError>;

    async fn set_workflow_active(&self, id: DbId) -> Result<Workflow, CoreError>;

    /// Mark the workflow as the default for its `(firm_id, service_type)`,
    /// clearing any previous default in the same unit.
    async fn set_default_workflow(&self, id: DbId) -> Result<Workflow, CoreError>;

    async fn find_default_workflow(
        &self,
        firm_id: DbId,
        service_type: &str,
    ) -> Result<Option<Workflow>, CoreError>;
}

/// Requests and the append-only ledger.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert the request at its START step together with the creation
    /// ledger entry (`from_step_id = None`).
    async fn insert_request(
        &self,
        new: NewRequest,
    ) -> Result<(ServiceRequest, StepHistoryEntry), CoreError>;

    async fn find_request(&self, id: DbId) -> Result<Option<ServiceRequest>, CoreError>;

    async fn list_requests(&self, filter: RequestFilter) -> Result<Vec<ServiceRequest>, CoreError>;

    /// Atomically apply a transition: step + status + field updates on the
    /// request row, one step ledger entry, and the assignment change (cache
    /// + ledger entry) when present. Computes `duration_secs` from the
    /// previous ledger entry inside the same unit.
    async fn commit_transition(&self, commit: TransitionCommit)
        -> Result<CommitOutcome, CoreError>;

    /// Atomically apply a manual assign/reassign: assignee cache + field
    /// updates on the request row plus one assignment ledger entry.
    async fn commit_assignment(
        &self,
        commit: AssignmentCommit,
    ) -> Result<(ServiceRequest, AssignmentHistoryEntry), CoreError>;

    /// Step ledger for a request, ordered by creation time.
    async fn step_history(&self, request_id: DbId) -> Result<Vec<StepHistoryEntry>, CoreError>;

    /// Assignment ledger for a request, ordered by creation time.
    async fn assignment_history(
        &self,
        request_id: DbId,
    ) -> Result<Vec<AssignmentHistoryEntry>, CoreError>;
}

/// Staff lookups used for assignment validation.
#[async_trait]
pub trait StaffStore: Send + Sync {
    async fn find_accountant(&self, id: DbId) -> Result<Option<Accountant>, CoreError>;
}

/// In-app notification persistence.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, new: NewNotification) -> Result<Notification, CoreError>;

    async fn list_notifications(
        &self,
        accountant_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, CoreError>;

    /// Returns `false` when the notification does not exist or belongs to
    /// a different accountant.
    async fn mark_notification_read(
        &self,
        id: DbId,
        accountant_id: DbId,
    ) -> Result<bool, CoreError>;
}

/// Durable platform-event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_event(&self, event: NewEvent) -> Result<DbId, CoreError>;
}

/// The full storage surface the engine and API are wired against.
#[async_trait]
pub trait EngineStore:
    WorkflowStore + RequestStore + StaffStore + NotificationStore + EventStore
{
    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), CoreError>;
}
