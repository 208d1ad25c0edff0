//! Workflow graph model: workflows, steps, transitions, automation actions.
//!
//! A workflow is loaded once into a [`WorkflowGraph`], validated at
//! activation time, and treated as structurally trusted afterwards. The
//! graph is plain data; all mutation goes through the definition store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A firm-owned workflow definition from the `workflows` table.
///
/// At most one workflow per `(firm_id, service_type)` carries `is_default`.
/// An active workflow that is referenced by a request is append-only: steps
/// and transitions may be added but never changed or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: DbId,
    pub firm_id: DbId,
    pub name: String,
    pub service_type: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Structural kind of a step. Governs graph rules, not business logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Entry point; exactly one per workflow.
    Start,
    Normal,
    /// The client, not staff, is expected to act. Portal visibility only.
    Query,
    /// Terminal; no outgoing transitions.
    End,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Start => "start",
            StepKind::Normal => "normal",
            StepKind::Query => "query",
            StepKind::End => "end",
        }
    }

    pub fn parse(value: &str) -> Option<StepKind> {
        match value {
            "start" => Some(StepKind::Start),
            "normal" => Some(StepKind::Normal),
            "query" => Some(StepKind::Query),
            "end" => Some(StepKind::End),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in a workflow, from the `steps` table.
///
/// `ordering` is display-only (progress bar position); transition legality
/// comes exclusively from the transition edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: DbId,
    pub workflow_id: DbId,
    pub name: String,
    pub ordering: i32,
    pub kind: StepKind,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        self.kind == StepKind::End
    }
}

// ---------------------------------------------------------------------------
// Automation actions
// ---------------------------------------------------------------------------

/// Target of an `AssignTo` automation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignTarget {
    /// A specific accountant by id.
    Accountant { id: DbId },
    /// Any active accountant holding the role, resolved at execution time.
    Role { name: String },
}

/// Payload for a `CreateTask` automation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Days from execution until the task is due.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_in_days: Option<i64>,
}

/// One side effect of a transition, stored as ordered JSONB on the edge.
///
/// The enum is closed: the executor matches exhaustively, so a new action
/// kind is a compile-time change everywhere it must be handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutomationAction {
    SetField {
        name: String,
        value: serde_json::Value,
    },
    AssignTo {
        target: AssignTarget,
    },
    Notify {
        template: String,
    },
    CreateTask {
        spec: TaskSpec,
    },
}

impl AutomationAction {
    /// Stable kind tag, used in error reports and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationAction::SetField { .. } => "set_field",
            AutomationAction::AssignTo { .. } => "assign_to",
            AutomationAction::Notify { .. } => "notify",
            AutomationAction::CreateTask { .. } => "create_task",
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// A directed edge between two steps of the same workflow, from the
/// `transitions` table.
///
/// Self-loops (`from_step_id == to_step_id`) are legal and ledger-recorded.
/// `allowed_roles = None` means any actor may execute the transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: DbId,
    pub workflow_id: DbId,
    pub from_step_id: DbId,
    pub to_step_id: DbId,
    pub name: String,
    pub allowed_roles: Option<Vec<String>>,
    pub actions: Vec<AutomationAction>,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A fully loaded workflow: steps and transitions indexed for lookup.
///
/// Built once per workflow by the store, validated at activation, then
/// shared read-only. Steps are ordered by `(ordering, id)`, transitions by
/// id, so listings are deterministic.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    workflow: Workflow,
    steps: Vec<Step>,
    transitions: Vec<Transition>,
    step_ix: HashMap<DbId, usize>,
    transition_ix: HashMap<DbId, usize>,
    outgoing: HashMap<DbId, Vec<usize>>,
}

impl WorkflowGraph {
    pub fn new(workflow: Workflow, mut steps: Vec<Step>, mut transitions: Vec<Transition>) -> Self {
        steps.sort_by_key(|s| (s.ordering, s.id));
        transitions.sort_by_key(|t| t.id);

        let step_ix = steps.iter().enumerate().map(|(ix, s)| (s.id, ix)).collect();
        let transition_ix = transitions
            .iter()
            .enumerate()
            .map(|(ix, t)| (t.id, ix))
            .collect();
        let mut outgoing: HashMap<DbId, Vec<usize>> = HashMap::new();
        for (ix, t) in transitions.iter().enumerate() {
            outgoing.entry(t.from_step_id).or_default().push(ix);
        }

        Self {
            workflow,
            steps,
            transitions,
            step_ix,
            transition_ix,
            outgoing,
        }
    }

    pub fn id(&self) -> DbId {
        self.workflow.id
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn step(&self, id: DbId) -> Option<&Step> {
        self.step_ix.get(&id).map(|&ix| &self.steps[ix])
    }

    pub fn transition(&self, id: DbId) -> Option<&Transition> {
        self.transition_ix.get(&id).map(|&ix| &self.transitions[ix])
    }

    /// The unique START step. `None` only on malformed drafts; validation
    /// guarantees presence before activation.
    pub fn start_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.kind == StepKind::Start)
    }

    /// Transitions leaving `step_id`, in id order. This is the legal set a
    /// caller chooses from; the executor never picks one itself.
    pub fn transitions_from(&self, step_id: DbId) -> Vec<&Transition> {
        self.outgoing
            .get(&step_id)
            .map(|ixs| ixs.iter().map(|&ix| &self.transitions[ix]).collect())
            .unwrap_or_default()
    }
}
