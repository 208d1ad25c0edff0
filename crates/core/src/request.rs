//! Service requests and the append-only state/assignment ledger.
//!
//! The ledger is the source of truth. A request row's `current_step_id`,
//! `status`, and `assigned_to` are caches, refreshed in the same atomic
//! commit as the ledger append they reflect.

use serde::{Deserialize, Serialize};

use crate::graph::{Step, StepKind};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Runtime state of one client service request, from `service_requests`.
///
/// `current_step_id` always names a step of `workflow_id`. Requests are
/// never deleted; they only reach a terminal step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: DbId,
    pub firm_id: DbId,
    pub workflow_id: DbId,
    /// Reference into the client/entity register (out of scope here).
    pub client_ref: String,
    pub title: String,
    pub current_step_id: DbId,
    pub status: String,
    pub assigned_to: Option<DbId>,
    /// Free-form request fields mutated by `set_field` automations and
    /// assignment metadata (deadline, priority).
    pub fields: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Status derivation
// ---------------------------------------------------------------------------

pub const STATUS_OPEN: &str = "open";
pub const STATUS_AWAITING_CLIENT: &str = "awaiting_client";
pub const STATUS_COMPLETED: &str = "completed";

/// Derive the denormalized `status` string for a request sitting at `step`.
///
/// START maps to `open`, QUERY to `awaiting_client`, END to `completed`,
/// and NORMAL steps to a slug of their display name. Every write that moves
/// `current_step_id` recomputes this in the same commit; nothing else may
/// write `status`.
pub fn status_for_step(step: &Step) -> String {
    match step.kind {
        StepKind::Start => STATUS_OPEN.to_string(),
        StepKind::Query => STATUS_AWAITING_CLIENT.to_string(),
        StepKind::End => STATUS_COMPLETED.to_string(),
        StepKind::Normal => slug(&step.name),
    }
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Initial,
    Reassignment,
}

impl AssignmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentKind::Initial => "initial",
            AssignmentKind::Reassignment => "reassignment",
        }
    }

    pub fn parse(value: &str) -> Option<AssignmentKind> {
        match value {
            "initial" => Some(AssignmentKind::Initial),
            "reassignment" => Some(AssignmentKind::Reassignment),
            _ => None,
        }
    }
}

/// One step change in a request's life, from `step_history`. Append-only.
///
/// The creation record has `from_step_id = None` and no duration. For every
/// later entry `from_step_id` equals the previous entry's `to_step_id` and
/// `duration_secs` is the whole seconds spent in that previous step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepHistoryEntry {
    pub id: DbId,
    pub request_id: DbId,
    pub from_step_id: Option<DbId>,
    pub to_step_id: DbId,
    pub actor_id: DbId,
    pub note: Option<String>,
    pub duration_secs: Option<i64>,
    pub created_at: Timestamp,
}

/// One assignment change, from `assignment_history`. Append-only.
///
/// `reason` is mandatory for reassignments. `from_user_id` of a
/// reassignment equals the previous entry's `to_user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentHistoryEntry {
    pub id: DbId,
    pub request_id: DbId,
    pub from_user_id: Option<DbId>,
    pub to_user_id: DbId,
    pub kind: AssignmentKind,
    pub actor_id: DbId,
    pub reason: Option<String>,
    pub created_at: Timestamp,
}

/// Either ledger record, as surfaced by the merged history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entry_type", rename_all = "snake_case")]
pub enum HistoryEntry {
    Step(StepHistoryEntry),
    Assignment(AssignmentHistoryEntry),
}

impl HistoryEntry {
    pub fn created_at(&self) -> Timestamp {
        match self {
            HistoryEntry::Step(e) => e.created_at,
            HistoryEntry::Assignment(e) => e.created_at,
        }
    }
}

/// Merge the two ledgers into one timeline ordered by creation time.
///
/// Both inputs must already be ordered by `created_at` (the stores return
/// them that way). A step entry and an assignment entry committed in the
/// same transaction share a timestamp; the step entry sorts first.
pub fn merge_history(
    steps: Vec<StepHistoryEntry>,
    assignments: Vec<AssignmentHistoryEntry>,
) -> Vec<HistoryEntry> {
    let mut merged = Vec::with_capacity(steps.len() + assignments.len());
    let mut steps = steps.into_iter().peekable();
    let mut assignments = assignments.into_iter().peekable();

    loop {
        match (steps.peek(), assignments.peek()) {
            (Some(s), Some(a)) => {
                if s.created_at <= a.created_at {
                    merged.push(HistoryEntry::Step(steps.next().unwrap()));
                } else {
                    merged.push(HistoryEntry::Assignment(assignments.next().unwrap()));
                }
            }
            (Some(_), None) => merged.push(HistoryEntry::Step(steps.next().unwrap())),
            (None, Some(_)) => merged.push(HistoryEntry::Assignment(assignments.next().unwrap())),
            (None, None) => break,
        }
    }
    merged
}
