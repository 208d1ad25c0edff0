//! Ledger row structs for `step_history` and `assignment_history`.

use serde::Serialize;
use sqlx::FromRow;

use praxis_core::error::CoreError;
use praxis_core::request::{AssignmentHistoryEntry, AssignmentKind, StepHistoryEntry};
use praxis_core::types::{DbId, Timestamp};

/// A row from the `step_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StepHistoryRow {
    pub id: DbId,
    pub request_id: DbId,
    pub from_step_id: Option<DbId>,
    pub to_step_id: DbId,
    pub actor_id: DbId,
    pub note: Option<String>,
    pub duration_secs: Option<i64>,
    pub created_at: Timestamp,
}

impl From<StepHistoryRow> for StepHistoryEntry {
    fn from(row: StepHistoryRow) -> Self {
        StepHistoryEntry {
            id: row.id,
            request_id: row.request_id,
            from_step_id: row.from_step_id,
            to_step_id: row.to_step_id,
            actor_id: row.actor_id,
            note: row.note,
            duration_secs: row.duration_secs,
            created_at: row.created_at,
        }
    }
}

/// A row from the `assignment_history` table. `kind` is CHECK-constrained
/// to the two assignment kinds.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignmentHistoryRow {
    pub id: DbId,
    pub request_id: DbId,
    pub from_user_id: Option<DbId>,
    pub to_user_id: DbId,
    pub kind: String,
    pub actor_id: DbId,
    pub reason: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<AssignmentHistoryRow> for AssignmentHistoryEntry {
    type Error = CoreError;

    fn try_from(row: AssignmentHistoryRow) -> Result<Self, Self::Error> {
        let kind = AssignmentKind::parse(&row.kind).ok_or_else(|| {
            CoreError::Internal(format!(
                "assignment entry {} has unknown kind '{}'",
                row.id, row.kind
            ))
        })?;
        Ok(AssignmentHistoryEntry {
            id: row.id,
            request_id: row.request_id,
            from_user_id: row.from_user_id,
            to_user_id: row.to_user_id,
            kind,
            actor_id: row.actor_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}
