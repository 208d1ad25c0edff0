//! Repository for the two append-only ledger tables. Appends happen
//! inside the commit transactions in [`crate::store`]; nothing in the
//! codebase updates or deletes a ledger row.

use sqlx::PgPool;

use praxis_core::types::DbId;

use crate::models::history::{AssignmentHistoryRow, StepHistoryRow};

/// Column list for step_history queries.
pub(crate) const STEP_COLUMNS: &str =
    "id, request_id, from_step_id, to_step_id, actor_id, note, duration_secs, created_at";

/// Column list for assignment_history queries.
pub(crate) const ASSIGNMENT_COLUMNS: &str =
    "id, request_id, from_user_id, to_user_id, kind, actor_id, reason, created_at";

pub struct HistoryRepo;

impl HistoryRepo {
    /// A request's step ledger in commit order.
    pub async fn list_steps(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Vec<StepHistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {STEP_COLUMNS} FROM step_history WHERE request_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, StepHistoryRow>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await
    }

    /// A request's assignment ledger in commit order.
    pub async fn list_assignments(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Vec<AssignmentHistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignment_history WHERE request_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, AssignmentHistoryRow>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await
    }
}
