//! Repository for the `steps` table. Append-only: steps are never
//! updated or deleted once created.

use sqlx::PgPool;

use praxis_core::store::NewStep;
use praxis_core::types::DbId;

use crate::models::workflow::StepRow;

/// Column list for steps queries.
pub(crate) const COLUMNS: &str = "id, workflow_id, name, ordering, kind";

pub struct StepRepo;

impl StepRepo {
    /// Append a step to a workflow, returning the created row.
    pub async fn insert(
        pool: &PgPool,
        workflow_id: DbId,
        input: &NewStep,
    ) -> Result<StepRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO steps (workflow_id, name, ordering, kind)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StepRow>(&query)
            .bind(workflow_id)
            .bind(&input.name)
            .bind(input.ordering)
            .bind(input.kind.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a step by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<StepRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM steps WHERE id = $1");
        sqlx::query_as::<_, StepRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All steps of a workflow in display order.
    pub async fn list_for_workflow(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<StepRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM steps WHERE workflow_id = $1 ORDER BY ordering, id"
        );
        sqlx::query_as::<_, StepRow>(&query)
            .bind(workflow_id)
            .fetch_all(pool)
            .await
    }
}
