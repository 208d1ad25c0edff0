//! Repository for the `transitions` table. Append-only, like steps.

use sqlx::PgPool;

use praxis_core::store::NewTransition;
use praxis_core::types::DbId;

use crate::models::workflow::TransitionRow;

/// Column list for transitions queries.
pub(crate) const COLUMNS: &str =
    "id, workflow_id, from_step_id, to_step_id, name, allowed_roles, actions";

pub struct TransitionRepo;

impl TransitionRepo {
    /// Append a transition to a workflow, returning the created row. The
    /// caller is responsible for checking that both endpoints belong to
    /// the workflow.
    pub async fn insert(
        pool: &PgPool,
        workflow_id: DbId,
        input: &NewTransition,
    ) -> Result<TransitionRow, sqlx::Error> {
        let allowed_roles = input
            .allowed_roles
            .as_ref()
            .map(|roles| serde_json::json!(roles));
        let query = format!(
            "INSERT INTO transitions
                (workflow_id, from_step_id, to_step_id, name, allowed_roles, actions)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransitionRow>(&query)
            .bind(workflow_id)
            .bind(input.from_step_id)
            .bind(input.to_step_id)
            .bind(&input.name)
            .bind(allowed_roles)
            .bind(serde_json::json!(input.actions))
            .fetch_one(pool)
            .await
    }

    /// All transitions of a workflow ordered by id.
    pub async fn list_for_workflow(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<Vec<TransitionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transitions WHERE workflow_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, TransitionRow>(&query)
            .bind(workflow_id)
            .fetch_all(pool)
            .await
    }
}
