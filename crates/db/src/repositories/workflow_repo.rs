//! Repository for the `workflows` table.

use sqlx::PgPool;

use praxis_core::store::NewWorkflow;
use praxis_core::types::DbId;

use crate::models::workflow::WorkflowRow;

/// Column list for workflows queries.
pub(crate) const COLUMNS: &str =
    "id, firm_id, name, service_type, is_active, is_default, created_at, updated_at";

/// Lifecycle operations for workflow definitions.
pub struct WorkflowRepo;

impl WorkflowRepo {
    /// Insert a new draft workflow, returning the created row.
    pub async fn create(pool: &PgPool, input: &NewWorkflow) -> Result<WorkflowRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflows (firm_id, name, service_type)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(input.firm_id)
            .bind(&input.name)
            .bind(&input.service_type)
            .fetch_one(pool)
            .await
    }

    /// Find a workflow by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WorkflowRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE id = $1");
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a firm's workflows ordered by id.
    pub async fn list_for_firm(
        pool: &PgPool,
        firm_id: DbId,
    ) -> Result<Vec<WorkflowRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE firm_id = $1 ORDER BY id");
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(firm_id)
            .fetch_all(pool)
            .await
    }

    /// Mark a workflow active, returning the updated row.
    pub async fn set_active(pool: &PgPool, id: DbId) -> Result<Option<WorkflowRow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflows SET is_active = TRUE, updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The default workflow for a firm's service type, if one is set.
    pub async fn find_default(
        pool: &PgPool,
        firm_id: DbId,
        service_type: &str,
    ) -> Result<Option<WorkflowRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflows
             WHERE firm_id = $1 AND service_type = $2 AND is_default"
        );
        sqlx::query_as::<_, WorkflowRow>(&query)
            .bind(firm_id)
            .bind(service_type)
            .fetch_optional(pool)
            .await
    }
}
