//! Repository for `accountants` and `accountant_roles`, backing the
//! identity and role lookups the engine's collaborator port needs.

use sqlx::PgPool;

use praxis_core::types::DbId;

use crate::models::staff::AccountantRow;

/// Column list for accountants queries.
pub(crate) const COLUMNS: &str = "id, firm_id, display_name, email, is_active, created_at";

pub struct AccountantRepo;

impl AccountantRepo {
    /// Find an accountant by their primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<AccountantRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accountants WHERE id = $1");
        sqlx::query_as::<_, AccountantRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Whether the accountant holds the given role.
    pub async fn has_role(pool: &PgPool, id: DbId, role: &str) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM accountant_roles
                 WHERE accountant_id = $1 AND role = $2
             )",
        )
        .bind(id)
        .bind(role)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// The lowest-id active accountant in the firm holding the role.
    /// Deterministic so repeated automations land on the same person.
    pub async fn find_role_holder(
        pool: &PgPool,
        firm_id: DbId,
        role: &str,
    ) -> Result<Option<AccountantRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM accountants a
             WHERE a.firm_id = $1
               AND a.is_active
               AND EXISTS (
                   SELECT 1 FROM accountant_roles r
                   WHERE r.accountant_id = a.id AND r.role = $2
               )
             ORDER BY a.id
             LIMIT 1"
        );
        sqlx::query_as::<_, AccountantRow>(&query)
            .bind(firm_id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }
}
