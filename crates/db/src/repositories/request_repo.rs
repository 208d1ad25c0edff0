//! Repository for the `service_requests` table. Inserts and state
//! commits are transactional and live in [`crate::store`]; this repo
//! covers the read side.

use sqlx::PgPool;

use praxis_core::store::RequestFilter;
use praxis_core::types::DbId;

use crate::models::request::ServiceRequestRow;

/// Column list for service_requests queries.
pub(crate) const COLUMNS: &str = "id, firm_id, workflow_id, client_ref, title, \
    current_step_id, status, assigned_to, fields, created_at, updated_at";

pub struct RequestRepo;

impl RequestRepo {
    /// Find a request by its primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ServiceRequestRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM service_requests WHERE id = $1");
        sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List requests, newest first. Every filter is optional; a `None`
    /// leaves that dimension unconstrained.
    pub async fn list(
        pool: &PgPool,
        filter: &RequestFilter,
    ) -> Result<Vec<ServiceRequestRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM service_requests \
             WHERE ($1::BIGINT IS NULL OR firm_id = $1) \
               AND ($2::BIGINT IS NULL OR current_step_id = $2) \
               AND ($3::BIGINT IS NULL OR assigned_to = $3) \
               AND ($4::TEXT IS NULL OR status = $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(filter.firm_id)
            .bind(filter.step_id)
            .bind(filter.assigned_to)
            .bind(filter.status.as_deref())
            .bind(filter.limit.max(0))
            .bind(filter.offset.max(0))
            .fetch_all(pool)
            .await
    }
}
