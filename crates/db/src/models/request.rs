//! Service request row struct.

use serde::Serialize;
use sqlx::FromRow;

use praxis_core::request::ServiceRequest;
use praxis_core::types::{DbId, Timestamp};

/// A row from the `service_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ServiceRequestRow {
    pub id: DbId,
    pub firm_id: DbId,
    pub workflow_id: DbId,
    pub client_ref: String,
    pub title: String,
    pub current_step_id: DbId,
    pub status: String,
    pub assigned_to: Option<DbId>,
    pub fields: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ServiceRequestRow> for ServiceRequest {
    fn from(row: ServiceRequestRow) -> Self {
        ServiceRequest {
            id: row.id,
            firm_id: row.firm_id,
            workflow_id: row.workflow_id,
            client_ref: row.client_ref,
            title: row.title,
            current_step_id: row.current_step_id,
            status: row.status,
            assigned_to: row.assigned_to,
            fields: row.fields,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
