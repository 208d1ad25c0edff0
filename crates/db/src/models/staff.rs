//! Accountant row struct.

use serde::Serialize;
use sqlx::FromRow;

use praxis_core::staff::Accountant;
use praxis_core::types::{DbId, Timestamp};

/// A row from the `accountants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccountantRow {
    pub id: DbId,
    pub firm_id: DbId,
    pub display_name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl From<AccountantRow> for Accountant {
    fn from(row: AccountantRow) -> Self {
        Accountant {
            id: row.id,
            firm_id: row.firm_id,
            display_name: row.display_name,
            email: row.email,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}
