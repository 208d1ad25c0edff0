//! Notification row struct.

use serde::Serialize;
use sqlx::FromRow;

use praxis_core::notification::Notification;
use praxis_core::types::{DbId, Timestamp};

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationRow {
    pub id: DbId,
    pub accountant_id: DbId,
    pub template: String,
    pub body: serde_json::Value,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            accountant_id: row.accountant_id,
            template: row.template,
            body: row.body,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}
