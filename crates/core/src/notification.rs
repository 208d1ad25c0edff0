//! In-app notifications produced by `notify` automations.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// A row from the `notifications` table.
///
/// `body` is the rendering context captured when the notification was
/// routed; how a template renders or is delivered is outside this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: DbId,
    pub accountant_id: DbId,
    pub template: String,
    pub body: serde_json::Value,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Input for inserting a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub accountant_id: DbId,
    pub template: String,
    pub body: serde_json::Value,
}
