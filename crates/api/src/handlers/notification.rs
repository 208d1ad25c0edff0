//! Handlers for the `/notifications` resource.
//!
//! Notifications are scoped to the acting accountant; there is no way to
//! read or mark another accountant's rows.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use praxis_core::error::CoreError;
use praxis_core::notification::Notification;
use praxis_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::middleware::actor::Actor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
}

/// GET /api/v1/notifications
pub async fn list(
    actor: Actor,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let unread_only = query.unread_only.unwrap_or(false);
    let notifications = state
        .store
        .list_notifications(actor.id, unread_only)
        .await?;
    Ok(Json(notifications))
}

/// POST /api/v1/notifications/{id}/read
///
/// Returns 204 No Content on success, or 404 if the notification does
/// not exist or belongs to a different accountant.
pub async fn mark_read(
    actor: Actor,
    State(state): State<AppState>,
    Path(notification_id): Path<DbId>,
) -> AppResult<StatusCode> {
    let found = state
        .store
        .mark_notification_read(notification_id, actor.id)
        .await?;

    if !found {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "notification",
            id: notification_id,
        }));
    }

    Ok(StatusCode::NO_CONTENT)
}
