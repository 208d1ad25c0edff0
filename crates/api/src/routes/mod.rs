pub mod health;
pub mod notification;
pub mod request;
pub mod workflow;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workflows                                 list, create
/// /workflows/{id}                            full graph (workflow, steps, transitions)
/// /workflows/{id}/steps                      add step
/// /workflows/{id}/transitions                add transition
/// /workflows/{id}/validation                 structural validation report
/// /workflows/{id}/activate                   activate (POST)
/// /workflows/{id}/default                    make firm default (POST)
///
/// /requests                                  list, raise
/// /requests/{id}                             detail with legal transitions
/// /requests/{id}/transitions                 legal transitions for the actor
/// /requests/{id}/transitions/{transition_id} execute (POST)
/// /requests/{id}/history                     merged step + assignment ledger
/// /requests/{id}/assignment                  assign (POST), reassign (PUT)
///
/// /notifications                             list (?unread_only)
/// /notifications/{id}/read                   mark read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Workflow definition authoring and lifecycle.
        .nest("/workflows", workflow::router())
        // Service requests: raising, transitions, assignment, history.
        .nest("/requests", request::router())
        // In-app notifications for the acting accountant.
        .nest("/notifications", notification::router())
}
