//! Route definitions for the `/requests` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{assignment, request};
use crate::state::AppState;

/// Routes mounted at `/requests`.
///
/// ```text
/// POST   /                                -> raise
/// GET    /                                -> list (?firm_id=, step_id, assigned_to, status, limit, offset)
/// GET    /{id}                            -> get_by_id
/// GET    /{id}/transitions                -> list_transitions
/// POST   /{id}/transitions/{transition_id} -> execute
/// GET    /{id}/history                    -> history
/// POST   /{id}/assignment                 -> assign
/// PUT    /{id}/assignment                 -> reassign
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(request::raise).get(request::list))
        .route("/{id}", get(request::get_by_id))
        .route("/{id}/transitions", get(request::list_transitions))
        .route(
            "/{id}/transitions/{transition_id}",
            post(request::execute),
        )
        .route("/{id}/history", get(request::history))
        .route(
            "/{id}/assignment",
            post(assignment::assign).put(assignment::reassign),
        )
}
