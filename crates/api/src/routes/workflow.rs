//! Route definitions for the `/workflows` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflow;
use crate::state::AppState;

/// Routes mounted at `/workflows`.
///
/// ```text
/// POST   /                  -> create
/// GET    /                  -> list (?firm_id=)
/// GET    /{id}              -> get_graph
/// POST   /{id}/steps        -> add_step
/// POST   /{id}/transitions  -> add_transition
/// GET    /{id}/validation   -> validation
/// POST   /{id}/activate     -> activate
/// POST   /{id}/default      -> set_default
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(workflow::create).get(workflow::list))
        .route("/{id}", get(workflow::get_graph))
        .route("/{id}/steps", post(workflow::add_step))
        .route("/{id}/transitions", post(workflow::add_transition))
        .route("/{id}/validation", get(workflow::validation))
        .route("/{id}/activate", post(workflow::activate))
        .route("/{id}/default", post(workflow::set_default))
}
