//! Acting-accountant extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use praxis_core::error::CoreError;
use praxis_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// The accountant performing the request, taken from the `X-Actor-Id`
/// header. The gateway in front of this service authenticates the session
/// and stamps the header; this service only consumes it.
///
/// Use this as an extractor parameter in any handler whose operation is
/// attributed to an actor:
///
/// ```ignore
/// async fn my_handler(actor: Actor) -> AppResult<Json<()>> {
///     tracing::info!(actor_id = actor.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    /// The acting accountant's database id.
    pub id: DbId,
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-Actor-Id header".into()))
            })?;

        let id: DbId = raw.trim().parse().map_err(|_| {
            AppError::Core(CoreError::Unauthorized(
                "X-Actor-Id must be a numeric accountant id".into(),
            ))
        })?;

        Ok(Actor { id })
    }
}
