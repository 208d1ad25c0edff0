//! Repository for the `events` table. Insert-only from the application;
//! events are read with ad-hoc tooling, not through the API.

use sqlx::PgPool;

use praxis_core::store::NewEvent;
use praxis_core::types::DbId;

pub struct EventRepo;

impl EventRepo {
    /// Insert an event, returning its id.
    pub async fn insert(pool: &PgPool, input: &NewEvent) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO events (event_type, entity_type, entity_id, actor_id, payload)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&input.event_type)
        .bind(&input.entity_type)
        .bind(input.entity_id)
        .bind(input.actor_id)
        .bind(&input.payload)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
