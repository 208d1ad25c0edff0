//! Postgres persistence for the praxis workflow engine.
//!
//! Layout mirrors the rest of the backend: `models` holds `FromRow`
//! structs matching the tables, `repositories` holds zero-sized structs
//! with async methods taking `&PgPool`, and [`PgEngineStore`] assembles
//! them into the storage port the engine is wired against. Multi-table
//! commits (raise, transition, assignment, default switch) run in a
//! single transaction here.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::PgEngineStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Apply all pending migrations from the crate's `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}

/// Cheap liveness probe used by the health endpoint.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
