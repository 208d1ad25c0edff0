//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! take `&PgPool` as the first argument and return `sqlx::Error`. The
//! multi-table transactional commits live in [`crate::store`], which
//! reuses the column lists defined here.

pub mod event_repo;
pub mod history_repo;
pub mod notification_repo;
pub mod request_repo;
pub mod staff_repo;
pub mod step_repo;
pub mod transition_repo;
pub mod workflow_repo;
