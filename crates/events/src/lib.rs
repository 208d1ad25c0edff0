//! Praxis event bus and durable event log infrastructure.
//!
//! Building blocks for the platform-wide event system:
//!
//! - [`EventBus`], the in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`], the canonical domain event envelope.
//! - [`EventPersistence`], the background service that durably appends
//!   every event to the `events` log.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, PlatformEvent};
pub use persistence::EventPersistence;
