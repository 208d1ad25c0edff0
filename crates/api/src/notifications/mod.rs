//! Notification delivery infrastructure.
//!
//! The [`NotificationRouter`] subscribes to the event bus and turns
//! `notification.requested` events into stored in-app notifications.

pub mod router;

pub use router::NotificationRouter;
