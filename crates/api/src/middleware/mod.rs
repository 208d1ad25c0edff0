//! Request extractors shared by the handlers.
//!
//! - [`actor::Actor`] extracts the acting accountant from the
//!   `X-Actor-Id` header.

pub mod actor;
