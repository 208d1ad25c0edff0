//! HTTP handlers, one module per resource.

pub mod assignment;
pub mod notification;
pub mod request;
pub mod workflow;
