//! Domain core for the praxis workflow engine.
//!
//! Everything in this crate is plain data and pure logic: the workflow graph
//! model, graph validation, request/ledger records, status derivation, the
//! error taxonomy, and the storage port the engine runs against. No I/O and
//! no database types leak in here.

pub mod error;
pub mod graph;
pub mod notification;
pub mod request;
pub mod staff;
pub mod store;
pub mod types;
pub mod validate;
