//! The praxis workflow engine.
//!
//! Everything that moves a service request through its firm-defined
//! workflow lives here:
//!
//! - [`WorkflowEngine`], the transition executor and assignment manager.
//! - [`WorkflowAuthoring`] for draft authoring, validation, activation,
//!   and default-workflow management.
//! - [`collab`], the collaborator traits (roles, request fields, tasks)
//!   the executor calls back into.
//! - [`MemoryStore`], a complete in-memory implementation of the storage
//!   port; the test suite runs the whole stack against it.
//!
//! The engine is storage-agnostic: it is wired against the
//! [`EngineStore`](praxis_core::store::EngineStore) port and never sees SQL.

pub mod assignment;
pub mod authoring;
pub mod cache;
pub mod collab;
pub mod executor;
pub mod locks;
pub mod memory;
#[cfg(test)]
pub(crate) mod testutil;

pub use authoring::WorkflowAuthoring;
pub use cache::WorkflowCache;
pub use executor::{RaiseRequest, RequestView, TransitionOutcome, WorkflowEngine};
pub use memory::MemoryStore;
