use std::sync::Arc;

use praxis_core::store::EngineStore;
use praxis_engine::{WorkflowAuthoring, WorkflowEngine};

/// Shared application state, cloned into every handler.
///
/// Everything in here is an `Arc`, so cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Transition executor and assignment manager.
    pub engine: Arc<WorkflowEngine>,
    /// Workflow definition authoring and activation.
    pub authoring: Arc<WorkflowAuthoring>,
    /// Storage port, used directly by the read-side handlers (request
    /// listing, notifications, health probe).
    pub store: Arc<dyn EngineStore>,
}
