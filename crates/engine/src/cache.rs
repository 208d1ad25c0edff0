//! Read-through cache of loaded workflow graphs.
//!
//! A workflow is validated at activation and structurally trusted from then
//! on, so the executor never re-validates per transition; it reads the
//! cached `Arc<WorkflowGraph>`. Authoring invalidates the entry whenever it
//! changes a workflow.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use praxis_core::graph::WorkflowGraph;
use praxis_core::types::DbId;

#[derive(Default)]
pub struct WorkflowCache {
    graphs: RwLock<HashMap<DbId, Arc<WorkflowGraph>>>,
}

impl WorkflowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, workflow_id: DbId) -> Option<Arc<WorkflowGraph>> {
        self.graphs
            .read()
            .expect("workflow cache poisoned")
            .get(&workflow_id)
            .cloned()
    }

    pub fn insert(&self, graph: WorkflowGraph) -> Arc<WorkflowGraph> {
        let graph = Arc::new(graph);
        self.graphs
            .write()
            .expect("workflow cache poisoned")
            .insert(graph.id(), graph.clone());
        graph
    }

    pub fn invalidate(&self, workflow_id: DbId) {
        self.graphs
            .write()
            .expect("workflow cache poisoned")
            .remove(&workflow_id);
    }
}
