//! Per-request mutual exclusion.
//!
//! Every state-changing operation on a request (`execute_transition`,
//! `assign`, `reassign`) runs under that request's lock, so racing attempts
//! serialize and the stale-step guard observes a settled value. Operations
//! on different requests share nothing and run in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use praxis_core::types::DbId;
use tokio::sync::OwnedMutexGuard;

/// Keyed async locks, one per request id.
///
/// The map only ever grows by the number of distinct requests touched by
/// this process; entries are a single `Arc` each.
#[derive(Default)]
pub struct RequestLocks {
    locks: Mutex<HashMap<DbId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `request_id`, waiting if another operation on
    /// the same request holds it.
    pub async fn acquire(&self, request_id: DbId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("request lock map poisoned");
            locks
                .entry(request_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
