//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! broadcast channel and appends every received [`PlatformEvent`] to the
//! `events` log through the [`EventStore`] port. It runs as a long-lived
//! background task and shuts down when the bus sender is dropped.

use std::sync::Arc;

use praxis_core::store::EventStore;
use tokio::sync::broadcast;

use crate::bus::PlatformEvent;

/// Background service that persists platform events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop.
    ///
    /// Subscribes to the event bus via the provided `receiver` and persists
    /// every event it receives. The loop exits when the channel is closed
    /// (i.e. the [`EventBus`](crate::bus::EventBus) is dropped).
    pub async fn run(store: Arc<dyn EventStore>, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let event_type = event.event_type.clone();
                    if let Err(e) = store.append_event(event.into_record()).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event_type,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }
}
