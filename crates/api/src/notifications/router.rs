//! Event-to-notification delivery.
//!
//! The transition executor publishes a `notification.requested` event for
//! every `notify` automation it runs; this router consumes those events
//! off the bus and writes the in-app notification rows. Delivery runs on
//! its own task, after the transition has committed, so a slow or failing
//! write never surfaces to the accountant who executed the transition.

use std::sync::Arc;

use tokio::sync::broadcast;

use praxis_core::error::CoreError;
use praxis_core::notification::NewNotification;
use praxis_core::store::NotificationStore;
use praxis_events::bus::EVENT_NOTIFICATION_REQUESTED;
use praxis_events::PlatformEvent;

/// Consumes `notification.requested` events and stores notifications.
pub struct NotificationRouter {
    store: Arc<dyn NotificationStore>,
}

impl NotificationRouter {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Run the main delivery loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each event.
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](praxis_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if event.event_type != EVENT_NOTIFICATION_REQUESTED {
                        continue;
                    }
                    if let Err(e) = self.deliver(&event).await {
                        tracing::error!(
                            error = %e,
                            entity_id = ?event.entity_id,
                            "Failed to deliver notification"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Store the notification described by one `notification.requested`
    /// payload.
    ///
    /// A payload without a numeric `accountant_id` is logged and dropped;
    /// the executor only publishes well-formed payloads, so this guards
    /// against foreign publishers on the same bus.
    async fn deliver(&self, event: &PlatformEvent) -> Result<(), CoreError> {
        let Some(accountant_id) = event.payload.get("accountant_id").and_then(|v| v.as_i64())
        else {
            tracing::warn!(
                payload = %event.payload,
                "notification.requested without accountant_id, skipping"
            );
            return Ok(());
        };

        let template = event
            .payload
            .get("template")
            .and_then(|v| v.as_str())
            .unwrap_or("generic")
            .to_string();

        let body = event
            .payload
            .get("context")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let notification = self
            .store
            .insert_notification(NewNotification {
                accountant_id,
                template,
                body,
            })
            .await?;

        tracing::debug!(
            notification_id = notification.id,
            accountant_id,
            template = %notification.template,
            "Notification stored"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use praxis_engine::MemoryStore;
    use praxis_events::EventBus;

    fn notification_event(accountant_id: i64) -> PlatformEvent {
        PlatformEvent::new(EVENT_NOTIFICATION_REQUESTED)
            .with_entity("request", 7)
            .with_actor(1)
            .with_payload(serde_json::json!({
                "accountant_id": accountant_id,
                "template": "request_moved",
                "context": { "request_id": 7, "title": "BAS Q2" },
            }))
    }

    #[tokio::test]
    async fn stores_a_notification_for_the_payload_accountant() {
        let store = Arc::new(MemoryStore::new());
        let router = NotificationRouter::new(store.clone());

        router.deliver(&notification_event(42)).await.unwrap();

        let stored = store.list_notifications(42, false).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].template, "request_moved");
        assert_eq!(stored[0].body["title"], "BAS Q2");
        assert!(stored[0].read_at.is_none());
    }

    #[tokio::test]
    async fn drops_payloads_without_an_accountant_id() {
        let store = Arc::new(MemoryStore::new());
        let router = NotificationRouter::new(store.clone());

        let event = PlatformEvent::new(EVENT_NOTIFICATION_REQUESTED)
            .with_payload(serde_json::json!({ "template": "request_moved" }));
        router.deliver(&event).await.unwrap();

        assert!(store.list_notifications(1, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_loop_consumes_bus_events_and_exits_on_close() {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::default();
        let handle = tokio::spawn(NotificationRouter::new(store.clone()).run(bus.subscribe()));

        bus.publish(notification_event(9));
        // Unrelated events pass through without a write.
        bus.publish(PlatformEvent::new("request.raised").with_entity("request", 1));

        let mut delivered = Vec::new();
        for _ in 0..50 {
            delivered = store.list_notifications(9, true).await.unwrap();
            if !delivered.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(delivered.len(), 1);

        drop(bus);
        handle.await.unwrap();
    }
}
