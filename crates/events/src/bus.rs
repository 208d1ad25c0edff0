//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PlatformEvent`]s. The
//! engine publishes after its commits succeed; the persistence service and
//! the notification router consume on their own tasks, so publishing never
//! blocks a request handler.

use chrono::{DateTime, Utc};
use praxis_core::store::NewEvent;
use praxis_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const EVENT_REQUEST_RAISED: &str = "request.raised";
pub const EVENT_REQUEST_TRANSITIONED: &str = "request.transitioned";
pub const EVENT_REQUEST_ASSIGNED: &str = "request.assigned";
pub const EVENT_REQUEST_REASSIGNED: &str = "request.reassigned";
pub const EVENT_WORKFLOW_ACTIVATED: &str = "workflow.activated";
/// Carries a `notify` automation to the notification router. The payload
/// holds `accountant_id`, `template`, and the rendering context.
pub const EVENT_NOTIFICATION_REQUESTED: &str = "notification.requested";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred on the platform.
///
/// Constructed via [`PlatformEvent::new`] and enriched with
/// [`with_entity`](PlatformEvent::with_entity),
/// [`with_actor`](PlatformEvent::with_actor), and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"request.transitioned"`.
    pub event_type: String,

    /// Kind of the entity the event concerns (e.g. `"request"`).
    pub entity_type: Option<String>,

    /// Database id of that entity.
    pub entity_id: Option<DbId>,

    /// Accountant who triggered the event.
    pub actor_id: Option<DbId>,

    /// Event-specific JSON payload.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub occurred_at: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create an event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            entity_type: None,
            entity_id: None,
            actor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            occurred_at: Utc::now(),
        }
    }

    /// Attach the entity the event concerns.
    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id);
        self
    }

    /// Attach the acting accountant.
    pub fn with_actor(mut self, actor_id: DbId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set the JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Convert into the durable `events` table record.
    pub fn into_record(self) -> NewEvent {
        NewEvent {
            event_type: self.event_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            actor_id: self.actor_id,
            payload: self.payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 512;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers independently
/// receive every published [`PlatformEvent`]. Shared as `Arc<EventBus>`.
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero subscribers the event is silently dropped; durable capture
    /// is the persistence subscriber's job, not the publisher's.
    pub fn publish(&self, event: PlatformEvent) {
        // SendError only means there are no receivers right now.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = PlatformEvent::new(EVENT_REQUEST_TRANSITIONED)
            .with_entity("request", 42)
            .with_actor(7)
            .with_payload(serde_json::json!({"to_step_id": 3}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "request.transitioned");
        assert_eq!(received.entity_type.as_deref(), Some("request"));
        assert_eq!(received.entity_id, Some(42));
        assert_eq!(received.actor_id, Some(7));
        assert_eq!(received.payload["to_step_id"], 3);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(EVENT_REQUEST_RAISED));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "request.raised");
        assert_eq!(e2.event_type, "request.raised");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn into_record_carries_all_envelope_fields() {
        let record = PlatformEvent::new(EVENT_REQUEST_ASSIGNED)
            .with_entity("request", 9)
            .with_actor(3)
            .with_payload(serde_json::json!({"to_user_id": 11}))
            .into_record();

        assert_eq!(record.event_type, "request.assigned");
        assert_eq!(record.entity_type.as_deref(), Some("request"));
        assert_eq!(record.entity_id, Some(9));
        assert_eq!(record.actor_id, Some(3));
        assert_eq!(record.payload["to_user_id"], 11);
    }
}
