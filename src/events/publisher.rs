//! Broadcast channel for booking lifecycle and calendar sync events.
//!
//! Downstream collaborators (notification delivery, owner dashboards,
//! audit trails) subscribe; publication is fire-and-forget and never fails
//! an operation because nobody is listening.

use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Booking;

/// High-throughput event publisher for lifecycle and sync events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context. Absence of
    /// subscribers is not an error.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };
        let _ = self.sender.send(event);
    }

    /// Publish a booking lifecycle event with the standard payload shape.
    pub fn publish_booking(&self, event_name: &str, booking: &Booking) {
        self.publish(
            event_name,
            json!({
                "booking_id": booking.id,
                "booking_code": booking.booking_code,
                "space_id": booking.space_id,
                "requester_user_id": booking.requester_user_id,
                "status": booking.status,
                "start_at": booking.start_at,
                "end_at": booking.end_at,
            }),
        );
    }

    /// Publish a calendar sync event scoped to a space.
    pub fn publish_space(&self, event_name: &str, space_id: Uuid, context: Value) {
        let mut payload = context;
        if let Value::Object(map) = &mut payload {
            map.insert("space_id".to_string(), json!(space_id));
        }
        self.publish(event_name, payload);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
