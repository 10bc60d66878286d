//! Notification collaborator interface for reconciliation findings.
//!
//! Delivery (email, push, digest batching) is the host application's
//! concern; from the job's perspective notification is fire-and-forget and
//! can never fail a sync cycle.

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use crate::calendar::ExternalBusyPeriod;
use crate::constants::events;
use crate::events::EventPublisher;
use crate::models::{Booking, ExternalCalendarSource};

/// One detected overlap between an external busy period and an internal
/// active booking. The internal booking is authoritative; a conflict is a
/// report, never an auto-cancellation.
#[derive(Debug, Clone)]
pub struct CalendarConflict {
    pub source_id: Uuid,
    pub external: ExternalBusyPeriod,
    pub booking: Booking,
}

#[async_trait]
pub trait ConflictNotifier: Send + Sync {
    /// Report the cycle's conflicting set for one space. Called at most once
    /// per space per cycle, only when conflicts exist.
    async fn notify_booking_conflict(&self, space_id: Uuid, conflicts: &[CalendarConflict]);

    /// Report a source that was auto-disabled after repeated failures.
    async fn notify_source_disabled(&self, source: &ExternalCalendarSource);
}

/// Default notifier: bridges findings onto the event channel, where the host
/// application's delivery pipeline subscribes.
#[derive(Debug, Clone)]
pub struct EventConflictNotifier {
    publisher: EventPublisher,
}

impl EventConflictNotifier {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ConflictNotifier for EventConflictNotifier {
    async fn notify_booking_conflict(&self, space_id: Uuid, conflicts: &[CalendarConflict]) {
        let payload: Vec<_> = conflicts
            .iter()
            .map(|conflict| {
                json!({
                    "source_id": conflict.source_id,
                    "external_uid": conflict.external.uid,
                    "external_start": conflict.external.range.start(),
                    "external_end": conflict.external.range.end(),
                    "booking_id": conflict.booking.id,
                    "booking_code": conflict.booking.booking_code,
                    "booking_start": conflict.booking.start_at,
                    "booking_end": conflict.booking.end_at,
                })
            })
            .collect();

        self.publisher.publish_space(
            events::CALENDAR_CONFLICT_DETECTED,
            space_id,
            json!({ "conflicts": payload }),
        );
    }

    async fn notify_source_disabled(&self, source: &ExternalCalendarSource) {
        self.publisher.publish_space(
            events::CALENDAR_SOURCE_DISABLED,
            source.space_id,
            json!({
                "source_id": source.id,
                "feed_url": source.feed_url,
                "consecutive_failures": source.consecutive_failures,
            }),
        );
    }
}
