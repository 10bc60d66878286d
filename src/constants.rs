//! # System Constants
//!
//! Core constants and status groupings that define the operational
//! boundaries of the booking engine. Tunable values live in [`crate::config`];
//! only genuinely fixed definitions belong here.

// Re-export state types for convenience
pub use crate::models::calendar_source::SyncStatus;
pub use crate::models::sync_run::SyncRunOutcome;
pub use crate::state_machine::states::BookingState as BookingStatus;

/// Lifecycle and sync events published on the event channel.
pub mod events {
    // Booking lifecycle events
    pub const BOOKING_CREATED: &str = "booking.created";
    pub const BOOKING_CONFIRMED: &str = "booking.confirmed";
    pub const BOOKING_REJECTED: &str = "booking.rejected";
    pub const BOOKING_CANCELLED: &str = "booking.cancelled";
    pub const BOOKING_CHECKED_IN: &str = "booking.checked_in";
    pub const BOOKING_CHECKED_OUT: &str = "booking.checked_out";
    pub const BOOKING_NO_SHOW: &str = "booking.no_show";

    // Calendar reconciliation events
    pub const CALENDAR_CONFLICT_DETECTED: &str = "calendar.conflict_detected";
    pub const CALENDAR_SOURCE_DISABLED: &str = "calendar.source_disabled";
    pub const CALENDAR_SYNC_COMPLETED: &str = "calendar.sync_completed";
    pub const CALENDAR_SYNC_FAILED: &str = "calendar.sync_failed";
}

/// System-wide constants
pub mod system {
    /// Version marker stamped into exported calendar documents
    pub const DESKHIVE_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// PRODID line for exported iCalendar feeds
    pub const ICAL_PROD_ID: &str = "-//DeskHive//deskhive-core//EN";

    /// Upper bound on expanded occurrences per recurring event, so a
    /// pathological RRULE cannot flood a sync cycle
    pub const MAX_RECURRENCE_EXPANSIONS: u16 = 512;

    /// Upper bound on events accepted from one external feed per cycle
    pub const MAX_FEED_EVENTS: usize = 10_000;
}

/// Status groupings for validation and calendar logic
pub mod status_groups {
    use super::BookingStatus;

    /// Statuses that occupy the space's calendar and block overlapping
    /// requests
    pub const ACTIVE_BOOKING_STATUSES: &[BookingStatus] = &[
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::CheckedIn,
        BookingStatus::CheckedOut,
    ];

    /// Terminal, non-blocking statuses
    pub const TERMINAL_BOOKING_STATUSES: &[BookingStatus] = &[
        BookingStatus::Cancelled,
        BookingStatus::Rejected,
        BookingStatus::CheckedOut,
        BookingStatus::NoShow,
    ];

    /// Statuses a cancellation may start from
    pub const CANCELLABLE_BOOKING_STATUSES: &[BookingStatus] =
        &[BookingStatus::Pending, BookingStatus::Confirmed];
}
