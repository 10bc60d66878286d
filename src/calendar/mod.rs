//! Calendar adapters: import of external busy periods from iCalendar feeds
//! and export of a space's bookings as an iCalendar document.

pub mod export;
pub mod import;

use serde::{Deserialize, Serialize};

use crate::models::TimeRange;

/// One busy window derived from an external feed during a sync cycle.
///
/// Ephemeral: rebuilt every cycle, diffed against internal bookings, and
/// discarded. Never persisted as a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBusyPeriod {
    /// UID of the originating VEVENT, when the feed provides one
    pub uid: Option<String>,
    /// SUMMARY of the originating VEVENT
    pub summary: Option<String>,
    pub range: TimeRange,
}

pub use export::CalendarExporter;
pub use import::{BusyPeriodFetcher, IcsFeedClient};
