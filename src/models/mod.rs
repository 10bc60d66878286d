//! Data layer for the booking core: the booking aggregate, external calendar
//! sources, sync run records, and the time range primitive they share.

pub mod booking;
pub mod calendar_source;
pub mod sync_run;
pub mod time_range;

pub use booking::{Booking, NewBooking};
pub use calendar_source::{ExternalCalendarSource, SyncStatus};
pub use sync_run::{NewSyncRun, SyncRun, SyncRunOutcome};
pub use time_range::TimeRange;
