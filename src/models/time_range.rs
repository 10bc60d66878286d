//! # TimeRange
//!
//! Immutable half-open time interval `[start, end)` used everywhere a booking
//! window or external busy period is compared for overlap.
//!
//! ## Overlap Semantics
//!
//! Two ranges overlap iff `a.start < b.end && b.start < a.end`. Because the
//! interval is half-open, a booking ending at `T` and another starting at `T`
//! share no instant and do not conflict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BookingError, Result};

/// Half-open interval `[start, end)` over UTC instants.
///
/// Invariant: `start < end`, enforced at construction. Zero-length and
/// inverted windows are rejected with a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Construct a range, validating `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(BookingError::Validation(format!(
                "time range start must precede end (start: {start}, end: {end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap test. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `instant` falls inside the range (start inclusive, end exclusive).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Widen the range by `padding` on both sides.
    ///
    /// Used by the availability checker's coarse pre-filter so bookings near
    /// the window edges are still loaded for the exact overlap pass.
    pub fn padded(&self, padding: Duration) -> TimeRange {
        TimeRange {
            start: self.start - padding,
            end: self.end + padding,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}
