//! Input validation for the booking core.
//!
//! Window and feed-URL validation that runs before any persistence access;
//! failures surface as `Validation` errors the calling layer can render.

use chrono::{DateTime, Utc};

use crate::config::PolicyConfig;
use crate::error::{BookingError, Result};
use crate::models::TimeRange;

/// Longest bookable window. Anything beyond this is a data-entry mistake,
/// not a reservation.
const MAX_BOOKING_DAYS: i64 = 30;

/// Validate a requested booking window: well-formed, not unreasonably long,
/// and not starting in the past beyond the configured grace period.
pub fn validate_booking_window(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &PolicyConfig,
) -> Result<TimeRange> {
    let range = TimeRange::new(start_at, end_at)?;

    if range.duration() > chrono::Duration::days(MAX_BOOKING_DAYS) {
        return Err(BookingError::Validation(format!(
            "booking window exceeds the {MAX_BOOKING_DAYS}-day maximum"
        )));
    }

    let earliest_start = now - policy.creation_grace();
    if start_at < earliest_start {
        return Err(BookingError::Validation(format!(
            "booking start {start_at} is in the past"
        )));
    }

    Ok(range)
}

/// Validate an external calendar feed URL at registration time. Only http(s)
/// schemes are fetchable by the import adapter.
pub fn validate_feed_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BookingError::Validation(
            "feed URL must not be empty".to_string(),
        ));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(BookingError::Validation(format!(
            "feed URL must be http(s): {url}"
        )));
    }
    if url.len() > 2048 {
        return Err(BookingError::Validation(
            "feed URL exceeds 2048 characters".to_string(),
        ));
    }
    Ok(())
}
