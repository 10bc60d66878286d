//! # Calendar Export Adapter
//!
//! Serializes a space's bookings into an iCalendar document, one VEVENT per
//! booking. UIDs derive from the stable booking code and DTSTAMP from the
//! booking's own `updated_at`, so exporting twice with no intervening
//! changes yields byte-identical documents that external subscribers can
//! diff.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::constants::system;
use crate::error::Result;
use crate::models::Booking;
use crate::state_machine::BookingState;

/// MIME type of the exported document.
pub const FEED_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Read-only exporter over the bookings table.
#[derive(Debug, Clone)]
pub struct CalendarExporter {
    pool: PgPool,
    policy: PolicyConfig,
}

impl CalendarExporter {
    pub fn new(pool: PgPool, policy: PolicyConfig) -> Self {
        Self { pool, policy }
    }

    /// Export the feed for one space: all active-state bookings plus
    /// checked-out visits within the configured trailing window.
    pub async fn export_feed(&self, space_id: Uuid) -> Result<String> {
        let bookings = Booking::exportable_for_space(
            &self.pool,
            space_id,
            Utc::now(),
            self.policy.export_trailing_window(),
        )
        .await?;
        Ok(render_feed(space_id, &bookings))
    }
}

/// Pure serialization of bookings into a VCALENDAR document (CRLF line
/// endings per RFC 5545).
pub fn render_feed(space_id: Uuid, bookings: &[Booking]) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{}", system::ICAL_PROD_ID));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    push_line(&mut out, "METHOD:PUBLISH");
    push_line(&mut out, &format!("X-WR-CALNAME:deskhive-space-{space_id}"));

    for booking in bookings {
        push_line(&mut out, "BEGIN:VEVENT");
        push_line(
            &mut out,
            &format!("UID:{}@deskhive", booking.booking_code),
        );
        push_line(
            &mut out,
            &format!("DTSTAMP:{}", format_utc(booking.updated_at)),
        );
        push_line(
            &mut out,
            &format!("DTSTART:{}", format_utc(booking.start_at)),
        );
        push_line(&mut out, &format!("DTEND:{}", format_utc(booking.end_at)));
        push_line(
            &mut out,
            &format!("SUMMARY:Reserved ({})", booking.booking_code),
        );
        push_line(
            &mut out,
            &format!("STATUS:{}", event_status(booking.status)),
        );
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

/// Pending requests export as TENTATIVE; every other exported state has the
/// slot committed.
fn event_status(status: BookingState) -> &'static str {
    match status {
        BookingState::Pending => "TENTATIVE",
        _ => "CONFIRMED",
    }
}

fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}
