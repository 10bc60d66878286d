//! # Booking Model
//!
//! The booking aggregate: one reservation of a space for a half-open time
//! window, driven through its lifecycle by the state machine. All status
//! mutations flow through `services::booking_lifecycle` inside a transaction;
//! nothing else writes this table.
//!
//! ## Database Schema
//!
//! Maps to the `bookings` table:
//! - `id`: UUID primary key
//! - `space_id`, `requester_user_id`: UUID references
//! - `start_at` / `end_at`: TIMESTAMPTZ window (`start_at < end_at` checked)
//! - `status`: `booking_status` enum (seven lifecycle states)
//! - `booking_code`: human-readable unique code (e.g. `BK-7F3K2D9Q`)
//! - exclusion constraint `bookings_no_active_overlap` keeps active bookings
//!   for one space pairwise non-overlapping as defense in depth
//!
//! Bookings are never hard-deleted: terminal states keep the row so external
//! calendar exports stay referentially stable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnection;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::time_range::TimeRange;
use crate::error::Result;
use crate::state_machine::states::BookingState;

/// One reservation of a space for a half-open window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub space_id: Uuid,
    pub requester_user_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingState,
    pub booking_code: String,
    pub cancellation_reason: Option<String>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New booking for creation (without generated fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub space_id: Uuid,
    pub requester_user_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingState,
}

const SELECT_COLUMNS: &str = "id, space_id, requester_user_id, start_at, end_at, status, \
     booking_code, cancellation_reason, check_in_at, check_out_at, created_at, updated_at";

impl Booking {
    /// The booking's window as a validated range.
    ///
    /// The schema enforces `start_at < end_at`, so this cannot fail on rows
    /// read from the database.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_at, self.end_at)
            .expect("bookings table guarantees start_at < end_at")
    }

    /// Insert a new booking. Must run on the same connection (transaction)
    /// that performed the availability re-check; the exclusion constraint is
    /// the second line of defense if two writers race past it.
    pub async fn create(conn: &mut PgConnection, new_booking: &NewBooking) -> Result<Booking> {
        let sql = format!(
            "INSERT INTO bookings \
             (id, space_id, requester_user_id, start_at, end_at, status, booking_code, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) \
             RETURNING {SELECT_COLUMNS}"
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_booking.space_id)
            .bind(new_booking.requester_user_id)
            .bind(new_booking.start_at)
            .bind(new_booking.end_at)
            .bind(new_booking.status)
            .bind(generate_booking_code())
            .fetch_one(conn)
            .await?;
        Ok(booking)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Booking>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE id = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(booking)
    }

    /// Row-locked fetch for use inside a lifecycle transaction.
    pub async fn find_by_id_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Booking>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(booking)
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Booking>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM bookings WHERE booking_code = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(code)
            .fetch_optional(pool)
            .await?;
        Ok(booking)
    }

    /// Active bookings for a space whose stored window intersects the given
    /// coarse filter window. The exact half-open overlap decision is made in
    /// memory by the availability checker; this query only narrows the
    /// candidate set.
    pub async fn active_in_window(
        conn: &mut PgConnection,
        space_id: Uuid,
        filter: &TimeRange,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings \
             WHERE space_id = $1 \
               AND status = ANY($2) \
               AND start_at < $3 \
               AND end_at > $4 \
               AND ($5::uuid IS NULL OR id <> $5) \
             ORDER BY start_at"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(space_id)
            .bind(active_states())
            .bind(filter.end())
            .bind(filter.start())
            .bind(exclude_booking_id)
            .fetch_all(conn)
            .await?;
        Ok(bookings)
    }

    /// All active bookings for a space from `from` onward, for reconciliation
    /// against external busy periods.
    pub async fn active_for_space_since(
        pool: &PgPool,
        space_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings \
             WHERE space_id = $1 AND status = ANY($2) AND end_at > $3 \
             ORDER BY start_at"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(space_id)
            .bind(active_states())
            .bind(from)
            .fetch_all(pool)
            .await?;
        Ok(bookings)
    }

    /// Bookings serialized into the space's exported calendar feed: all
    /// active states, with checked-out visits kept for a trailing window.
    pub async fn exportable_for_space(
        pool: &PgPool,
        space_id: Uuid,
        now: DateTime<Utc>,
        trailing: Duration,
    ) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings \
             WHERE space_id = $1 AND status = ANY($2) AND end_at > $3 \
             ORDER BY start_at, booking_code"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(space_id)
            .bind(active_states())
            .bind(now - trailing)
            .fetch_all(pool)
            .await?;
        Ok(bookings)
    }

    /// Confirmed bookings past their end (plus grace) that were never checked
    /// in. Input to the no-show sweep.
    pub async fn confirmed_overdue(
        pool: &PgPool,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings \
             WHERE status = $1 AND end_at < $2 AND check_in_at IS NULL \
             ORDER BY end_at"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(BookingState::Confirmed)
            .bind(now - grace)
            .fetch_all(pool)
            .await?;
        Ok(bookings)
    }

    pub async fn upcoming_for_requester(
        pool: &PgPool,
        requester_user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM bookings \
             WHERE requester_user_id = $1 AND status = ANY($2) AND end_at > $3 \
             ORDER BY start_at"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(requester_user_id)
            .bind(active_states())
            .bind(now)
            .fetch_all(pool)
            .await?;
        Ok(bookings)
    }

    /// Persist a state transition with its side-effect stamps. Runs inside
    /// the lifecycle transaction that decided the transition.
    pub async fn apply_transition(
        conn: &mut PgConnection,
        id: Uuid,
        to: BookingState,
        check_in_at: Option<DateTime<Utc>>,
        check_out_at: Option<DateTime<Utc>>,
        cancellation_reason: Option<&str>,
    ) -> Result<Booking> {
        let sql = format!(
            "UPDATE bookings SET \
               status = $2, \
               check_in_at = COALESCE($3, check_in_at), \
               check_out_at = COALESCE($4, check_out_at), \
               cancellation_reason = COALESCE($5, cancellation_reason), \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SELECT_COLUMNS}"
        );
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .bind(to)
            .bind(check_in_at)
            .bind(check_out_at)
            .bind(cancellation_reason)
            .fetch_one(conn)
            .await?;
        Ok(booking)
    }
}

fn active_states() -> Vec<BookingState> {
    BookingState::ALL
        .into_iter()
        .filter(BookingState::is_active)
        .collect()
}

/// Short, human-readable, case-insensitive-unique booking code.
///
/// Derived from a fresh UUIDv4; the unique index on `booking_code` catches
/// the astronomically unlikely collision, which surfaces as a database error
/// the caller may retry.
pub fn generate_booking_code() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("BK-{}", &id[..10])
}
