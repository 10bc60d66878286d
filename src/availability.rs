//! # Availability Checker
//!
//! Decides whether a candidate window is free for a space by loading active
//! bookings through a coarse date-window pre-filter and applying the exact
//! half-open overlap predicate in memory.
//!
//! Side-effect free. A soft pre-check may run on the shared pool, but every
//! write path re-runs the check on its own transaction connection so the
//! check-then-insert pair is atomic (see `services::booking_lifecycle`).

use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::models::{Booking, TimeRange};

/// Read-side overlap queries over the bookings table.
#[derive(Debug, Clone)]
pub struct AvailabilityChecker {
    pool: PgPool,
    policy: PolicyConfig,
}

impl AvailabilityChecker {
    pub fn new(pool: PgPool, policy: PolicyConfig) -> Self {
        Self { pool, policy }
    }

    /// Soft pre-check outside any transaction. Suitable for UI availability
    /// displays; never sufficient on its own to authorize a write.
    pub async fn is_available(
        &self,
        space_id: Uuid,
        candidate: &TimeRange,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.is_available_on(&mut conn, space_id, candidate, exclude_booking_id)
            .await
    }

    /// First active booking overlapping the candidate window, for
    /// diagnostic/UI use.
    pub async fn find_overlapping(
        &self,
        space_id: Uuid,
        candidate: &TimeRange,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        self.find_overlapping_on(&mut conn, space_id, candidate, exclude_booking_id)
            .await
    }

    /// Transaction-scoped variant: runs on the caller's connection so the
    /// result holds under the transaction's isolation and locks.
    pub async fn is_available_on(
        &self,
        conn: &mut PgConnection,
        space_id: Uuid,
        candidate: &TimeRange,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<bool> {
        let blocking = self
            .find_overlapping_on(conn, space_id, candidate, exclude_booking_id)
            .await?;
        Ok(blocking.is_none())
    }

    /// Transaction-scoped variant of [`Self::find_overlapping`]. Returns as
    /// soon as one overlapping active booking is found.
    pub async fn find_overlapping_on(
        &self,
        conn: &mut PgConnection,
        space_id: Uuid,
        candidate: &TimeRange,
        exclude_booking_id: Option<Uuid>,
    ) -> Result<Option<Booking>> {
        let filter = candidate.padded(self.policy.prefilter_padding());
        let candidates =
            Booking::active_in_window(conn, space_id, &filter, exclude_booking_id).await?;

        Ok(candidates
            .into_iter()
            .find(|booking| booking.time_range().overlaps(candidate)))
    }
}

/// Pure overlap scan used by both the checker and the reconciler: first
/// booking in `bookings` whose range overlaps `candidate`.
pub fn first_overlapping<'a>(
    bookings: &'a [Booking],
    candidate: &TimeRange,
) -> Option<&'a Booking> {
    bookings
        .iter()
        .find(|booking| booking.time_range().overlaps(candidate))
}
