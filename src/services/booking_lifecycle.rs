//! # Booking Lifecycle Service
//!
//! The single writer of booking state. Every operation runs check-then-write
//! inside one transaction; creation additionally takes a per-space advisory
//! lock so concurrent create attempts for overlapping windows on the same
//! space serialize, with the table's exclusion constraint as defense in
//! depth. Across different spaces operations proceed fully in parallel.
//!
//! Errors propagate to callers as typed [`BookingError`] values so the
//! calling layer can render a precise message: a lost race reports the
//! specific conflicting window, a bad transition names the offending edge.

use chrono::Utc;
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityChecker;
use crate::config::PolicyConfig;
use crate::constants::events;
use crate::error::{BookingError, Result};
use crate::events::EventPublisher;
use crate::models::{Booking, NewBooking, TimeRange};
use crate::state_machine::{Actor, BookingEvent, BookingState, BookingStateMachine};
use crate::validation::validate_booking_window;

use super::authorization::Authorizer;

/// Request payload for creating a booking.
#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub space_id: Uuid,
    pub requester_user_id: Uuid,
    pub start_at: chrono::DateTime<Utc>,
    pub end_at: chrono::DateTime<Utc>,
}

/// Orchestrates booking creation and state transitions.
#[derive(Clone)]
pub struct BookingLifecycleService {
    pool: PgPool,
    policy: PolicyConfig,
    availability: AvailabilityChecker,
    authorizer: Arc<dyn Authorizer>,
    publisher: EventPublisher,
}

impl BookingLifecycleService {
    pub fn new(
        pool: PgPool,
        policy: PolicyConfig,
        authorizer: Arc<dyn Authorizer>,
        publisher: EventPublisher,
    ) -> Self {
        let availability = AvailabilityChecker::new(pool.clone(), policy.clone());
        Self {
            pool,
            policy,
            availability,
            authorizer,
            publisher,
        }
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    /// Create a booking. A requester who holds an owner/staff role on the
    /// space books directly into `Confirmed` (walk-ins, phone bookings);
    /// everyone else starts `Pending`.
    ///
    /// The availability check runs again on the inserting transaction's
    /// connection, under a per-space advisory lock, so the soft pre-check
    /// result cannot go stale between check and insert.
    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        let now = Utc::now();
        let range =
            validate_booking_window(request.start_at, request.end_at, now, &self.policy)?;

        let direct_confirm = self
            .authorizer
            .is_owner_or_staff(request.requester_user_id, request.space_id)
            .await?;
        let status = if direct_confirm {
            BookingState::Confirmed
        } else {
            BookingState::Pending
        };

        let mut tx = self.pool.begin().await?;
        acquire_space_lock(&mut tx, request.space_id).await?;

        if let Some(blocking) = self
            .availability
            .find_overlapping_on(&mut tx, request.space_id, &range, None)
            .await?
        {
            return Err(conflict_with(&blocking));
        }

        let new_booking = NewBooking {
            space_id: request.space_id,
            requester_user_id: request.requester_user_id,
            start_at: range.start(),
            end_at: range.end(),
            status,
        };
        let booking = match Booking::create(&mut tx, &new_booking).await {
            Ok(booking) => booking,
            Err(err) => {
                drop(tx);
                return Err(self.remap_exclusion_violation(err, &request, &range).await);
            }
        };
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            booking_code = %booking.booking_code,
            space_id = %booking.space_id,
            status = %booking.status,
            window = %range,
            "Booking created"
        );
        self.publisher.publish_booking(events::BOOKING_CREATED, &booking);
        Ok(booking)
    }

    /// Owner/staff accepts a pending request.
    pub async fn confirm_booking(&self, booking_id: Uuid, acting_user: Uuid) -> Result<Booking> {
        self.transition(booking_id, BookingEvent::Confirm, Some(acting_user))
            .await
    }

    /// Owner/staff declines a pending request.
    pub async fn reject_booking(&self, booking_id: Uuid, acting_user: Uuid) -> Result<Booking> {
        self.transition(booking_id, BookingEvent::Reject, Some(acting_user))
            .await
    }

    /// Requester or owner withdraws a pending/confirmed booking.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        acting_user: Uuid,
        reason: Option<String>,
    ) -> Result<Booking> {
        self.transition(booking_id, BookingEvent::Cancel(reason), Some(acting_user))
            .await
    }

    /// Staff checks the guest in, within the configured tolerance of start.
    pub async fn check_in(&self, booking_id: Uuid, acting_user: Uuid) -> Result<Booking> {
        self.transition(booking_id, BookingEvent::CheckIn, Some(acting_user))
            .await
    }

    /// Staff checks the guest out.
    pub async fn check_out(&self, booking_id: Uuid, acting_user: Uuid) -> Result<Booking> {
        self.transition(booking_id, BookingEvent::CheckOut, Some(acting_user))
            .await
    }

    /// Flag a missed confirmed booking. `acting_user: None` is the system
    /// sweep.
    pub async fn mark_no_show(
        &self,
        booking_id: Uuid,
        acting_user: Option<Uuid>,
    ) -> Result<Booking> {
        self.transition(booking_id, BookingEvent::MarkNoShow, acting_user)
            .await
    }

    /// Soft availability query for UI display.
    pub async fn is_space_available(
        &self,
        space_id: Uuid,
        start_at: chrono::DateTime<Utc>,
        end_at: chrono::DateTime<Utc>,
    ) -> Result<bool> {
        let range = TimeRange::new(start_at, end_at)?;
        self.availability.is_available(space_id, &range, None).await
    }

    /// System sweep: mark every confirmed, never-checked-in booking past its
    /// end (plus grace) as a no-show. One booking's failure does not stop
    /// the sweep.
    pub async fn mark_overdue_no_shows(&self) -> Result<Vec<Booking>> {
        let now = Utc::now();
        let overdue =
            Booking::confirmed_overdue(&self.pool, now, self.policy.no_show_grace()).await?;

        let mut marked = Vec::with_capacity(overdue.len());
        for booking in overdue {
            match self.mark_no_show(booking.id, None).await {
                Ok(updated) => marked.push(updated),
                Err(err) => warn!(
                    booking_id = %booking.id,
                    error = %err,
                    "No-show sweep skipped booking"
                ),
            }
        }
        Ok(marked)
    }

    /// Shared transition path: lock the row, resolve the actor, plan via the
    /// state machine, persist, publish.
    async fn transition(
        &self,
        booking_id: Uuid,
        event: BookingEvent,
        acting_user: Option<Uuid>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let booking = Booking::find_by_id_for_update(&mut tx, booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;

        let actor = self.resolve_actor(&booking, acting_user).await?;
        let now = Utc::now();
        let plan = BookingStateMachine::plan_transition(&booking, &event, actor, now, &self.policy)?;

        let updated = Booking::apply_transition(
            &mut tx,
            booking.id,
            plan.to,
            plan.check_in_at,
            plan.check_out_at,
            plan.cancellation_reason.as_deref(),
        )
        .await?;
        tx.commit().await?;

        info!(
            booking_id = %updated.id,
            booking_code = %updated.booking_code,
            space_id = %updated.space_id,
            event = event.event_type(),
            from = %plan.from,
            to = %plan.to,
            "Booking transitioned"
        );
        self.publisher
            .publish_booking(lifecycle_event_name(&event), &updated);
        Ok(updated)
    }

    /// Map a concrete user to the role under which they act on this booking.
    /// Owner/staff standing takes precedence so an owner cancelling their own
    /// request still passes the broader gate.
    async fn resolve_actor(&self, booking: &Booking, acting_user: Option<Uuid>) -> Result<Actor> {
        let Some(user_id) = acting_user else {
            return Ok(Actor::System);
        };
        if self
            .authorizer
            .is_owner_or_staff(user_id, booking.space_id)
            .await?
        {
            return Ok(Actor::OwnerOrStaff);
        }
        if user_id == booking.requester_user_id {
            return Ok(Actor::Requester);
        }
        Err(BookingError::Authorization(format!(
            "user {user_id} has no standing on booking {}",
            booking.booking_code
        )))
    }

    /// The exclusion constraint firing means another writer slipped a
    /// conflicting booking in; report it as a conflict with the blocking
    /// window looked up fresh.
    async fn remap_exclusion_violation(
        &self,
        err: BookingError,
        request: &CreateBookingRequest,
        range: &TimeRange,
    ) -> BookingError {
        if !is_exclusion_violation(&err) {
            return err;
        }
        match self
            .availability
            .find_overlapping(request.space_id, range, None)
            .await
        {
            Ok(Some(blocking)) => conflict_with(&blocking),
            _ => err,
        }
    }
}

/// Serialize same-space writers for the duration of the transaction.
async fn acquire_space_lock(conn: &mut PgConnection, space_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(space_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

fn conflict_with(blocking: &Booking) -> BookingError {
    BookingError::Conflict {
        booking_id: blocking.id,
        start_at: blocking.start_at,
        end_at: blocking.end_at,
    }
}

fn is_exclusion_violation(err: &BookingError) -> bool {
    match err {
        BookingError::Database(sqlx::Error::Database(db_err)) => {
            db_err.constraint() == Some("bookings_no_active_overlap")
        }
        _ => false,
    }
}

fn lifecycle_event_name(event: &BookingEvent) -> &'static str {
    match event {
        BookingEvent::Confirm => events::BOOKING_CONFIRMED,
        BookingEvent::Reject => events::BOOKING_REJECTED,
        BookingEvent::Cancel(_) => events::BOOKING_CANCELLED,
        BookingEvent::CheckIn => events::BOOKING_CHECKED_IN,
        BookingEvent::CheckOut => events::BOOKING_CHECKED_OUT,
        BookingEvent::MarkNoShow => events::BOOKING_NO_SHOW,
    }
}
