//! Transition guards: policy checks applied after the transition table has
//! produced a defined edge and before anything is persisted.
//!
//! Guards here are pure over (booking, now, policy). The availability
//! re-check guarding creation is not a guard in this module: it must run on
//! the inserting transaction's connection and lives in the lifecycle service.

use chrono::{DateTime, Utc};

use crate::config::PolicyConfig;
use crate::error::{BookingError, Result};
use crate::models::Booking;

/// A policy condition a transition must satisfy.
pub trait StateGuard {
    fn check(&self, booking: &Booking, now: DateTime<Utc>, policy: &PolicyConfig) -> Result<()>;

    /// Description for logging.
    fn description(&self) -> &'static str;
}

/// Check-in is only accepted within the configured tolerance around the
/// booking's start.
pub struct CheckInWindowGuard;

impl StateGuard for CheckInWindowGuard {
    fn check(&self, booking: &Booking, now: DateTime<Utc>, policy: &PolicyConfig) -> Result<()> {
        let tolerance = policy.check_in_tolerance();
        let earliest = booking.start_at - tolerance;
        let latest = booking.start_at + tolerance;

        if now < earliest {
            return Err(BookingError::Validation(format!(
                "check-in opens at {earliest} for booking {}",
                booking.booking_code
            )));
        }
        if now > latest {
            return Err(BookingError::Validation(format!(
                "check-in window closed at {latest} for booking {}",
                booking.booking_code
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "current time must be within the check-in tolerance of booking start"
    }
}

/// A no-show may only be flagged once the booking has ended (plus grace)
/// without a check-in ever happening.
pub struct NoShowEligibleGuard;

impl StateGuard for NoShowEligibleGuard {
    fn check(&self, booking: &Booking, now: DateTime<Utc>, policy: &PolicyConfig) -> Result<()> {
        if booking.check_in_at.is_some() {
            return Err(BookingError::Validation(format!(
                "booking {} was checked in and cannot be a no-show",
                booking.booking_code
            )));
        }
        let eligible_at = booking.end_at + policy.no_show_grace();
        if now <= eligible_at {
            return Err(BookingError::Validation(format!(
                "booking {} is not no-show eligible until {eligible_at}",
                booking.booking_code
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "booking must have ended without a check-in"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeskhiveConfig;
    use crate::state_machine::states::BookingState;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn policy() -> PolicyConfig {
        DeskhiveConfig::default().policy
    }

    fn confirmed_booking() -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            space_id: Uuid::new_v4(),
            requester_user_id: Uuid::new_v4(),
            start_at: start,
            end_at: start + Duration::hours(1),
            status: BookingState::Confirmed,
            booking_code: "BK-TEST000001".to_string(),
            cancellation_reason: None,
            check_in_at: None,
            check_out_at: None,
            created_at: start - Duration::days(1),
            updated_at: start - Duration::days(1),
        }
    }

    #[test]
    fn test_check_in_window_accepts_within_tolerance() {
        let booking = confirmed_booking();
        let policy = policy();
        let guard = CheckInWindowGuard;

        assert!(guard.check(&booking, booking.start_at, &policy).is_ok());
        assert!(guard
            .check(&booking, booking.start_at - Duration::minutes(10), &policy)
            .is_ok());
        assert!(guard
            .check(&booking, booking.start_at + Duration::minutes(15), &policy)
            .is_ok());
    }

    #[test]
    fn test_check_in_window_rejects_outside_tolerance() {
        let booking = confirmed_booking();
        let policy = policy();
        let guard = CheckInWindowGuard;

        assert!(guard
            .check(&booking, booking.start_at - Duration::hours(2), &policy)
            .is_err());
        assert!(guard
            .check(&booking, booking.start_at + Duration::minutes(16), &policy)
            .is_err());
    }

    #[test]
    fn test_check_in_tolerance_is_policy_driven() {
        let booking = confirmed_booking();
        let mut policy = policy();
        policy.check_in_tolerance_minutes = 60;

        let guard = CheckInWindowGuard;
        assert!(guard
            .check(&booking, booking.start_at - Duration::minutes(45), &policy)
            .is_ok());
    }

    #[test]
    fn test_no_show_requires_booking_end() {
        let booking = confirmed_booking();
        let policy = policy();
        let guard = NoShowEligibleGuard;

        // Still in progress
        assert!(guard
            .check(&booking, booking.start_at + Duration::minutes(30), &policy)
            .is_err());
        // Past end
        assert!(guard
            .check(&booking, booking.end_at + Duration::minutes(1), &policy)
            .is_ok());
    }

    #[test]
    fn test_no_show_honours_grace_period() {
        let booking = confirmed_booking();
        let mut policy = policy();
        policy.no_show_grace_minutes = 30;

        let guard = NoShowEligibleGuard;
        assert!(guard
            .check(&booking, booking.end_at + Duration::minutes(10), &policy)
            .is_err());
        assert!(guard
            .check(&booking, booking.end_at + Duration::minutes(31), &policy)
            .is_ok());
    }

    #[test]
    fn test_checked_in_booking_never_no_show() {
        let mut booking = confirmed_booking();
        booking.check_in_at = Some(booking.start_at);
        let policy = policy();

        let guard = NoShowEligibleGuard;
        assert!(guard
            .check(&booking, booking.end_at + Duration::hours(1), &policy)
            .is_err());
    }
}
