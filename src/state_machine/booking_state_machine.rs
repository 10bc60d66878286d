//! # Booking State Machine
//!
//! The closed transition table for the seven booking states. The table is a
//! single exhaustive match: any (state, event) pair it does not name is an
//! `InvalidTransition`, never a silent no-op, and terminal states accept
//! nothing.
//!
//! The machine is pure over (booking, event, actor, now, policy) and returns
//! a [`TransitionPlan`]; persisting the plan inside a transaction is the
//! lifecycle service's job.

use chrono::{DateTime, Utc};

use super::events::{Actor, BookingEvent};
use super::guards::{CheckInWindowGuard, NoShowEligibleGuard, StateGuard};
use super::states::BookingState;
use crate::config::PolicyConfig;
use crate::error::{BookingError, Result};
use crate::models::Booking;

/// The decided outcome of a legal transition: target state plus the stamps
/// the service must persist alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from: BookingState,
    pub to: BookingState,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

pub struct BookingStateMachine;

impl BookingStateMachine {
    /// The transition table. Pure; no guards applied.
    pub fn determine_target_state(
        current: BookingState,
        event: &BookingEvent,
    ) -> Result<BookingState> {
        let target = match (current, event) {
            (BookingState::Pending, BookingEvent::Confirm) => BookingState::Confirmed,
            (BookingState::Pending, BookingEvent::Reject) => BookingState::Rejected,

            (BookingState::Pending, BookingEvent::Cancel(_)) => BookingState::Cancelled,
            (BookingState::Confirmed, BookingEvent::Cancel(_)) => BookingState::Cancelled,

            (BookingState::Confirmed, BookingEvent::CheckIn) => BookingState::CheckedIn,
            (BookingState::CheckedIn, BookingEvent::CheckOut) => BookingState::CheckedOut,
            (BookingState::Confirmed, BookingEvent::MarkNoShow) => BookingState::NoShow,

            (from, event) => {
                return Err(BookingError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };
        Ok(target)
    }

    /// Which actors may raise each event. The service resolves a concrete
    /// user to an [`Actor`] via the authorizer.
    pub fn allowed_actors(event: &BookingEvent) -> &'static [Actor] {
        match event {
            BookingEvent::Confirm | BookingEvent::Reject => &[Actor::OwnerOrStaff],
            BookingEvent::Cancel(_) => &[Actor::Requester, Actor::OwnerOrStaff],
            BookingEvent::CheckIn | BookingEvent::CheckOut => &[Actor::OwnerOrStaff],
            BookingEvent::MarkNoShow => &[Actor::OwnerOrStaff, Actor::System],
        }
    }

    /// Resolve an attempted transition into a plan: table lookup, actor
    /// gate, then guards, then stamps.
    pub fn plan_transition(
        booking: &Booking,
        event: &BookingEvent,
        actor: Actor,
        now: DateTime<Utc>,
        policy: &PolicyConfig,
    ) -> Result<TransitionPlan> {
        let from = booking.status;
        let to = Self::determine_target_state(from, event)?;

        if !Self::allowed_actors(event).contains(&actor) {
            return Err(BookingError::Authorization(format!(
                "{:?} may not {} booking {}",
                actor,
                event.event_type(),
                booking.booking_code
            )));
        }

        Self::check_guards(booking, event, now, policy)?;

        Ok(TransitionPlan {
            from,
            to,
            check_in_at: matches!(event, BookingEvent::CheckIn).then_some(now),
            check_out_at: matches!(event, BookingEvent::CheckOut).then_some(now),
            cancellation_reason: event.cancellation_reason().map(str::to_string),
        })
    }

    fn check_guards(
        booking: &Booking,
        event: &BookingEvent,
        now: DateTime<Utc>,
        policy: &PolicyConfig,
    ) -> Result<()> {
        match event {
            BookingEvent::CheckIn => CheckInWindowGuard.check(booking, now, policy),
            BookingEvent::MarkNoShow => NoShowEligibleGuard.check(booking, now, policy),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeskhiveConfig;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn booking_in(status: BookingState) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        Booking {
            id: Uuid::new_v4(),
            space_id: Uuid::new_v4(),
            requester_user_id: Uuid::new_v4(),
            start_at: start,
            end_at: start + Duration::hours(1),
            status,
            booking_code: "BK-TEST000001".to_string(),
            cancellation_reason: None,
            check_in_at: None,
            check_out_at: None,
            created_at: start - Duration::days(1),
            updated_at: start - Duration::days(1),
        }
    }

    fn all_events() -> Vec<BookingEvent> {
        vec![
            BookingEvent::Confirm,
            BookingEvent::Reject,
            BookingEvent::Cancel(None),
            BookingEvent::CheckIn,
            BookingEvent::CheckOut,
            BookingEvent::MarkNoShow,
        ]
    }

    #[test]
    fn test_legal_transitions() {
        use BookingEvent as E;
        use BookingState as S;

        let legal = [
            (S::Pending, E::Confirm, S::Confirmed),
            (S::Pending, E::Reject, S::Rejected),
            (S::Pending, E::Cancel(None), S::Cancelled),
            (S::Confirmed, E::Cancel(None), S::Cancelled),
            (S::Confirmed, E::CheckIn, S::CheckedIn),
            (S::CheckedIn, E::CheckOut, S::CheckedOut),
            (S::Confirmed, E::MarkNoShow, S::NoShow),
        ];

        for (from, event, expected) in legal {
            assert_eq!(
                BookingStateMachine::determine_target_state(from, &event).unwrap(),
                expected,
                "{from} --{}--> should be {expected}",
                event.event_type()
            );
        }
    }

    /// Every (state, event) pair not in the table must fail, and with the
    /// transition error specifically.
    #[test]
    fn test_table_closure() {
        use BookingState as S;

        let legal: [(S, &str); 7] = [
            (S::Pending, "confirm"),
            (S::Pending, "reject"),
            (S::Pending, "cancel"),
            (S::Confirmed, "cancel"),
            (S::Confirmed, "check_in"),
            (S::CheckedIn, "check_out"),
            (S::Confirmed, "mark_no_show"),
        ];

        for state in BookingState::ALL {
            for event in all_events() {
                let is_legal = legal.contains(&(state, event.event_type()));
                let result = BookingStateMachine::determine_target_state(state, &event);
                if is_legal {
                    assert!(result.is_ok(), "{state} --{}-->", event.event_type());
                } else {
                    assert!(
                        matches!(result, Err(BookingError::InvalidTransition { .. })),
                        "{state} --{}--> must be rejected",
                        event.event_type()
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for state in BookingState::ALL.into_iter().filter(BookingState::is_terminal) {
            for event in all_events() {
                assert!(
                    BookingStateMachine::determine_target_state(state, &event).is_err(),
                    "terminal {state} must reject {}",
                    event.event_type()
                );
            }
        }
    }

    #[test]
    fn test_requester_cannot_confirm() {
        let booking = booking_in(BookingState::Pending);
        let policy = DeskhiveConfig::default().policy;
        let result = BookingStateMachine::plan_transition(
            &booking,
            &BookingEvent::Confirm,
            Actor::Requester,
            booking.start_at,
            &policy,
        );
        assert!(matches!(result, Err(BookingError::Authorization(_))));
    }

    #[test]
    fn test_requester_may_cancel() {
        let booking = booking_in(BookingState::Confirmed);
        let policy = DeskhiveConfig::default().policy;
        let plan = BookingStateMachine::plan_transition(
            &booking,
            &BookingEvent::cancel_with_reason("meeting moved"),
            Actor::Requester,
            booking.start_at - Duration::hours(2),
            &policy,
        )
        .unwrap();

        assert_eq!(plan.to, BookingState::Cancelled);
        assert_eq!(plan.cancellation_reason.as_deref(), Some("meeting moved"));
        assert!(plan.check_in_at.is_none());
    }

    #[test]
    fn test_check_in_stamps_timestamp() {
        let booking = booking_in(BookingState::Confirmed);
        let policy = DeskhiveConfig::default().policy;
        let now = booking.start_at + Duration::minutes(5);
        let plan = BookingStateMachine::plan_transition(
            &booking,
            &BookingEvent::CheckIn,
            Actor::OwnerOrStaff,
            now,
            &policy,
        )
        .unwrap();

        assert_eq!(plan.to, BookingState::CheckedIn);
        assert_eq!(plan.check_in_at, Some(now));
        assert!(plan.check_out_at.is_none());
    }

    #[test]
    fn test_check_in_outside_window_rejected_by_guard() {
        let booking = booking_in(BookingState::Confirmed);
        let policy = DeskhiveConfig::default().policy;
        let result = BookingStateMachine::plan_transition(
            &booking,
            &BookingEvent::CheckIn,
            Actor::OwnerOrStaff,
            booking.start_at - Duration::hours(3),
            &policy,
        );
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[test]
    fn test_system_may_mark_no_show() {
        let booking = booking_in(BookingState::Confirmed);
        let policy = DeskhiveConfig::default().policy;
        let plan = BookingStateMachine::plan_transition(
            &booking,
            &BookingEvent::MarkNoShow,
            Actor::System,
            booking.end_at + Duration::minutes(1),
            &policy,
        )
        .unwrap();
        assert_eq!(plan.to, BookingState::NoShow);
    }
}
