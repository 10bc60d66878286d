// Booking lifecycle state machine.
//
// A closed seven-state enum with an exhaustively matched transition table,
// role gating per event, and pure time-policy guards. Persistence of the
// resulting transition plan belongs to the lifecycle service.

pub mod booking_state_machine;
pub mod events;
pub mod guards;
pub mod states;

pub use booking_state_machine::{BookingStateMachine, TransitionPlan};
pub use events::{Actor, BookingEvent};
pub use guards::StateGuard;
pub use states::BookingState;
