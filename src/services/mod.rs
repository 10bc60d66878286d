//! Service layer: the booking lifecycle orchestrator and the narrow
//! collaborator interfaces it consumes (identity/authorization).

pub mod authorization;
pub mod booking_lifecycle;

pub use authorization::{Authorizer, SpaceRole, StaticAuthorizer};
pub use booking_lifecycle::{BookingLifecycleService, CreateBookingRequest};
