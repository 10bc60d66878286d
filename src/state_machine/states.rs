use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking lifecycle states.
///
/// The four "active" states occupy the space's calendar and block overlapping
/// requests; the terminal states never do. `CheckedOut` is both active (it
/// still blocks its own historical window) and terminal (no further
/// transitions are accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
pub enum BookingState {
    /// Requested by a user, awaiting owner/staff decision
    Pending,
    /// Accepted; the slot is committed
    Confirmed,
    /// Guest arrived and was checked in by staff
    CheckedIn,
    /// Visit completed
    CheckedOut,
    /// Withdrawn by the requester or the owner
    Cancelled,
    /// Declined by owner/staff while pending
    Rejected,
    /// Confirmed but the guest never arrived
    NoShow,
}

impl BookingState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Rejected | Self::CheckedOut | Self::NoShow
        )
    }

    /// Active states occupy the space's calendar for overlap checks.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Confirmed | Self::CheckedIn | Self::CheckedOut
        )
    }

    /// Whether a booking in this state may still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::CheckedIn => "checked_in",
            Self::CheckedOut => "checked_out",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::NoShow => "no_show",
        }
    }

    /// All seven states, for exhaustive table checks in tests.
    pub const ALL: [BookingState; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::CheckedIn,
        Self::CheckedOut,
        Self::Cancelled,
        Self::Rejected,
        Self::NoShow,
    ];
}

impl fmt::Display for BookingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "checked_in" => Ok(Self::CheckedIn),
            "checked_out" => Ok(Self::CheckedOut),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            "no_show" => Ok(Self::NoShow),
            _ => Err(format!("Invalid booking state: {s}")),
        }
    }
}

impl Default for BookingState {
    fn default() -> Self {
        Self::Pending
    }
}
