use serde::{Deserialize, Serialize};

/// Role under which a lifecycle event is attempted.
///
/// Create and Cancel are legal for the requesting user; everything else is
/// gated to owner/staff (NoShow may also be raised by the system sweep).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Requester,
    OwnerOrStaff,
    System,
}

/// Events that drive booking state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    /// Owner/staff accepts a pending request
    Confirm,
    /// Owner/staff declines a pending request
    Reject,
    /// Requester or owner withdraws; carries the stated reason
    Cancel(Option<String>),
    /// Staff checks the guest in at the space
    CheckIn,
    /// Staff checks the guest out
    CheckOut,
    /// Staff or the system sweep flags a missed confirmed booking
    MarkNoShow,
}

impl BookingEvent {
    /// String representation of the event type for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Reject => "reject",
            Self::Cancel(_) => "cancel",
            Self::CheckIn => "check_in",
            Self::CheckOut => "check_out",
            Self::MarkNoShow => "mark_no_show",
        }
    }

    /// Extract the cancellation reason if this is a cancel event.
    pub fn cancellation_reason(&self) -> Option<&str> {
        match self {
            Self::Cancel(reason) => reason.as_deref(),
            _ => None,
        }
    }

    /// Whether this event lands the booking in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Reject | Self::Cancel(_) | Self::CheckOut | Self::MarkNoShow
        )
    }

    /// Create a cancel event with the given reason.
    pub fn cancel_with_reason(reason: impl Into<String>) -> Self {
        Self::Cancel(Some(reason.into()))
    }
}
