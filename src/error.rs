//! # Structured Error Handling
//!
//! Typed error taxonomy for the booking core. Lifecycle operations surface
//! these synchronously so the calling layer can render a precise message;
//! reconciliation errors are caught at per-source/per-space boundaries and
//! recorded as sync outcomes instead of unwinding into the scheduler.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed input rejected before any persistence access.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested window overlaps an active booking. Carries the blocking
    /// booking so callers can show the occupied slot.
    #[error("Booking conflict: space is occupied by booking {booking_id} from {start_at} to {end_at}")]
    Conflict {
        booking_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },

    /// Attempted transition not present in the lifecycle table.
    #[error("Invalid state transition: cannot apply {event} from {from}")]
    InvalidTransition { from: String, event: String },

    /// Role guard failed for an owner/staff gated operation.
    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Outbound calendar fetch failed (network, timeout, non-success status).
    #[error("External fetch error: {0}")]
    ExternalFetch(String),

    /// Fetched payload could not be parsed as a calendar document.
    #[error("External parse error: {0}")]
    ExternalParse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BookingError {
    /// Short classifier used in logs and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Authorization(_) => "authorization",
            Self::NotFound(_) => "not_found",
            Self::Database(_) => "database",
            Self::ExternalFetch(_) => "external_fetch",
            Self::ExternalParse(_) => "external_parse",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Transient failures count against a source's consecutive-failure
    /// budget but are otherwise retried on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::ExternalFetch(_))
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
