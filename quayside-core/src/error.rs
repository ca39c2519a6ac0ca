use chrono::{DateTime, Utc};
use quayside_domain::{BookingStatus, StoreError};

/// Error taxonomy shared by every core operation. The HTTP layer maps these
/// to status codes; none is silently swallowed.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("requester may not perform this operation")]
    Unauthorized,

    #[error("timeslot is full")]
    CapacityExceeded,

    #[error("unknown gate credential")]
    InvalidCredential,

    #[error("truck arrived too early: slot starts at {slot_start}, current time {now}")]
    ArrivedTooEarly {
        slot_start: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidState {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
