//! Error types for framestitch-core.

use crate::frame::SourceCategory;
use thiserror::Error;

/// Result type alias for framestitch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for framestitch operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The frame catalogue has no frames for the requested source category.
    #[error("no frames configured for source category '{0}'")]
    UnknownCategory(SourceCategory),

    /// The event batch violates one of its structural invariants.
    #[error("malformed event batch: {0}")]
    MalformedBatch(#[from] MalformedBatch),

    /// A frame descriptor could not be constructed.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Structural invariant violations of an event batch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedBatch {
    /// `times` and `ids` differ in length.
    #[error("times has {times} values but ids has {ids}")]
    LengthMismatch { times: usize, ids: usize },

    /// The pulse index does not start at zero.
    #[error("pulse index starts at {first}, expected 0")]
    IndexStart { first: u64 },

    /// The pulse index decreases between two consecutive pulses.
    #[error("pulse index decreases at pulse {pulse}: {previous} -> {current}")]
    IndexDecreasing {
        pulse: usize,
        previous: u64,
        current: u64,
    },

    /// The last pulse index entry does not account for every event.
    #[error("pulse index ends at {actual}, expected {expected} events")]
    IndexTotal { expected: usize, actual: u64 },

    /// The pulse index is empty although events are present.
    #[error("pulse index is empty but {events} events are present")]
    MissingIndex { events: usize },
}
