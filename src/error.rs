//! Core error taxonomy
//!
//! Every failure here is recoverable: components degrade into a valid
//! result and log a warning rather than aborting the cycle.

use crate::types::SourceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A signal source failed or timed out; its weight is dropped for the
    /// cycle. Raised by the aggregator itself only when every source failed.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// An indicator has not enough warm-up history; treated as NEUTRAL with
    /// zero confidence contribution.
    #[error("insufficient data from {source}: {detail}")]
    InsufficientData { source: SourceId, detail: String },

    /// A malformed or non-finite metric; the source contribution is
    /// discarded for the cycle.
    #[error("invalid signal from {source}: {detail}")]
    InvalidSignal { source: SourceId, detail: String },

    /// An attempted transition on a terminal simulated order; rejected as a
    /// no-op without altering state.
    #[error("state violation on order {order_id}: already {status}")]
    StateViolation { order_id: String, status: String },
}
