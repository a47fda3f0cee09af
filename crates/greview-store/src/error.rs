//! Store error types.

use thiserror::Error;

/// Errors that can occur while persisting reviews.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A review with the same display id is already stored.
    #[error("review already exists: {0}")]
    ReviewExists(String),

    /// The display id sequence cannot advance any further.
    #[error("review id sequence exhausted")]
    SequenceExhausted,

    /// The backing store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
