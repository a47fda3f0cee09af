//! Git protocol error types.

use thiserror::Error;

/// Errors that can occur during git protocol operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pkt-line format.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid object id.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    /// The external git process could not be driven.
    #[error("git process error: {0}")]
    Process(String),

    /// Review store error.
    #[error("store error: {0}")]
    Store(#[from] greview_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
