//! Review persistence for greview.
//!
//! A review is created exactly once per accepted push. The store hands out
//! human-facing display ids from a monotonically increasing sequence and
//! records which hidden ref prefix holds the pushed branches.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::ReviewRecord;
pub use store::{
    format_display_id, MemoryReviewSession, MemoryReviewStore, ReviewSession, ReviewStore,
};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
