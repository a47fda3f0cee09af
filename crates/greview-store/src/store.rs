//! Review store traits and the in-memory implementation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{Result, ReviewRecord, StoreError};

/// A unit of work against a review store.
///
/// Records added to a session become visible only after
/// [`save_changes`](ReviewSession::save_changes). Dropping a session
/// without saving discards its pending records.
pub trait ReviewSession {
    /// Allocates the next display id from the store's sequence.
    fn next_display_id(&mut self) -> Result<String>;

    /// Stages a record for insertion.
    fn add(&mut self, record: ReviewRecord);

    /// Commits every staged record.
    fn save_changes(&mut self) -> Result<()>;
}

/// Persistence for code reviews.
pub trait ReviewStore: Send + Sync {
    /// Session type handed out by this store.
    type Session<'a>: ReviewSession
    where
        Self: 'a;

    /// Opens a new session.
    fn session(&self) -> Self::Session<'_>;

    /// Looks up a review by display id.
    fn get(&self, id: &str) -> Result<Option<ReviewRecord>>;
}

impl<T: ReviewStore> ReviewStore for Arc<T> {
    type Session<'a>
        = T::Session<'a>
    where
        Self: 'a;

    fn session(&self) -> Self::Session<'_> {
        (**self).session()
    }

    fn get(&self, id: &str) -> Result<Option<ReviewRecord>> {
        (**self).get(id)
    }
}

/// Formats a sequence number as a display id (`cr0001`).
pub fn format_display_id(sequence: u64) -> String {
    format!("cr{:04}", sequence)
}

/// In-memory review store.
///
/// Thread-safe; the display id counter is shared by all sessions.
#[derive(Default)]
pub struct MemoryReviewStore {
    /// Reviews indexed by display id.
    reviews: RwLock<HashMap<String, ReviewRecord>>,
    /// Last allocated sequence number.
    sequence: AtomicU64,
}

impl MemoryReviewStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of saved reviews.
    pub fn len(&self) -> usize {
        self.reviews.read().len()
    }

    /// Returns true if no review has been saved.
    pub fn is_empty(&self) -> bool {
        self.reviews.read().is_empty()
    }

    fn next_sequence(&self) -> Result<u64> {
        self.sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| StoreError::SequenceExhausted)
    }
}

impl ReviewStore for MemoryReviewStore {
    type Session<'a> = MemoryReviewSession<'a>;

    fn session(&self) -> Self::Session<'_> {
        MemoryReviewSession {
            store: self,
            pending: Vec::new(),
        }
    }

    fn get(&self, id: &str) -> Result<Option<ReviewRecord>> {
        Ok(self.reviews.read().get(id).cloned())
    }
}

/// Session over a [`MemoryReviewStore`].
pub struct MemoryReviewSession<'a> {
    store: &'a MemoryReviewStore,
    pending: Vec<ReviewRecord>,
}

impl ReviewSession for MemoryReviewSession<'_> {
    fn next_display_id(&mut self) -> Result<String> {
        self.store.next_sequence().map(format_display_id)
    }

    fn add(&mut self, record: ReviewRecord) {
        self.pending.push(record);
    }

    fn save_changes(&mut self) -> Result<()> {
        let mut reviews = self.store.reviews.write();

        // All-or-nothing: check every staged id before inserting any.
        for (i, record) in self.pending.iter().enumerate() {
            let staged_twice = self.pending[..i].iter().any(|r| r.id == record.id);
            if staged_twice || reviews.contains_key(&record.id) {
                return Err(StoreError::ReviewExists(record.id.clone()));
            }
        }

        for record in self.pending.drain(..) {
            tracing::debug!(id = %record.id, ref_prefix = %record.ref_prefix, "Review saved");
            reviews.insert(record.id.clone(), record);
        }

        Ok(())
    }
}
