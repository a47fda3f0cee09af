//! Review records.

use serde::{Deserialize, Serialize};

/// A persisted code review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Display identifier, e.g. `cr0042`.
    pub id: String,
    /// Prefix of the hidden refs holding this review's revisions.
    #[serde(skip_serializing, default)]
    pub ref_prefix: String,
}

impl ReviewRecord {
    /// Creates a new review record.
    pub fn new(id: impl Into<String>, ref_prefix: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ref_prefix: ref_prefix.into(),
        }
    }
}
