//! # greview Git
//!
//! Git smart HTTP receive-pack engine for greview.
//!
//! Clients push a review as two new branches, `refs/heads/source` and
//! `refs/heads/destination`. This crate speaks the wire side of that push:
//!
//! - **pkt-line** framing and ISO-8859-1 text payloads
//! - **side-band-64k** multiplexing
//! - ref advertisement for `GET /info/refs`
//! - capability negotiation and lazy update-request parsing
//! - the receive-pack exchange itself, which hands the pack to
//!   `git receive-pack` and records a review in a [`greview_store::ReviewStore`]
//! - reading a review's revisions back from its hidden refs
//!
//! ## Example
//!
//! ```rust,no_run
//! use greview_git::{GitReceivePack, ReceivePack};
//! use greview_store::MemoryReviewStore;
//!
//! let engine = ReceivePack::new(
//!     GitReceivePack::new("git", "/var/lib/greview/reviews.git"),
//!     MemoryReviewStore::new(),
//! );
//!
//! let mut body: &[u8] = b"0000";
//! let mut response = Vec::new();
//! engine.run(&mut body, &mut response, "http://localhost:8080/")?;
//! assert_eq!(response, b"0000");
//! # Ok::<(), greview_git::GitError>(())
//! ```

mod adapter;
mod advertise;
mod capabilities;
mod error;
mod object;
mod pktline;
mod receive;
mod report;
mod request;
mod revision;
mod sideband;

pub use adapter::{encode_commands, GitReceivePack, PackAdapter};
pub use advertise::{
    advertise_refs, advertisement_content_type, agent, result_content_type,
    service_capabilities, RECEIVE_PACK_SERVICE,
};
pub use capabilities::{
    CapabilitySet, AGENT_PREFIX, ATOMIC, RECEIVE_PACK_CAPABILITIES, REPORT_STATUS, SIDE_BAND_64K,
};
pub use error::GitError;
pub use object::{ObjectId, ZERO_ID};
pub use pktline::{
    decode_text, encode_text, pkt_line, PktLine, PktLineReader, PktLineWriter, FLUSH,
    HEADER_LEN, MAX_DATA_LEN, MAX_PKT_LEN,
};
pub use receive::{
    review_ref, review_url, ReceiveOutcome, ReceivePack, DESTINATION_REF,
    DESTINATION_REF_TEMPLATE, INITIAL_REVISION, REJECTED_MESSAGE, SOURCE_REF,
    SOURCE_REF_TEMPLATE,
};
pub use report::{RefError, RefStatus, StatusReport, ABORT_MESSAGE, FALLBACK_REASON};
pub use request::{UpdateRequest, UpdateRequests};
pub use revision::{parse_revisions, review_refs_prefix, Revision};
pub use sideband::{band, Band, MAX_BAND_CHUNK};

/// Result type for git operations.
pub type Result<T> = std::result::Result<T, GitError>;
