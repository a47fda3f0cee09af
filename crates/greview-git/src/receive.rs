//! Review intake over `git-receive-pack`.
//!
//! A push creates a review when it consists of exactly two new branches,
//! `refs/heads/source` and `refs/heads/destination`. The branches are
//! stored under a hidden per-review prefix, a review record is saved, and
//! the client is told where to find the review.

use crate::adapter::PackAdapter;
use crate::capabilities::{CapabilitySet, REPORT_STATUS, SIDE_BAND_64K};
use crate::pktline::{decode_text, PktLine, PktLineReader, FLUSH};
use crate::report::{RefError, RefStatus, StatusReport};
use crate::request::{UpdateRequest, UpdateRequests};
use crate::sideband::{band, Band};
use crate::Result;
use greview_store::{ReviewRecord, ReviewSession, ReviewStore};
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use uuid::Uuid;

/// Branch the client pushes with the proposed changes.
pub const SOURCE_REF: &str = "refs/heads/source";
/// Branch the client pushes with the merge base.
pub const DESTINATION_REF: &str = "refs/heads/destination";

/// Where the source branch of a review revision is stored.
pub const SOURCE_REF_TEMPLATE: &str = "refs/heads/reviews/{id}/{version}/source";
/// Where the destination branch of a review revision is stored.
pub const DESTINATION_REF_TEMPLATE: &str = "refs/heads/reviews/{id}/{version}/destination";

/// Revision of a newly created review.
pub const INITIAL_REVISION: u32 = 1;

/// Failure message for pushes of the wrong shape.
pub const REJECTED_MESSAGE: &str = "expected source and destination branches to be pushed";

const UNPACK_OK: &str = "unpack ok";
const UNPACK_PREFIX: &str = "unpack ";

/// Expands a hidden ref template for one review revision.
pub fn review_ref(template: &str, review_id: &str, version: u32) -> String {
    template
        .replace("{id}", review_id)
        .replace("{version}", &version.to_string())
}

/// Browse URL of a review.
pub fn review_url(base_url: &str, display_id: &str) -> String {
    format!("{}/#/{display_id}", base_url.trim_end_matches('/'))
}

/// What a push amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// No ref updates were sent.
    Empty,
    /// Nothing was stored; `message` was reported to the client.
    Rejected {
        /// Failure message.
        message: String,
    },
    /// A review was created.
    Created {
        /// Human-facing id assigned by the store.
        display_id: String,
        /// Id used in the hidden ref names.
        review_id: String,
    },
}

/// Drives one receive-pack exchange.
#[derive(Debug, Clone)]
pub struct ReceivePack<A, S> {
    adapter: A,
    store: S,
}

impl<A: PackAdapter, S: ReviewStore> ReceivePack<A, S> {
    /// Creates an orchestrator writing packs through `adapter` and reviews
    /// into `store`.
    pub fn new(adapter: A, store: S) -> Self {
        Self { adapter, store }
    }

    /// Returns the pack adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the review store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Handles a push read from `input`, writing the response to `output`.
    ///
    /// `base_url` is where reviews can be browsed. Protocol errors and store
    /// failures are returned as errors; refused pushes are reported to the
    /// client and returned as [`ReceiveOutcome::Rejected`].
    pub fn run<R: Read, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
        base_url: &str,
    ) -> Result<ReceiveOutcome> {
        let mut capabilities = CapabilitySet::receive_pack();
        let requests = UpdateRequests::parse(input, &mut capabilities)?;

        let session = Session::new(&capabilities);
        let mut output = FinalFlush::new(output, session.side_band);

        let requests = requests.collect::<Result<Vec<_>>>()?;
        if requests.is_empty() {
            output.write_all(FLUSH)?;
            output.finish()?;
            return Ok(ReceiveOutcome::Empty);
        }

        let outcome = self.receive(&session, &requests, input, &mut *output, base_url)?;
        output.finish()?;
        Ok(outcome)
    }

    fn receive<R: Read, W: Write>(
        &self,
        session: &Session,
        requests: &[UpdateRequest],
        pack: &mut R,
        output: &mut W,
        base_url: &str,
    ) -> Result<ReceiveOutcome> {
        let statuses = validate(requests);
        let Some((source, destination)) = review_pair(requests, &statuses) else {
            tracing::warn!(
                refs = requests.len(),
                "Rejected push that is not a source/destination pair"
            );
            return session.reject(output, REJECTED_MESSAGE, statuses);
        };

        let review_id = Uuid::new_v4().to_string();
        let commands = [
            source.with_name(review_ref(SOURCE_REF_TEMPLATE, &review_id, INITIAL_REVISION)),
            destination.with_name(review_ref(
                DESTINATION_REF_TEMPLATE,
                &review_id,
                INITIAL_REVISION,
            )),
        ];

        let status = self.adapter.accept(&commands, pack)?;
        if let Err(reason) = unpack_status(&status) {
            tracing::warn!(%review_id, %reason, "git refused the pushed pack");
            return session.reject(output, &reason, statuses);
        }

        let mut store = self.store.session();
        let display_id = store.next_display_id()?;
        store.add(ReviewRecord::new(display_id.clone(), review_id.clone()));
        store.save_changes()?;

        tracing::info!(%display_id, %review_id, "Code review created");

        if session.side_band {
            let message = format!(
                "code review created:\n\n\t{}\n\n",
                review_url(base_url, &display_id)
            );
            output.write_all(&band(Some(Band::Message), &[message.as_bytes()]))?;
        }

        if session.report_status {
            let report = StatusReport::Success {
                refs: vec![
                    destination.canonical_name().to_string(),
                    source.canonical_name().to_string(),
                ],
            };
            output.write_all(&report.render(session.report_band)?)?;
        }

        Ok(ReceiveOutcome::Created {
            display_id,
            review_id,
        })
    }
}

/// Negotiated state of one exchange.
#[derive(Debug, Clone, Copy)]
struct Session {
    report_status: bool,
    side_band: bool,
    report_band: Option<Band>,
}

impl Session {
    fn new(capabilities: &CapabilitySet) -> Self {
        let side_band = capabilities.contains(SIDE_BAND_64K);
        Self {
            report_status: capabilities.contains(REPORT_STATUS),
            side_band,
            report_band: side_band.then_some(Band::Primary),
        }
    }

    /// Reports a failed push. Clients that negotiated neither status nor
    /// side-band get no output.
    fn reject<W: Write>(
        &self,
        output: &mut W,
        message: &str,
        refs: Vec<RefStatus>,
    ) -> Result<ReceiveOutcome> {
        if self.report_status || self.side_band {
            let report_band = if self.report_status {
                self.report_band
            } else {
                Some(Band::Error)
            };
            let report = StatusReport::Failure {
                message: message.to_string(),
                refs,
            };
            output.write_all(&report.render(report_band)?)?;
        }

        Ok(ReceiveOutcome::Rejected {
            message: message.to_string(),
        })
    }
}

fn ref_error(request: &UpdateRequest) -> Option<RefError> {
    if request.is_delete() {
        Some(RefError::DeleteUnsupported)
    } else if !request.is_create() {
        Some(RefError::UpdateUnsupported)
    } else if request.canonical_name() != SOURCE_REF
        && request.canonical_name() != DESTINATION_REF
    {
        Some(RefError::RefUnsupported)
    } else {
        None
    }
}

fn validate(requests: &[UpdateRequest]) -> Vec<RefStatus> {
    requests
        .iter()
        .map(|request| RefStatus {
            name: request.canonical_name().to_string(),
            error: ref_error(request),
        })
        .collect()
}

/// Picks the source and destination requests out of a valid push.
fn review_pair<'a>(
    requests: &'a [UpdateRequest],
    statuses: &[RefStatus],
) -> Option<(&'a UpdateRequest, &'a UpdateRequest)> {
    if requests.len() != 2 || statuses.iter().any(|s| s.error.is_some()) {
        return None;
    }

    let find = |name: &str| requests.iter().find(|r| r.canonical_name() == name);
    Some((find(SOURCE_REF)?, find(DESTINATION_REF)?))
}

/// Interprets the first line of the adapter's status stream.
fn unpack_status(status: &[u8]) -> std::result::Result<(), String> {
    let line = match PktLineReader::new(status).read() {
        Ok(Some(PktLine::Data(data))) => decode_text(&data),
        Ok(Some(PktLine::Flush)) | Ok(None) => {
            return Err("no status from git receive-pack".to_string())
        }
        Err(e) => return Err(format!("unreadable status from git receive-pack: {e}")),
    };

    let line = line.trim_end_matches('\n');
    if line == UNPACK_OK {
        return Ok(());
    }

    Err(line.strip_prefix(UNPACK_PREFIX).unwrap_or(line).to_string())
}

/// Response writer that ends with a flush packet when side-band is in use,
/// whether the exchange finishes normally or not.
struct FinalFlush<'w, W: Write> {
    inner: &'w mut W,
    pending: bool,
}

impl<'w, W: Write> FinalFlush<'w, W> {
    fn new(inner: &'w mut W, enabled: bool) -> Self {
        Self {
            inner,
            pending: enabled,
        }
    }

    /// Writes the final flush now, reporting failures.
    fn finish(mut self) -> Result<()> {
        if self.pending {
            self.pending = false;
            self.inner.write_all(FLUSH)?;
        }
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write> Deref for FinalFlush<'_, W> {
    type Target = W;

    fn deref(&self) -> &W {
        self.inner
    }
}

impl<W: Write> DerefMut for FinalFlush<'_, W> {
    fn deref_mut(&mut self) -> &mut W {
        self.inner
    }
}

impl<W: Write> Drop for FinalFlush<'_, W> {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        if let Err(e) = self.inner.write_all(FLUSH).and_then(|()| self.inner.flush()) {
            tracing::warn!(error = %e, "Failed to write final flush");
        }
    }
}
