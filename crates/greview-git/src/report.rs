//! Push status reports.
//!
//! A push either succeeds or fails as a whole. The outcome is rendered in
//! one of two wire formats: a `report-status` block (optionally wrapped in
//! side-band frames), or, for clients that negotiated side-band without
//! report-status, plain progress text followed by a fatal error band.

use crate::pktline::{encode_text, pkt_line, FLUSH};
use crate::sideband::{band, Band};
use crate::Result;
use std::fmt;

/// Shown for refs that were fine on their own but were not created because
/// of another error.
pub const FALLBACK_REASON: &str = "not created, see other errors";

/// Final text on the error band.
pub const ABORT_MESSAGE: &str = "code review creation aborted\n";

/// Why a single ref update was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefError {
    /// The request deletes a ref.
    DeleteUnsupported,
    /// The request moves an existing ref.
    UpdateUnsupported,
    /// The request addresses a ref other than source or destination.
    RefUnsupported,
}

impl RefError {
    /// Reason text sent to the client.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeleteUnsupported => "delete unsupported",
            Self::UpdateUnsupported => "update unsupported",
            Self::RefUnsupported => "ref unsupported",
        }
    }
}

impl fmt::Display for RefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one requested ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefStatus {
    /// Ref name as sent by the client.
    pub name: String,
    /// Why the ref was refused, if it was refused on its own.
    pub error: Option<RefError>,
}

impl RefStatus {
    fn reason(&self) -> &'static str {
        self.error.map_or(FALLBACK_REASON, |e| e.as_str())
    }
}

/// Outcome of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// Every listed ref was accepted.
    Success {
        /// Accepted ref names, in report order.
        refs: Vec<String>,
    },
    /// Nothing was accepted.
    Failure {
        /// Overall failure message.
        message: String,
        /// Every requested ref, with its own error if any.
        refs: Vec<RefStatus>,
    },
}

impl StatusReport {
    /// Renders the report for the given band.
    ///
    /// A failure rendered on [`Band::Error`] uses the progress-text form;
    /// everything else is a report-status block, side-band framed when a
    /// band is given.
    pub fn render(&self, report_band: Option<Band>) -> Result<Vec<u8>> {
        match self {
            Self::Failure { message, refs } if report_band == Some(Band::Error) => {
                let mut out = band(
                    Some(Band::Message),
                    &[&encode_text(&format!("{message}\n"))],
                );
                for status in refs {
                    let line = format!("{} ({})\n", status.name, status.reason());
                    out.extend(band(Some(Band::Message), &[&encode_text(&line)]));
                }
                out.extend(band(Some(Band::Error), &[&encode_text(ABORT_MESSAGE)]));
                Ok(out)
            }
            Self::Failure { message, refs } => {
                let mut lines = vec![pkt_line(&format!("unpack {message}\n"))?];
                for status in refs {
                    lines.push(pkt_line(&format!("ng {} {}\n", status.name, status.reason()))?);
                }
                lines.push(FLUSH.to_vec());
                Ok(frame(report_band, &lines))
            }
            Self::Success { refs } => {
                let mut lines = vec![pkt_line("unpack ok\n")?];
                for name in refs {
                    lines.push(pkt_line(&format!("ok {name}\n"))?);
                }
                lines.push(FLUSH.to_vec());
                Ok(frame(report_band, &lines))
            }
        }
    }
}

fn frame(report_band: Option<Band>, lines: &[Vec<u8>]) -> Vec<u8> {
    let buffers: Vec<&[u8]> = lines.iter().map(Vec::as_slice).collect();
    band(report_band, &buffers)
}
