//! Ref-update requests sent by the client at the start of a push.
//!
//! The command list is a sequence of pkt-lines terminated by a flush:
//!
//! ```text
//! <old-id> <new-id> <ref-name>\0<capabilities>\n
//! <old-id> <new-id> <ref-name>\n
//! 0000
//! ```
//!
//! Only the first line carries capabilities. The pack data follows the
//! flush and is left unread.

use crate::capabilities::CapabilitySet;
use crate::object::ObjectId;
use crate::pktline::{decode_text, PktLine, PktLineReader};
use crate::{GitError, Result};
use std::io::Read;

/// A single ref update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateRequest {
    source_id: Option<ObjectId>,
    target_id: Option<ObjectId>,
    canonical_name: String,
}

impl UpdateRequest {
    /// Creates a ref update. `None` stands for the zero id.
    pub fn new(
        source_id: Option<ObjectId>,
        target_id: Option<ObjectId>,
        canonical_name: impl Into<String>,
    ) -> Self {
        Self {
            source_id,
            target_id,
            canonical_name: canonical_name.into(),
        }
    }

    /// The id the ref pointed at before the push; `None` if it did not exist.
    pub fn source_id(&self) -> Option<&ObjectId> {
        self.source_id.as_ref()
    }

    /// The id the ref should point at; `None` if it is being deleted.
    pub fn target_id(&self) -> Option<&ObjectId> {
        self.target_id.as_ref()
    }

    /// Full ref name, e.g. `refs/heads/main`.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Checks if this request creates a ref.
    pub fn is_create(&self) -> bool {
        self.source_id.is_none()
    }

    /// Checks if this request deletes a ref.
    pub fn is_delete(&self) -> bool {
        self.target_id.is_none()
    }

    /// Returns a copy of this request addressing another ref.
    pub fn with_name(&self, canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            ..self.clone()
        }
    }

    /// Formats the request as a command line, without newline or
    /// capabilities.
    pub fn to_command(&self) -> String {
        format!(
            "{} {} {}",
            ObjectId::to_wire(self.source_id()),
            ObjectId::to_wire(self.target_id()),
            self.canonical_name
        )
    }

    /// Parses `<old-id> <new-id> <ref-name>`.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.splitn(3, ' ');
        let (Some(old), Some(new), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(GitError::Protocol(format!("malformed command: {line:?}")));
        };
        if name.is_empty() {
            return Err(GitError::Protocol(format!("missing ref name: {line:?}")));
        }

        let parse_id = |hex: &str| {
            ObjectId::from_wire(hex)
                .map_err(|e| GitError::Protocol(format!("malformed command {line:?}: {e}")))
        };

        Ok(Self::new(parse_id(old)?, parse_id(new)?, name))
    }
}

/// Lazily parsed ref-update requests.
///
/// Created by [`UpdateRequests::parse`], which reads the first line and
/// negotiates capabilities immediately; later lines are read one at a time
/// as the iterator advances. Iteration stops at the flush packet, after the
/// first error, or at end of stream.
pub struct UpdateRequests<'r, R> {
    reader: PktLineReader<&'r mut R>,
    first: Option<UpdateRequest>,
    done: bool,
}

impl<'r, R: Read> UpdateRequests<'r, R> {
    /// Reads the first command and negotiates `capabilities` in place.
    ///
    /// If the command list is empty the capability set is cleared, since
    /// nothing was negotiated.
    pub fn parse(reader: &'r mut R, capabilities: &mut CapabilitySet) -> Result<Self> {
        let mut reader = PktLineReader::new(reader);

        let data = match reader.read()? {
            Some(PktLine::Data(data)) => data,
            Some(PktLine::Flush) | None => {
                capabilities.clear();
                return Ok(Self {
                    reader,
                    first: None,
                    done: true,
                });
            }
        };

        let text = decode_text(&data);
        let line = text.strip_suffix('\n').unwrap_or(&text);
        let Some((command, declared)) = line.split_once('\0') else {
            return Err(GitError::Protocol(
                "first command carries no capabilities".to_string(),
            ));
        };

        capabilities.negotiate(declared)?;
        tracing::debug!(negotiated = %capabilities, "Capabilities negotiated");

        Ok(Self {
            reader,
            first: Some(UpdateRequest::parse(command)?),
            done: false,
        })
    }

    fn next_request(&mut self) -> Result<Option<UpdateRequest>> {
        match self.reader.read()? {
            Some(PktLine::Data(data)) => {
                let text = decode_text(&data);
                let line = text.strip_suffix('\n').unwrap_or(&text);
                UpdateRequest::parse(line).map(Some)
            }
            Some(PktLine::Flush) => Ok(None),
            None => Err(GitError::Protocol(
                "command list not terminated by flush".to_string(),
            )),
        }
    }
}

impl<R: Read> Iterator for UpdateRequests<'_, R> {
    type Item = Result<UpdateRequest>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(first) = self.first.take() {
            return Some(Ok(first));
        }
        if self.done {
            return None;
        }

        match self.next_request() {
            Ok(Some(request)) => Some(Ok(request)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
