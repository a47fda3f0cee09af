//! Capability negotiation.

use crate::{GitError, Result};
use std::collections::HashSet;
use std::fmt;

/// Ref updates are applied all-or-nothing.
pub const ATOMIC: &str = "atomic";
/// The client wants an `unpack`/`ok`/`ng` status report.
pub const REPORT_STATUS: &str = "report-status";
/// Responses are multiplexed with side-band framing.
pub const SIDE_BAND_64K: &str = "side-band-64k";
/// Prefix of the informational agent token.
pub const AGENT_PREFIX: &str = "agent=";

/// Capabilities supported by receive-pack, in advertisement order.
pub const RECEIVE_PACK_CAPABILITIES: [&str; 3] = [ATOMIC, REPORT_STATUS, SIDE_BAND_64K];

/// An unordered set of capability tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(HashSet<String>);

impl CapabilitySet {
    /// The set supported by receive-pack.
    pub fn receive_pack() -> Self {
        RECEIVE_PACK_CAPABILITIES.into_iter().collect()
    }

    /// Returns true if `token` is in the set.
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes every token.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Narrows this set to the tokens the client declared.
    ///
    /// `declared` is the space-separated list from the first command line.
    /// Every declared token must end up in the narrowed set, except `agent=`
    /// tokens, which are accepted and dropped.
    pub fn negotiate(&mut self, declared: &str) -> Result<()> {
        let declared: HashSet<&str> = declared.split(' ').filter(|t| !t.is_empty()).collect();

        self.0.retain(|token| declared.contains(token.as_str()));

        let mut unsupported: Vec<&str> = declared
            .iter()
            .copied()
            .filter(|token| !self.contains(token) && !token.starts_with(AGENT_PREFIX))
            .collect();

        if unsupported.is_empty() {
            return Ok(());
        }

        unsupported.sort_unstable();
        Err(GitError::Protocol(format!(
            "unsupported capabilities: {}",
            unsupported.join(" ")
        )))
    }
}

impl<S: Into<String>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens: Vec<&str> = self.0.iter().map(String::as_str).collect();
        tokens.sort_unstable();
        f.write_str(&tokens.join(" "))
    }
}
