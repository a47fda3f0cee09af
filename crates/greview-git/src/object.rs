//! Git object identifiers.

use crate::{GitError, Result};
use std::fmt;

/// The all-zero object id, spelled out as it appears on the wire.
pub const ZERO_ID: &str = "0000000000000000000000000000000000000000";

/// A 20-byte SHA-1 object identifier.
///
/// Ordering matches the lexicographic order of the hex form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// Length of the hex representation.
    pub const HEX_LEN: usize = 40;

    /// Creates an ObjectId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the all-zero id.
    pub const fn zero() -> Self {
        Self([0; 20])
    }

    /// Creates an ObjectId from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != Self::HEX_LEN {
            return Err(GitError::InvalidObjectId(format!(
                "invalid object id length: {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|e| GitError::InvalidObjectId(format!("{hex}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Parses an id from a ref-update command, where the zero id means
    /// "no object".
    pub fn from_wire(hex: &str) -> Result<Option<Self>> {
        let id = Self::from_hex(hex)?;
        Ok((!id.is_zero()).then_some(id))
    }

    /// Formats an optional id for a ref-update command.
    pub fn to_wire(id: Option<&Self>) -> String {
        id.map_or_else(|| ZERO_ID.to_string(), Self::to_hex)
    }

    /// Returns true for the all-zero id.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }

    /// Returns the hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
