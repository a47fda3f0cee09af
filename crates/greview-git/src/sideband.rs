//! Side-band multiplexing.
//!
//! With `side-band-64k` negotiated, every frame sent to the client carries a
//! one-byte band tag in front of its payload so protocol data, progress text
//! and fatal errors can share a single response stream.

use crate::pktline::{HEADER_LEN, MAX_PKT_LEN};

/// Largest chunk of payload carried by one side-band frame
/// (header and band byte take the rest of the frame).
pub const MAX_BAND_CHUNK: usize = MAX_PKT_LEN - HEADER_LEN - 1;

/// Side-band channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Band {
    /// Protocol data.
    Primary = 1,
    /// Human-readable progress text.
    Message = 2,
    /// Fatal error text; the client aborts.
    Error = 3,
}

impl Band {
    /// Returns the wire tag of this band.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Multiplexes `buffers` onto `band`.
///
/// Without a band the buffers are concatenated verbatim. With a band the
/// concatenation is split into chunks of at most [`MAX_BAND_CHUNK`] bytes,
/// each emitted as one tagged frame. Empty input yields no frames.
pub fn band(band: Option<Band>, buffers: &[&[u8]]) -> Vec<u8> {
    let payload = buffers.concat();

    let Some(band) = band else {
        return payload;
    };

    let frames = payload.len().div_ceil(MAX_BAND_CHUNK);
    let mut out = Vec::with_capacity(payload.len() + frames * (HEADER_LEN + 1));
    for chunk in payload.chunks(MAX_BAND_CHUNK) {
        out.extend_from_slice(format!("{:04x}", chunk.len() + HEADER_LEN + 1).as_bytes());
        out.push(band.tag());
        out.extend_from_slice(chunk);
    }
    out
}
