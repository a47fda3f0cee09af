//! Git pkt-line format implementation.
//!
//! The pkt-line format is used for all git protocol communication.
//! Each line is prefixed with a 4-character hex length covering the prefix
//! itself and the payload, or "0000" for flush.
//!
//! Textual payloads are encoded as ISO-8859-1 so that every byte value maps
//! to exactly one code point and back; UTF-8 is never used implicitly.

use crate::{GitError, Result};
use std::io::{ErrorKind, Read, Write};

/// The flush packet.
pub const FLUSH: &[u8; 4] = b"0000";

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Largest frame the 4-digit header can describe.
pub const MAX_PKT_LEN: usize = 0xFFFF;

/// Largest payload a single data packet can carry.
pub const MAX_DATA_LEN: usize = MAX_PKT_LEN - HEADER_LEN;

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
}

impl PktLine {
    /// Creates a data packet from text, encoded as ISO-8859-1.
    pub fn from_string(s: &str) -> Self {
        Self::Data(encode_text(s))
    }

    /// Creates a data packet from bytes.
    pub fn from_bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Data(b.into())
    }

    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Data(data) => {
                if data.len() > MAX_DATA_LEN {
                    return Err(GitError::InvalidPktLine(format!(
                        "payload of {} bytes exceeds {} byte limit",
                        data.len(),
                        MAX_DATA_LEN
                    )));
                }
                let mut result = Vec::with_capacity(HEADER_LEN + data.len());
                result.extend_from_slice(format!("{:04x}", data.len() + HEADER_LEN).as_bytes());
                result.extend_from_slice(data);
                Ok(result)
            }
            Self::Flush => Ok(FLUSH.to_vec()),
        }
    }

    /// Returns true if this is a flush packet.
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }

    /// Returns the data content, or None for flush.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(data) => Some(data),
            Self::Flush => None,
        }
    }

    /// Returns the data decoded as ISO-8859-1, trimming any trailing newline.
    pub fn as_text(&self) -> Option<String> {
        self.data()
            .map(|d| decode_text(d.strip_suffix(b"\n").unwrap_or(d)))
    }
}

/// Encodes a text packet in one step.
pub fn pkt_line(s: &str) -> Result<Vec<u8>> {
    PktLine::from_string(s).encode()
}

/// Encodes text as ISO-8859-1. Code points above U+00FF become `?`.
pub fn encode_text(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Decodes ISO-8859-1 bytes. Never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parses a length prefix strictly: exactly four hex digits, nothing else.
fn parse_header(header: &[u8; HEADER_LEN]) -> Result<usize> {
    if !header.iter().all(u8::is_ascii_hexdigit) {
        return Err(GitError::InvalidPktLine(format!(
            "invalid length prefix: {:?}",
            decode_text(header)
        )));
    }

    let len = header.iter().fold(0usize, |acc, &b| {
        // Digits were checked above.
        let digit = char::from(b).to_digit(16).unwrap_or(0) as usize;
        acc * 16 + digit
    });

    match len {
        0 => Ok(0),
        1..=3 => Err(GitError::InvalidPktLine(format!(
            "length {len} is shorter than the header"
        ))),
        _ => Ok(len),
    }
}

/// Reader for pkt-line format.
///
/// Reads only the bytes that belong to each packet, so the underlying
/// reader is left positioned right after the last packet read.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    /// Creates a new pkt-line reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next packet, or `None` at a clean end of stream.
    pub fn read(&mut self) -> Result<Option<PktLine>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match self.reader.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(GitError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "truncated pkt-line header",
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        match parse_header(&header)? {
            0 => Ok(Some(PktLine::Flush)),
            len => {
                let mut data = vec![0u8; len - HEADER_LEN];
                self.reader.read_exact(&mut data)?;
                Ok(Some(PktLine::Data(data)))
            }
        }
    }

    /// Reads all packets until a flush packet.
    pub fn read_until_flush(&mut self) -> Result<Vec<PktLine>> {
        let mut packets = Vec::new();
        loop {
            match self.read()? {
                Some(PktLine::Flush) | None => break,
                Some(pkt) => packets.push(pkt),
            }
        }
        Ok(packets)
    }

    /// Returns a mutable reference to the inner reader.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.reader
    }
}

/// Writer for pkt-line format.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    /// Creates a new pkt-line writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a packet.
    pub fn write(&mut self, pkt: &PktLine) -> Result<()> {
        self.writer.write_all(&pkt.encode()?)?;
        Ok(())
    }

    /// Writes a text line, appending a newline if missing.
    pub fn write_line(&mut self, s: &str) -> Result<()> {
        let mut data = encode_text(s);
        if !s.ends_with('\n') {
            data.push(b'\n');
        }
        self.write(&PktLine::Data(data))
    }

    /// Writes a flush packet.
    pub fn flush_pkt(&mut self) -> Result<()> {
        self.write(&PktLine::Flush)
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn read_one(bytes: &[u8]) -> Result<Option<PktLine>> {
        PktLineReader::new(Cursor::new(bytes.to_vec())).read()
    }

    #[test]
    fn test_pktline_encode() {
        assert_eq!(PktLine::from_string("hello\n").encode().unwrap(), b"000ahello\n");
        assert_eq!(PktLine::Flush.encode().unwrap(), b"0000");
    }

    #[test]
    fn test_header_is_lowercase() {
        let pkt = PktLine::from_bytes(vec![b'x'; 0xab - 4]);
        assert_eq!(&pkt.encode().unwrap()[..4], b"00ab");
    }

    #[test]
    fn test_pktline_roundtrip() {
        let packets = vec![
            PktLine::from_string("hello\n"),
            PktLine::from_string("world\n"),
            PktLine::Flush,
        ];

        let mut buf = Vec::new();
        {
            let mut writer = PktLineWriter::new(&mut buf);
            for pkt in &packets {
                writer.write(pkt).unwrap();
            }
        }

        let mut reader = PktLineReader::new(Cursor::new(buf));
        assert_eq!(reader.read().unwrap(), Some(packets[0].clone()));
        assert_eq!(reader.read().unwrap(), Some(packets[1].clone()));
        assert_eq!(reader.read().unwrap(), Some(PktLine::Flush));
        assert_eq!(reader.read().unwrap(), None);
    }

    #[test]
    fn test_flush_always_decodes_as_flush() {
        assert_eq!(read_one(b"0000").unwrap(), Some(PktLine::Flush));
        assert_eq!(read_one(b"0000trailing").unwrap(), Some(PktLine::Flush));
    }

    #[test]
    fn test_short_lengths_rejected() {
        for header in [b"0001", b"0002", b"0003"] {
            let result = read_one(header);
            assert!(
                matches!(result, Err(GitError::InvalidPktLine(_))),
                "{:?} accepted",
                header
            );
        }
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(read_one(b"0004").unwrap(), Some(PktLine::Data(Vec::new())));
        assert_eq!(&PktLine::from_bytes(Vec::new()).encode().unwrap(), b"0004");
    }

    #[test]
    fn test_header_strictness() {
        for header in [b"+00a", b"-00a", b"0x0a", b" 00a", b"00g0", b"00a\n"] {
            let mut input = header.to_vec();
            input.extend_from_slice(b"hello\n");
            assert!(
                matches!(read_one(&input), Err(GitError::InvalidPktLine(_))),
                "{:?} accepted",
                decode_text(header)
            );
        }
    }

    #[test]
    fn test_uppercase_header_accepted() {
        let mut input = b"000A".to_vec();
        input.extend_from_slice(b"hello\n");
        assert_eq!(read_one(&input).unwrap(), Some(PktLine::from_string("hello\n")));
    }

    #[test]
    fn test_truncated_header_is_error() {
        assert!(matches!(read_one(b"00"), Err(GitError::Io(_))));
    }

    #[test]
    fn test_truncated_payload_is_error() {
        assert!(matches!(read_one(b"000ahel"), Err(GitError::Io(_))));
    }

    #[test]
    fn test_reader_stops_after_packet() {
        let mut input = pkt_line("one\n").unwrap();
        input.extend_from_slice(FLUSH);
        input.extend_from_slice(b"PACK\x00\x00\x00\x02");

        let mut reader = PktLineReader::new(Cursor::new(input));
        assert_eq!(reader.read_until_flush().unwrap().len(), 1);

        let mut rest = Vec::new();
        reader.inner_mut().read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"PACK\x00\x00\x00\x02");
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let pkt = PktLine::from_bytes(vec![0u8; MAX_DATA_LEN + 1]);
        assert!(matches!(pkt.encode(), Err(GitError::InvalidPktLine(_))));

        let pkt = PktLine::from_bytes(vec![0u8; MAX_DATA_LEN]);
        assert_eq!(&pkt.encode().unwrap()[..4], b"ffff");
    }

    #[test]
    fn test_latin1_text() {
        assert_eq!(encode_text("caf\u{e9}"), b"caf\xe9");
        assert_eq!(decode_text(b"caf\xe9"), "caf\u{e9}");
        assert_eq!(encode_text("\u{263a}"), b"?");
    }

    #[test]
    fn test_as_text_trims_newline() {
        assert_eq!(PktLine::from_string("unpack ok\n").as_text().unwrap(), "unpack ok");
        assert_eq!(PktLine::from_string("no newline").as_text().unwrap(), "no newline");
        assert!(PktLine::Flush.as_text().is_none());
    }

    #[test]
    fn test_writer_write_line() {
        let mut buf = Vec::new();
        {
            let mut writer = PktLineWriter::new(&mut buf);
            writer.write_line("test").unwrap();
            writer.write_line("test\n").unwrap();
            writer.flush_pkt().unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(buf, b"0009test\n0009test\n0000");
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..=2048)) {
            let encoded = PktLine::from_bytes(payload.clone()).encode().unwrap();
            prop_assert_eq!(encoded.len(), payload.len() + HEADER_LEN);
            prop_assert_eq!(read_one(&encoded).unwrap(), Some(PktLine::Data(payload)));
        }

        #[test]
        fn prop_roundtrip_near_limit(len in (MAX_DATA_LEN - 64)..=MAX_DATA_LEN, byte in any::<u8>()) {
            let payload = vec![byte; len];
            let encoded = PktLine::from_bytes(payload.clone()).encode().unwrap();
            prop_assert_eq!(read_one(&encoded).unwrap(), Some(PktLine::Data(payload)));
        }

        #[test]
        fn prop_latin1_is_lossless(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(encode_text(&decode_text(&bytes)), bytes);
        }

        #[test]
        fn prop_reader_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let mut reader = PktLineReader::new(Cursor::new(bytes));
            for _ in 0..16 {
                match reader.read() {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
}
