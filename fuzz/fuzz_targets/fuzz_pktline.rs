//! Fuzz target for pkt-line decoding.
//!
//! Reads packets from arbitrary input and checks that every decoded data
//! packet encodes back to the bytes it was read from.

#![no_main]

use greview_git::{PktLine, PktLineReader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(data);
    let mut consumed = 0;

    while let Ok(Some(pkt)) = reader.read() {
        let encoded = pkt.encode().expect("decoded packet must re-encode");
        // Headers may arrive in upper case; encoding is lower case.
        assert!(data[consumed..consumed + encoded.len()].eq_ignore_ascii_case(&encoded));
        consumed += encoded.len();
        if let PktLine::Data(payload) = pkt {
            assert!(payload.len() <= greview_git::MAX_DATA_LEN);
        }
    }
});
