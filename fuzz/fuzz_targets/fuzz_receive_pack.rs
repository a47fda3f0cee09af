//! Fuzz target for the receive-pack exchange.
//!
//! Runs arbitrary push bodies through the engine with an adapter that always
//! accepts, checking that any response written ends in a flush packet.

#![no_main]

use std::io::Read;

use greview_git::{pkt_line, PackAdapter, ReceivePack, Revision, UpdateRequest, FLUSH};
use greview_store::MemoryReviewStore;
use libfuzzer_sys::fuzz_target;

struct Accepting;

impl PackAdapter for Accepting {
    fn accept(&self, _commands: &[UpdateRequest], pack: &mut dyn Read) -> greview_git::Result<Vec<u8>> {
        std::io::copy(pack, &mut std::io::sink())?;
        pkt_line("unpack ok\n")
    }

    fn revisions(&self, _review_id: &str) -> greview_git::Result<Vec<Revision>> {
        Ok(Vec::new())
    }
}

fuzz_target!(|data: &[u8]| {
    let engine = ReceivePack::new(Accepting, MemoryReviewStore::new());
    let mut input = data;
    let mut output = Vec::new();

    let result = engine.run(&mut input, &mut output, "http://fuzz/");

    if result.is_ok() && !output.is_empty() {
        assert!(output.ends_with(FLUSH));
    }
});
