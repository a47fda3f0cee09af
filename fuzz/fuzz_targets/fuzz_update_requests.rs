//! Fuzz target for update-request parsing and capability negotiation.

#![no_main]

use greview_git::{CapabilitySet, UpdateRequests, RECEIVE_PACK_CAPABILITIES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    let mut capabilities = CapabilitySet::receive_pack();

    let Ok(requests) = UpdateRequests::parse(&mut input, &mut capabilities) else {
        return;
    };

    // Negotiation can only narrow the server's set.
    assert!(capabilities.len() <= RECEIVE_PACK_CAPABILITIES.len());
    for request in requests {
        let Ok(request) = request else {
            break;
        };
        assert!(!request.canonical_name().is_empty());
    }
});
