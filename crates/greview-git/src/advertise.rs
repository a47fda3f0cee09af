//! Ref advertisement for smart HTTP service discovery
//! (`GET /info/refs?service=...`).

use crate::capabilities::{AGENT_PREFIX, RECEIVE_PACK_CAPABILITIES};
use crate::object::{ObjectId, ZERO_ID};
use crate::pktline::PktLineWriter;
use crate::Result;
use std::collections::BTreeSet;
use std::io::Write;

/// Name of the receive-pack service.
pub const RECEIVE_PACK_SERVICE: &str = "git-receive-pack";

const AGENT_NAME: &str = "greview";

/// Content type of a service advertisement.
pub fn advertisement_content_type(service: &str) -> String {
    format!("application/x-{service}-advertisement")
}

/// Content type of a service result.
pub fn result_content_type(service: &str) -> String {
    format!("application/x-{service}-result")
}

/// The `agent=` token identifying this server.
pub fn agent() -> String {
    format!("{AGENT_PREFIX}{AGENT_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

/// Capabilities advertised for `service`, followed by the agent token.
pub fn service_capabilities(service: &str) -> String {
    let mut tokens: Vec<String> = match service {
        RECEIVE_PACK_SERVICE => RECEIVE_PACK_CAPABILITIES.iter().map(|t| t.to_string()).collect(),
        _ => Vec::new(),
    };
    tokens.push(agent());
    tokens.join(" ")
}

/// Writes the advertisement body for `service`.
///
/// Refs are advertised once per distinct target id, in ascending id order,
/// under anonymous names. With no refs a `capabilities^{}` placeholder line
/// carries the capabilities instead.
pub fn advertise_refs<W: Write>(writer: &mut W, service: &str, refs: &[ObjectId]) -> Result<()> {
    let mut pkt_writer = PktLineWriter::new(writer);
    let capabilities = service_capabilities(service);

    pkt_writer.write_line(&format!("# service={service}"))?;
    pkt_writer.flush_pkt()?;

    let ids: BTreeSet<&ObjectId> = refs.iter().collect();
    let mut first = true;
    for id in ids {
        if first {
            pkt_writer.write_line(&format!("{id} refs/anonymous/{id}\0{capabilities}"))?;
            first = false;
        } else {
            pkt_writer.write_line(&format!("{id} refs/anonymous/{id}"))?;
        }
    }

    if first {
        pkt_writer.write_line(&format!("{ZERO_ID} capabilities^{{}}\0{capabilities}"))?;
    }

    pkt_writer.flush_pkt()?;
    pkt_writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pktline::{PktLine, PktLineReader};
    use std::io::Cursor;

    fn lines(output: Vec<u8>) -> Vec<PktLine> {
        let mut reader = PktLineReader::new(Cursor::new(output));
        let mut lines = Vec::new();
        while let Some(pkt) = reader.read().unwrap() {
            lines.push(pkt);
        }
        lines
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            advertisement_content_type(RECEIVE_PACK_SERVICE),
            "application/x-git-receive-pack-advertisement"
        );
        assert_eq!(
            result_content_type(RECEIVE_PACK_SERVICE),
            "application/x-git-receive-pack-result"
        );
    }

    #[test]
    fn test_capabilities_end_with_agent() {
        let caps = service_capabilities(RECEIVE_PACK_SERVICE);
        assert!(caps.starts_with("atomic report-status side-band-64k agent=greview/"));
        assert_eq!(service_capabilities("git-upload-pack"), agent());
    }

    #[test]
    fn test_empty_advertisement() {
        let mut output = Vec::new();
        advertise_refs(&mut output, RECEIVE_PACK_SERVICE, &[]).unwrap();

        let caps = service_capabilities(RECEIVE_PACK_SERVICE);
        let expected = vec![
            PktLine::from_string("# service=git-receive-pack\n"),
            PktLine::Flush,
            PktLine::from_string(&format!("{ZERO_ID} capabilities^{{}}\0{caps}\n")),
            PktLine::Flush,
        ];
        assert_eq!(lines(output.clone()), expected);
        assert!(output.starts_with(b"001f# service=git-receive-pack\n0000"));
        assert!(output.ends_with(b"0000"));
    }

    #[test]
    fn test_refs_sorted_and_deduplicated() {
        let high = ObjectId::from_hex("f000000000000000000000000000000000000000").unwrap();
        let low = ObjectId::from_hex("1000000000000000000000000000000000000000").unwrap();

        let mut output = Vec::new();
        advertise_refs(&mut output, RECEIVE_PACK_SERVICE, &[high, low, high]).unwrap();

        let lines = lines(output);
        assert_eq!(lines.len(), 5);

        let first = lines[2].as_text().unwrap();
        assert!(first.starts_with(&format!("{low} refs/anonymous/{low}\0atomic ")));

        let second = lines[3].as_text().unwrap();
        assert_eq!(second, format!("{high} refs/anonymous/{high}"));
        assert!(lines[4].is_flush());
    }
}
