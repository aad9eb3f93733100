use std::net::IpAddr;

use etherparse::Ipv4HeaderSlice;

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput, IpEndpoints};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "ipv4",
    help: "support for Internet protocol v4",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(Ipv4Decoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Summary {
    pub header_len: usize,
    pub source: std::net::Ipv4Addr,
    pub destination: std::net::Ipv4Addr,
    pub ttl: u8,
    pub protocol: u8,
    pub fragment_offset: u16,
    pub more_fragments: bool,
}

impl Ipv4Summary {
    pub fn is_fragment(&self) -> bool {
        self.fragment_offset != 0 || self.more_fragments
    }
}

/// Validate an IPv4 header.
///
/// Length, version and IHL are checked before the header is handed to
/// `etherparse`, so each shortfall maps to its own event.
pub fn parse_ipv4(bytes: &[u8]) -> Result<Ipv4Summary, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::IPV4_MIN_HEADER_LEN)
        .map_err(Violation::truncated(EventKind::Ipv4Truncated))?;
    let version_ihl = reader
        .read_u8(0)
        .map_err(Violation::truncated(EventKind::Ipv4Truncated))?;
    if version_ihl >> 4 != 4 {
        return Err(Violation::new(EventKind::Ipv4BadVersion));
    }
    let header_len = usize::from(version_ihl & 0x0f) * 4;
    if header_len < layout::IPV4_MIN_HEADER_LEN {
        return Err(Violation::with_lengths(
            EventKind::Ipv4BadHeaderLength,
            layout::IPV4_MIN_HEADER_LEN,
            header_len,
        ));
    }
    reader
        .require_len(header_len)
        .map_err(Violation::truncated(EventKind::Ipv4Truncated))?;

    let header = Ipv4HeaderSlice::from_slice(bytes)
        .map_err(|_| Violation::new(EventKind::Ipv4BadHeaderLength))?;

    Ok(Ipv4Summary {
        header_len: header.slice().len(),
        source: header.source_addr(),
        destination: header.destination_addr(),
        ttl: header.ttl(),
        protocol: header.protocol().0,
        fragment_offset: header.fragments_offset().value(),
        more_fragments: header.more_fragments(),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv4Decoder;

impl Decoder for Ipv4Decoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ETHERTYPE_IPV4, ProtocolId::IPIP]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_ipv4(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::IP4);
        ctx.layer_length = header.header_len;
        if header.is_fragment() {
            ctx.mark(ProtoFlags::FRAG);
            out.fragmented = true;
        }
        // Only the first fragment carries the upper-layer header.
        ctx.next_protocol_id = if header.fragment_offset == 0 {
            ProtocolId::from_ip_protocol(header.protocol)
        } else {
            ProtocolId::FINISHED_DECODE
        };
        out.ip = Some(IpEndpoints {
            source: IpAddr::V4(header.source),
            destination: IpAddr::V4(header.destination),
            ttl: header.ttl,
            transport_protocol: Some(header.protocol),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use etherparse::{IpNumber, Ipv4Header};

    use super::{Ipv4Decoder, parse_ipv4};
    use crate::codecs::test_support::run;
    use crate::event::EventKind;
    use crate::flags::ProtoFlags;
    use crate::protocol_id::ProtocolId;

    fn header(protocol: IpNumber) -> Vec<u8> {
        let header = Ipv4Header::new(8, 64, protocol, [10, 0, 0, 1], [10, 0, 0, 2]).unwrap();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        bytes
    }

    #[test]
    fn decodes_addresses_and_protocol() {
        let run = run(&Ipv4Decoder, ProtocolId::ETHERTYPE_IPV4, &header(IpNumber::UDP));
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 20);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::UDP);
        assert!(run.ctx.flags().contains(ProtoFlags::IP4));
        let ip = run.out.ip.unwrap();
        assert_eq!(ip.source, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(ip.ttl, 64);
        assert_eq!(ip.transport_protocol, Some(17));
        assert!(!run.out.fragmented);
    }

    #[test]
    fn non_initial_fragment_stops_dispatch() {
        let mut bytes = header(IpNumber::TCP);
        // offset 185 * 8, checksum is not verified
        bytes[6] = 0x00;
        bytes[7] = 0xb9;
        let run = run(&Ipv4Decoder, ProtocolId::ETHERTYPE_IPV4, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::FINISHED_DECODE);
        assert!(run.ctx.flags().contains(ProtoFlags::FRAG));
        assert!(run.out.fragmented);
    }

    #[test]
    fn first_fragment_still_dispatches() {
        let mut bytes = header(IpNumber::TCP);
        bytes[6] = 0x20;
        let parsed = parse_ipv4(&bytes).unwrap();
        assert!(parsed.is_fragment());
        let run = run(&Ipv4Decoder, ProtocolId::ETHERTYPE_IPV4, &bytes);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::TCP);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = header(IpNumber::UDP);
        bytes[0] = 0x65;
        let run = run(&Ipv4Decoder, ProtocolId::ETHERTYPE_IPV4, &bytes);
        assert!(!run.ok);
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].kind, EventKind::Ipv4BadVersion);
    }

    #[test]
    fn rejects_short_ihl() {
        let mut bytes = header(IpNumber::UDP);
        bytes[0] = 0x44;
        let run = run(&Ipv4Decoder, ProtocolId::ETHERTYPE_IPV4, &bytes);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::Ipv4BadHeaderLength);
    }

    #[test]
    fn options_beyond_buffer_are_truncated() {
        let mut bytes = header(IpNumber::UDP);
        bytes[0] = 0x4f;
        let run = run(&Ipv4Decoder, ProtocolId::ETHERTYPE_IPV4, &bytes[..28]);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::Ipv4Truncated);
        assert_eq!(run.events[0].expected_len, Some(60));
    }
}
