//! IPv6 extension headers: options/routing/mobility share the
//! `(len + 1) * 8` layout; fragment and authentication have their own.

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::{ProtocolId, is_extension_header};

use super::next_after_header;

pub const API: DecoderApi = DecoderApi {
    name: "ipv6_ext",
    help: "support for IPv6 hop-by-hop, routing, destination option and mobility headers",
    version: DECODER_API_VERSION,
    ctor: ext_ctor,
};

pub const FRAG_API: DecoderApi = DecoderApi {
    name: "ipv6_frag",
    help: "support for IPv6 fragment headers",
    version: DECODER_API_VERSION,
    ctor: frag_ctor,
};

pub const AUTH_API: DecoderApi = DecoderApi {
    name: "ipv6_auth",
    help: "support for IP authentication headers",
    version: DECODER_API_VERSION,
    ctor: auth_ctor,
};

fn ext_ctor() -> Box<dyn Decoder> {
    Box::new(Ipv6ExtDecoder)
}

fn frag_ctor() -> Box<dyn Decoder> {
    Box::new(Ipv6FragDecoder)
}

fn auth_ctor() -> Box<dyn Decoder> {
    Box::new(AuthDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionHeader {
    pub next_header: u8,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub next_header: u8,
    pub offset: u16,
    pub more_fragments: bool,
    pub identification: u32,
}

pub fn parse_extension(bytes: &[u8]) -> Result<ExtensionHeader, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::IPV6_EXT_MIN_LEN)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let next_header = reader
        .read_u8(layout::IPV6_EXT_NEXT_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let units = reader
        .read_u8(layout::IPV6_EXT_LEN_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let length = (usize::from(units) + 1) * layout::IPV6_EXT_UNIT;
    reader
        .require_len(length)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    Ok(ExtensionHeader {
        next_header,
        length,
    })
}

pub fn parse_fragment(bytes: &[u8]) -> Result<FragmentHeader, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::IPV6_FRAG_HEADER_LEN)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let next_header = reader
        .read_u8(layout::IPV6_EXT_NEXT_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let field = reader
        .read_u16_be(layout::IPV6_FRAG_FIELD_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let identification = reader
        .read_u32_be(layout::IPV6_FRAG_ID_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    Ok(FragmentHeader {
        next_header,
        offset: (field & layout::IPV6_FRAG_OFFSET_MASK) >> 3,
        more_fragments: field & layout::IPV6_FRAG_MORE != 0,
        identification,
    })
}

/// Authentication header; its length field counts 4-byte words minus two.
pub fn parse_auth(bytes: &[u8]) -> Result<ExtensionHeader, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::IPV6_EXT_MIN_LEN)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let next_header = reader
        .read_u8(layout::IPV6_EXT_NEXT_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let words = reader
        .read_u8(layout::IPV6_EXT_LEN_OFFSET)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    let length = (usize::from(words) + 2) * layout::AUTH_UNIT;
    if length < layout::AUTH_MIN_LEN {
        return Err(Violation::with_lengths(
            EventKind::Ipv6ExtBadLength,
            layout::AUTH_MIN_LEN,
            length,
        ));
    }
    reader
        .require_len(length)
        .map_err(Violation::truncated(EventKind::Ipv6ExtTruncated))?;
    Ok(ExtensionHeader {
        next_header,
        length,
    })
}

fn note_transport(out: &mut DecodeOutput, next_header: u8) {
    if let Some(ip) = out.ip.as_mut() {
        if !is_extension_header(next_header) {
            ip.transport_protocol = Some(next_header);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv6ExtDecoder;

impl Decoder for Ipv6ExtDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[
            ProtocolId::HOPOPTS,
            ProtocolId::ROUTING,
            ProtocolId::DSTOPTS,
            ProtocolId::MOBILITY_HEADER,
        ]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_extension(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::IP6_EXT);
        ctx.layer_length = header.length;
        ctx.next_protocol_id = next_after_header(header.next_header);
        note_transport(out, header.next_header);
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv6FragDecoder;

impl Decoder for Ipv6FragDecoder {
    fn name(&self) -> &'static str {
        FRAG_API.name
    }

    fn help(&self) -> &'static str {
        FRAG_API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::FRAGMENT]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_fragment(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::IP6_EXT | ProtoFlags::FRAG);
        ctx.layer_length = layout::IPV6_FRAG_HEADER_LEN;
        out.fragmented = true;
        ctx.next_protocol_id = if header.offset == 0 {
            next_after_header(header.next_header)
        } else {
            ProtocolId::FINISHED_DECODE
        };
        note_transport(out, header.next_header);
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AuthDecoder;

impl Decoder for AuthDecoder {
    fn name(&self) -> &'static str {
        AUTH_API.name
    }

    fn help(&self) -> &'static str {
        AUTH_API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::AUTH]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_auth(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::AUTH);
        ctx.layer_length = header.length;
        ctx.next_protocol_id = next_after_header(header.next_header);
        note_transport(out, header.next_header);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthDecoder, Ipv6ExtDecoder, Ipv6FragDecoder, parse_fragment};
    use crate::codecs::test_support::run;
    use crate::event::EventKind;
    use crate::flags::ProtoFlags;
    use crate::protocol_id::ProtocolId;

    #[test]
    fn hop_by_hop_length_in_eight_byte_units() {
        let mut bytes = vec![6, 1];
        bytes.extend_from_slice(&[0u8; 14]);
        let run = run(&Ipv6ExtDecoder, ProtocolId::HOPOPTS, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 16);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::TCP);
        assert!(run.ctx.flags().contains(ProtoFlags::IP6_EXT));
    }

    #[test]
    fn declared_length_past_buffer_is_truncated() {
        let mut bytes = vec![17, 2];
        bytes.extend_from_slice(&[0u8; 14]);
        let run = run(&Ipv6ExtDecoder, ProtocolId::DSTOPTS, &bytes);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::Ipv6ExtTruncated);
        assert_eq!(run.events[0].expected_len, Some(24));
    }

    #[test]
    fn routing_header_to_no_next_header_finishes() {
        let bytes = [59u8, 0, 0, 0, 0, 0, 0, 0];
        let run = run(&Ipv6ExtDecoder, ProtocolId::ROUTING, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::FINISHED_DECODE);
    }

    #[test]
    fn fragment_fields() {
        let bytes = [17u8, 0, 0x00, 0x09, 0, 0, 0x12, 0x34];
        let header = parse_fragment(&bytes).unwrap();
        assert_eq!(header.offset, 1);
        assert!(header.more_fragments);
        assert_eq!(header.identification, 0x1234);
    }

    #[test]
    fn only_first_fragment_dispatches() {
        let first = [17u8, 0, 0x00, 0x01, 0, 0, 0, 1];
        let run_first = run(&Ipv6FragDecoder, ProtocolId::FRAGMENT, &first);
        assert!(run_first.ok);
        assert_eq!(run_first.ctx.next_protocol_id, ProtocolId::UDP);
        assert!(run_first.ctx.flags().contains(ProtoFlags::FRAG));
        assert!(run_first.out.fragmented);

        let later = [17u8, 0, 0x00, 0x08, 0, 0, 0, 1];
        let run_later = run(&Ipv6FragDecoder, ProtocolId::FRAGMENT, &later);
        assert!(run_later.ok);
        assert_eq!(run_later.ctx.next_protocol_id, ProtocolId::FINISHED_DECODE);
    }

    #[test]
    fn auth_length_in_four_byte_words() {
        let mut bytes = vec![6u8, 4];
        bytes.extend_from_slice(&[0u8; 22]);
        let run = run(&AuthDecoder, ProtocolId::AUTH, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 24);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::TCP);
        assert!(run.ctx.flags().contains(ProtoFlags::AUTH));
    }

    #[test]
    fn auth_zero_length_is_invalid() {
        let bytes = [6u8, 0, 0, 0, 0, 0, 0, 0];
        let run = run(&AuthDecoder, ProtocolId::AUTH, &bytes);
        assert!(!run.ok);
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].kind, EventKind::Ipv6ExtBadLength);
    }
}
