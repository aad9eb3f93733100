//! ICMPv4 and ICMPv6. Error messages quote the offending IP packet after the
//! fixed header; the decoders ask the driver to decode that quote as an
//! embedded packet.

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput, IcmpInfo};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const ICMP4_API: DecoderApi = DecoderApi {
    name: "icmp4",
    help: "support for Internet control message protocol v4",
    version: DECODER_API_VERSION,
    ctor: icmp4_ctor,
};

pub const ICMP6_API: DecoderApi = DecoderApi {
    name: "icmp6",
    help: "support for Internet control message protocol v6",
    version: DECODER_API_VERSION,
    ctor: icmp6_ctor,
};

fn icmp4_ctor() -> Box<dyn Decoder> {
    Box::new(Icmp4Decoder)
}

fn icmp6_ctor() -> Box<dyn Decoder> {
    Box::new(Icmp6Decoder)
}

/// Destination unreachable, source quench, redirect, time exceeded and
/// parameter problem.
pub fn is_icmp4_error(icmp_type: u8) -> bool {
    matches!(icmp_type, 3 | 4 | 5 | 11 | 12)
}

/// Destination unreachable, packet too big, time exceeded and parameter
/// problem.
pub fn is_icmp6_error(icmp_type: u8) -> bool {
    matches!(icmp_type, 1..=4)
}

fn read_type_code(reader: &ByteReader<'_>, kind: EventKind) -> Result<(u8, u8), Violation> {
    let icmp_type = reader.read_u8(0).map_err(Violation::truncated(kind))?;
    let code = reader.read_u8(1).map_err(Violation::truncated(kind))?;
    Ok((icmp_type, code))
}

fn record(ctx: &mut DecodeContext, out: &mut DecodeOutput, version: u8, icmp_type: u8, code: u8) {
    out.icmp = Some(IcmpInfo {
        version,
        icmp_type,
        code,
    });
    ctx.next_protocol_id = ProtocolId::FINISHED_DECODE;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Icmp4Decoder;

impl Decoder for Icmp4Decoder {
    fn name(&self) -> &'static str {
        ICMP4_API.name
    }

    fn help(&self) -> &'static str {
        ICMP4_API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ICMPV4]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let reader = view.reader();
        let parsed = reader
            .require_len(layout::ICMP_HEADER_LEN)
            .map_err(Violation::truncated(EventKind::Icmp4Truncated))
            .and_then(|()| read_type_code(&reader, EventKind::Icmp4Truncated));
        let (icmp_type, code) = match parsed {
            Ok(fields) => fields,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::ICMP4);
        ctx.layer_length = layout::ICMP_HEADER_LEN;
        record(ctx, out, 4, icmp_type, code);
        if is_icmp4_error(icmp_type) && reader.len() > layout::ICMP_HEADER_LEN {
            ctx.request_embedded(ProtocolId::IP_EMBEDDED_IN_ICMP4);
        }
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Icmp6Decoder;

impl Decoder for Icmp6Decoder {
    fn name(&self) -> &'static str {
        ICMP6_API.name
    }

    fn help(&self) -> &'static str {
        ICMP6_API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::ICMPV6]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let reader = view.reader();
        let parsed = reader
            .require_len(layout::ICMP6_MIN_LEN)
            .map_err(Violation::truncated(EventKind::Icmp6Truncated))
            .and_then(|()| read_type_code(&reader, EventKind::Icmp6Truncated));
        let (icmp_type, code) = match parsed {
            Ok(fields) => fields,
            Err(violation) => return violation.report(ctx),
        };

        let error = is_icmp6_error(icmp_type);
        if error {
            if let Err(err) = reader.require_len(layout::ICMP_HEADER_LEN) {
                return Violation::truncated(EventKind::Icmp6Truncated)(err).report(ctx);
            }
        }

        ctx.mark(ProtoFlags::ICMP6);
        ctx.layer_length = if reader.len() >= layout::ICMP_HEADER_LEN {
            layout::ICMP_HEADER_LEN
        } else {
            layout::ICMP6_MIN_LEN
        };
        record(ctx, out, 6, icmp_type, code);
        if error && reader.len() > layout::ICMP_HEADER_LEN {
            ctx.request_embedded(ProtocolId::IP_EMBEDDED_IN_ICMP6);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Icmp4Decoder, Icmp6Decoder};
    use crate::codecs::test_support::run;
    use crate::event::EventKind;
    use crate::flags::ProtoFlags;
    use crate::protocol_id::ProtocolId;

    #[test]
    fn echo_request_has_no_embedded_request() {
        let bytes = [8u8, 0, 0, 0, 0, 1, 0, 1, 0xaa, 0xbb];
        let mut run = run(&Icmp4Decoder, ProtocolId::ICMPV4, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 8);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::FINISHED_DECODE);
        assert!(run.ctx.flags().contains(ProtoFlags::ICMP4));
        assert_eq!(run.ctx.take_embedded_request(), None);
        let icmp = run.out.icmp.unwrap();
        assert_eq!((icmp.version, icmp.icmp_type), (4, 8));
    }

    #[test]
    fn unreachable_requests_embedded_ipv4() {
        let mut bytes = vec![3u8, 1, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&[0x45; 20]);
        let mut run = run(&Icmp4Decoder, ProtocolId::ICMPV4, &bytes);
        assert!(run.ok);
        assert_eq!(
            run.ctx.take_embedded_request(),
            Some(ProtocolId::IP_EMBEDDED_IN_ICMP4)
        );
    }

    #[test]
    fn error_without_quote_requests_nothing() {
        let bytes = [11u8, 0, 0, 0, 0, 0, 0, 0];
        let mut run = run(&Icmp4Decoder, ProtocolId::ICMPV4, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.take_embedded_request(), None);
    }

    #[test]
    fn short_icmp4_is_truncated() {
        let run = run(&Icmp4Decoder, ProtocolId::ICMPV4, &[3u8, 1, 0, 0]);
        assert!(!run.ok);
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].kind, EventKind::Icmp4Truncated);
    }

    #[test]
    fn icmp6_informational_accepts_four_bytes() {
        let run = run(&Icmp6Decoder, ProtocolId::ICMPV6, &[135u8, 0, 0, 0]);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 4);
        assert!(run.ctx.flags().contains(ProtoFlags::ICMP6));
    }

    #[test]
    fn icmp6_error_needs_full_header() {
        let run = run(&Icmp6Decoder, ProtocolId::ICMPV6, &[1u8, 4, 0, 0, 0, 0]);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::Icmp6Truncated);
        assert_eq!(run.events[0].expected_len, Some(8));
    }

    #[test]
    fn icmp6_packet_too_big_requests_embedded_ipv6() {
        let mut bytes = vec![2u8, 0, 0, 0, 0, 0, 0x05, 0xdc];
        bytes.extend_from_slice(&[0x60; 40]);
        let mut run = run(&Icmp6Decoder, ProtocolId::ICMPV6, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 8);
        assert_eq!(
            run.ctx.take_embedded_request(),
            Some(ProtocolId::IP_EMBEDDED_IN_ICMP6)
        );
    }
}
