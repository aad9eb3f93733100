//! Generic routing encapsulation (RFC 2784/2890) and the enhanced PPTP
//! variant (RFC 2637).

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "gre",
    help: "support for generic routing encapsulation",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(GreDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreHeader {
    pub version: u8,
    pub protocol_type: u16,
    pub header_len: usize,
    pub key: Option<u32>,
    pub sequence: Option<u32>,
}

pub fn parse_gre(bytes: &[u8]) -> Result<GreHeader, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::GRE_BASE_LEN)
        .map_err(Violation::truncated(EventKind::GreTruncated))?;
    let flags = reader
        .read_u16_be(0)
        .map_err(Violation::truncated(EventKind::GreTruncated))?;
    let protocol_type = reader
        .read_u16_be(layout::GRE_PROTO_OFFSET)
        .map_err(Violation::truncated(EventKind::GreTruncated))?;
    let version = (flags & layout::GRE_VERSION_MASK) as u8;
    let has = |bit: u16| flags & bit != 0;

    let (header_len, key_offset, sequence_offset) = match version {
        0 => {
            if flags & !layout::GRE_V0_ALLOWED != 0 {
                return Err(Violation::new(EventKind::GreReservedFlags));
            }
            let mut offset = layout::GRE_BASE_LEN;
            if has(layout::GRE_FLAG_CHECKSUM) {
                offset += layout::GRE_OPTION_LEN;
            }
            let key_offset = has(layout::GRE_FLAG_KEY).then_some(offset);
            if key_offset.is_some() {
                offset += layout::GRE_OPTION_LEN;
            }
            let sequence_offset = has(layout::GRE_FLAG_SEQUENCE).then_some(offset);
            if sequence_offset.is_some() {
                offset += layout::GRE_OPTION_LEN;
            }
            (offset, key_offset, sequence_offset)
        }
        1 => {
            // The key field carries payload length and call id and is mandatory.
            if flags & !layout::GRE_V1_ALLOWED != 0 || !has(layout::GRE_FLAG_KEY) {
                return Err(Violation::new(EventKind::GreReservedFlags));
            }
            let mut offset = layout::GRE_V1_BASE_LEN;
            let sequence_offset = has(layout::GRE_FLAG_SEQUENCE).then_some(offset);
            if sequence_offset.is_some() {
                offset += layout::GRE_OPTION_LEN;
            }
            if has(layout::GRE_FLAG_ACK) {
                offset += layout::GRE_OPTION_LEN;
            }
            (offset, Some(layout::GRE_BASE_LEN), sequence_offset)
        }
        _ => return Err(Violation::new(EventKind::GreBadVersion)),
    };

    reader
        .require_len(header_len)
        .map_err(Violation::truncated(EventKind::GreTruncated))?;
    let read_option = |offset: Option<usize>| -> Result<Option<u32>, Violation> {
        offset
            .map(|offset| reader.read_u32_be(offset))
            .transpose()
            .map_err(Violation::truncated(EventKind::GreTruncated))
    };

    Ok(GreHeader {
        version,
        protocol_type,
        header_len,
        key: read_option(key_offset)?,
        sequence: read_option(sequence_offset)?,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GreDecoder;

impl Decoder for GreDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::GRE]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_gre(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::GRE);
        ctx.layer_length = header.header_len;
        ctx.next_protocol_id = ProtocolId::from_ethertype(header.protocol_type);
        if header.key.is_some() {
            out.gre_key = header.key;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{GreDecoder, parse_gre};
    use crate::codecs::test_support::run;
    use crate::event::EventKind;
    use crate::flags::ProtoFlags;
    use crate::protocol_id::ProtocolId;

    #[test]
    fn plain_header_is_four_bytes() {
        let run = run(&GreDecoder, ProtocolId::GRE, &[0x00, 0x00, 0x65, 0x58, 0xff]);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 4);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING);
        assert!(run.ctx.flags().contains(ProtoFlags::GRE));
        assert_eq!(run.out.gre_key, None);
    }

    #[test]
    fn optional_fields_extend_header() {
        let bytes = [
            0xb0, 0x00, 0x08, 0x00, // C K S, IPv4
            0x00, 0x00, 0x00, 0x00, // checksum
            0x00, 0x00, 0x00, 0x2a, // key
            0x00, 0x00, 0x00, 0x07, // sequence
        ];
        let header = parse_gre(&bytes).unwrap();
        assert_eq!(header.header_len, 16);
        assert_eq!(header.key, Some(42));
        assert_eq!(header.sequence, Some(7));

        let run = run(&GreDecoder, ProtocolId::GRE, &bytes);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::ETHERTYPE_IPV4);
        assert_eq!(run.out.gre_key, Some(42));
    }

    #[test]
    fn enhanced_version_requires_key() {
        let bytes = [0x30, 0x81, 0x88, 0x0b, 0, 0x10, 0, 1, 0, 0, 0, 9, 0, 0, 0, 8];
        let header = parse_gre(&bytes).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.header_len, 16);
        assert_eq!(header.sequence, Some(9));

        let missing_key = [0x10, 0x01, 0x88, 0x0b, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = parse_gre(&missing_key).unwrap_err();
        assert_eq!(err.kind, EventKind::GreReservedFlags);
    }

    #[test]
    fn routing_bit_is_rejected() {
        let run = run(&GreDecoder, ProtocolId::GRE, &[0x40, 0x00, 0x08, 0x00, 0, 0, 0, 0]);
        assert!(!run.ok);
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].kind, EventKind::GreReservedFlags);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let run = run(&GreDecoder, ProtocolId::GRE, &[0x00, 0x02, 0x08, 0x00]);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::GreBadVersion);
    }

    #[test]
    fn missing_option_bytes_are_truncated() {
        let run = run(&GreDecoder, ProtocolId::GRE, &[0x20, 0x00, 0x08, 0x00, 0, 0]);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::GreTruncated);
        assert_eq!(run.events[0].expected_len, Some(8));
    }
}
