//! MPLS label stack entries (RFC 3032), one entry per layer.

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "mpls",
    help: "support for multiprotocol label switching",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(MplsDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MplsEntry {
    pub label: u32,
    pub traffic_class: u8,
    pub bottom_of_stack: bool,
    pub ttl: u8,
}

pub fn parse_mpls(bytes: &[u8]) -> Result<MplsEntry, Violation> {
    let reader = ByteReader::new(bytes);
    let entry = reader
        .read_u32_be(0)
        .map_err(Violation::truncated(EventKind::MplsTruncated))?;

    Ok(MplsEntry {
        label: entry >> layout::MPLS_LABEL_SHIFT,
        traffic_class: ((entry >> 9) & 0x07) as u8,
        bottom_of_stack: entry & layout::MPLS_BOS_MASK != 0,
        ttl: (entry & 0xff) as u8,
    })
}

/// Labels 4-6 and 8-12 are reserved with no payload semantics.
fn is_reserved_label(label: u32) -> bool {
    label <= layout::MPLS_LABEL_RESERVED_MAX
        && !matches!(label, 0..=3 | 7 | 13..=15)
}

/// Pick the payload protocol after the last label: explicit-null labels
/// name it, otherwise the first nibble is sniffed.
fn payload_protocol(label: u32, payload: &[u8]) -> ProtocolId {
    match label {
        layout::MPLS_LABEL_IPV4_NULL => ProtocolId::ETHERTYPE_IPV4,
        layout::MPLS_LABEL_IPV6_NULL => ProtocolId::ETHERTYPE_IPV6,
        _ => match payload.first().map(|byte| byte >> 4) {
            Some(4) => ProtocolId::ETHERTYPE_IPV4,
            Some(6) => ProtocolId::ETHERTYPE_IPV6,
            _ => ProtocolId::FINISHED_DECODE,
        },
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MplsDecoder;

impl Decoder for MplsDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[
            ProtocolId::ETHERTYPE_MPLS_UNICAST,
            ProtocolId::ETHERTYPE_MPLS_MULTICAST,
        ]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let entry = match parse_mpls(view.bytes()) {
            Ok(entry) => entry,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::MPLS);
        ctx.layer_length = layout::MPLS_ENTRY_LEN;
        out.mpls_labels.push(entry.label);

        if !entry.bottom_of_stack {
            ctx.next_protocol_id = ctx.protocol();
            return true;
        }
        if is_reserved_label(entry.label) {
            ctx.emit(EventKind::MplsReservedLabel);
        }
        let payload = view.bytes().get(layout::MPLS_ENTRY_LEN..).unwrap_or_default();
        ctx.next_protocol_id = payload_protocol(entry.label, payload);
        true
    }
}
