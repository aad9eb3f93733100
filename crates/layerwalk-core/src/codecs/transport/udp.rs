use etherparse::UdpHeaderSlice;

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput, TransportPorts};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "udp",
    help: "support for user datagram protocol",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(UdpDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpSummary {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
}

/// Validate a UDP header. A zero length field is accepted (IPv6 jumbograms).
pub fn parse_udp(bytes: &[u8]) -> Result<UdpSummary, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::UDP_HEADER_LEN)
        .map_err(Violation::truncated(EventKind::UdpTruncated))?;
    let length = reader
        .read_u16_be(layout::UDP_LENGTH_OFFSET)
        .map_err(Violation::truncated(EventKind::UdpTruncated))?;
    if length != 0 && usize::from(length) < layout::UDP_HEADER_LEN {
        return Err(Violation::with_lengths(
            EventKind::UdpBadLength,
            layout::UDP_HEADER_LEN,
            usize::from(length),
        ));
    }

    let header =
        UdpHeaderSlice::from_slice(bytes).map_err(|_| Violation::new(EventKind::UdpTruncated))?;
    Ok(UdpSummary {
        source_port: header.source_port(),
        destination_port: header.destination_port(),
        length,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UdpDecoder;

impl Decoder for UdpDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::UDP]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_udp(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::UDP);
        ctx.layer_length = layout::UDP_HEADER_LEN;
        ctx.next_protocol_id = ProtocolId::FINISHED_DECODE;
        out.transport = Some(TransportPorts {
            protocol: ProtocolId::UDP.value() as u8,
            source_port: header.source_port,
            destination_port: header.destination_port,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::UdpDecoder;
    use crate::codecs::test_support::run;
    use crate::event::EventKind;
    use crate::flags::ProtoFlags;
    use crate::protocol_id::ProtocolId;

    #[test]
    fn records_ports() {
        let bytes = [0x19, 0x36, 0x00, 0x35, 0x00, 0x0c, 0x00, 0x00, 1, 2, 3, 4];
        let run = run(&UdpDecoder, ProtocolId::UDP, &bytes);
        assert!(run.ok);
        assert_eq!(run.ctx.layer_length, 8);
        assert_eq!(run.ctx.next_protocol_id, ProtocolId::FINISHED_DECODE);
        assert!(run.ctx.flags().contains(ProtoFlags::UDP));
        let ports = run.out.transport.unwrap();
        assert_eq!(ports.source_port, 6454);
        assert_eq!(ports.destination_port, 53);
        assert_eq!(ports.protocol, 17);
    }

    #[test]
    fn length_below_header_is_rejected() {
        let bytes = [0, 1, 0, 2, 0x00, 0x04, 0, 0];
        let run = run(&UdpDecoder, ProtocolId::UDP, &bytes);
        assert!(!run.ok);
        assert_eq!(run.events[0].kind, EventKind::UdpBadLength);
        assert_eq!(run.events[0].actual_len, Some(4));
    }

    #[test]
    fn short_header_is_truncated() {
        let run = run(&UdpDecoder, ProtocolId::UDP, &[0, 1, 0, 2, 0, 8, 0]);
        assert!(!run.ok);
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].kind, EventKind::UdpTruncated);
    }
}
