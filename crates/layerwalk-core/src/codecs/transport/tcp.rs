use etherparse::TcpHeaderSlice;

use crate::codecs::error::Violation;
use crate::codecs::layout;
use crate::codecs::reader::ByteReader;
use crate::context::{DecodeContext, DecodeOutput, TransportPorts};
use crate::decoder::{DECODER_API_VERSION, Decoder, DecoderApi, RawView};
use crate::event::EventKind;
use crate::flags::ProtoFlags;
use crate::protocol_id::ProtocolId;

pub const API: DecoderApi = DecoderApi {
    name: "tcp",
    help: "support for transmission control protocol",
    version: DECODER_API_VERSION,
    ctor,
};

fn ctor() -> Box<dyn Decoder> {
    Box::new(TcpDecoder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpSummary {
    pub source_port: u16,
    pub destination_port: u16,
    pub header_len: usize,
}

pub fn parse_tcp(bytes: &[u8]) -> Result<TcpSummary, Violation> {
    let reader = ByteReader::new(bytes);
    reader
        .require_len(layout::TCP_MIN_HEADER_LEN)
        .map_err(Violation::truncated(EventKind::TcpTruncated))?;
    let data_offset = reader
        .read_u8(layout::TCP_DATA_OFFSET_OFFSET)
        .map_err(Violation::truncated(EventKind::TcpTruncated))?
        >> 4;
    let header_len = usize::from(data_offset) * 4;
    if header_len < layout::TCP_MIN_HEADER_LEN {
        return Err(Violation::with_lengths(
            EventKind::TcpBadDataOffset,
            layout::TCP_MIN_HEADER_LEN,
            header_len,
        ));
    }
    reader
        .require_len(header_len)
        .map_err(Violation::truncated(EventKind::TcpTruncated))?;

    let header =
        TcpHeaderSlice::from_slice(bytes).map_err(|_| Violation::new(EventKind::TcpTruncated))?;
    Ok(TcpSummary {
        source_port: header.source_port(),
        destination_port: header.destination_port(),
        header_len: header.slice().len(),
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDecoder;

impl Decoder for TcpDecoder {
    fn name(&self) -> &'static str {
        API.name
    }

    fn help(&self) -> &'static str {
        API.help
    }

    fn protocol_ids(&self) -> &[ProtocolId] {
        &[ProtocolId::TCP]
    }

    fn decode(&self, view: RawView<'_>, ctx: &mut DecodeContext, out: &mut DecodeOutput) -> bool {
        let header = match parse_tcp(view.bytes()) {
            Ok(header) => header,
            Err(violation) => return violation.report(ctx),
        };

        ctx.mark(ProtoFlags::TCP);
        ctx.layer_length = header.header_len;
        ctx.next_protocol_id = ProtocolId::FINISHED_DECODE;
        out.transport = Some(TransportPorts {
            protocol: ProtocolId::TCP.value() as u8,
            source_port: header.source_port,
            destination_port: header.destination_port,
        });
        true
    }
}
