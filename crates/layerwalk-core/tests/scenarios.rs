use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use etherparse::PacketBuilder;
use layerwalk_core::codecs::link::trans_bridge;
use layerwalk_core::{
    DecodePipeline, DecodeStatus, DecoderRegistry, EventKind, ParserEvent, PipelineConfig,
    ProtoFlags, ProtocolId, Severity, Termination,
};

fn builtin(config: PipelineConfig) -> DecodePipeline {
    let registry = Arc::new(DecoderRegistry::builtin().unwrap());
    DecodePipeline::new(registry, config).unwrap()
}

fn ethernet(ethertype: u16) -> Vec<u8> {
    let mut bytes = vec![0x02, 0, 0, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 0x02];
    bytes.extend_from_slice(&ethertype.to_be_bytes());
    bytes
}

/// Minimal IPv4 header; the checksum is left at zero.
fn ipv4(protocol: u8, payload_len: usize) -> Vec<u8> {
    let total = u16::try_from(20 + payload_len).unwrap();
    let mut bytes = vec![0x45, 0];
    bytes.extend_from_slice(&total.to_be_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0, 64, protocol, 0, 0]);
    bytes.extend_from_slice(&[10, 0, 0, 1, 10, 0, 0, 2]);
    bytes
}

#[test]
fn bridged_ethernet_stops_at_unregistered_ipv4() {
    let registry = Arc::new(DecoderRegistry::from_apis(&[trans_bridge::API]).unwrap());
    let pipeline = DecodePipeline::new(registry, PipelineConfig::default()).unwrap();

    let mut frame = ethernet(0x6558);
    frame.extend(ethernet(0x0800));
    frame.resize(32, 0);

    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(1, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);
    assert_eq!(decoded.summary.layer_count, 2);
    assert!(decoded.summary.flags.contains(ProtoFlags::ETH));
    assert_eq!(decoded.summary.final_protocol, ProtocolId::ETHERTYPE_IPV4);
    assert_eq!(decoded.summary.termination, Termination::NoDecoderForProtocol);
    assert_eq!(decoded.summary.consumed, 28);
    assert_eq!(decoded.output.status, DecodeStatus::Complete);
    assert!(events.is_empty());
}

#[test]
fn thirteen_byte_frame_fails_with_one_event() {
    let pipeline = builtin(PipelineConfig::default());
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(
        2,
        &[0u8; 13],
        ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING,
        &mut events,
    );
    assert_eq!(decoded.summary.termination, Termination::DecodeFailed);
    assert_eq!(decoded.summary.layer_count, 0);
    assert!(decoded.summary.flags.is_empty());
    assert!(decoded.output.ethernet.is_none());
    assert!(decoded.output.layers.is_empty());
    assert_eq!(decoded.output.status, DecodeStatus::Partial);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::TransBridgeTruncated);
    assert_eq!(events[0].severity, Severity::AbortWorthy);
    assert_eq!(events[0].packet_id, 2);
    assert_eq!(events[0].expected_len, Some(14));
    assert_eq!(events[0].actual_len, Some(13));
}

#[test]
fn ethernet_ipv4_udp_frame() {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
        .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 32)
        .udp(5353, 5353);
    let payload = [1u8, 2, 3, 4, 5];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();

    let pipeline = builtin(PipelineConfig::default());
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(3, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);

    assert_eq!(decoded.summary.termination, Termination::SentinelReached);
    assert_eq!(decoded.summary.layer_count, 3);
    assert_eq!(decoded.summary.consumed, 42);
    assert!(
        decoded
            .summary
            .flags
            .contains(ProtoFlags::ETH | ProtoFlags::IP4 | ProtoFlags::UDP)
    );
    let ip = decoded.output.ip.unwrap();
    assert_eq!(ip.source, IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)));
    assert_eq!(ip.ttl, 32);
    let ports = decoded.output.transport.unwrap();
    assert_eq!((ports.source_port, ports.destination_port), (5353, 5353));
    let decoders: Vec<_> = decoded.output.layers.iter().map(|l| l.decoder).collect();
    assert_eq!(decoders, ["trans_bridge", "ipv4", "udp"]);
    assert!(events.is_empty());
}

#[test]
fn ethernet_vlan_ipv6_tcp_frame() {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
        .single_vlan(etherparse::VlanId::try_new(100).unwrap())
        .ipv6([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1], [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2], 64)
        .tcp(443, 51000, 7, 1024);
    let payload = [0u8; 3];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();

    let pipeline = builtin(PipelineConfig::default());
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(4, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);

    assert_eq!(decoded.summary.termination, Termination::SentinelReached);
    assert_eq!(decoded.output.vlan_ids, vec![100]);
    let decoders: Vec<_> = decoded.output.layers.iter().map(|l| l.decoder).collect();
    assert_eq!(decoders, ["trans_bridge", "vlan", "ipv6", "tcp"]);
    assert_eq!(decoded.output.transport.unwrap().protocol, 6);
    assert!(
        decoded
            .summary
            .flags
            .contains(ProtoFlags::VLAN | ProtoFlags::IP6 | ProtoFlags::TCP)
    );
    assert!(events.is_empty());
}

#[test]
fn gre_tunnel_bomb_hits_depth_guard() {
    let mut frame = ethernet(0x0800);
    for _ in 0..20 {
        frame.extend(ipv4(47, 4 + 14));
        frame.extend_from_slice(&[0, 0, 0x65, 0x58]);
        frame.extend(ethernet(0x0800));
    }

    let pipeline = builtin(PipelineConfig::default());
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(5, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);

    assert_eq!(decoded.summary.termination, Termination::DepthExceeded);
    assert_eq!(decoded.summary.layer_count, 32);
    assert_eq!(decoded.output.status, DecodeStatus::Suspicious);
    assert!(
        decoded
            .summary
            .flags
            .contains(ProtoFlags::ETH | ProtoFlags::IP4 | ProtoFlags::GRE)
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::DepthExceeded);
    assert_eq!(events[0].severity, Severity::Anomaly);
}

#[test]
fn stacked_vlan_tags_hit_depth_guard() {
    let mut frame = ethernet(0x8100);
    for _ in 0..40 {
        frame.extend_from_slice(&[0x00, 0x0a, 0x81, 0x00]);
    }

    let pipeline = builtin(PipelineConfig::default().with_max_decode_depth(8));
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(6, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);
    assert_eq!(decoded.summary.termination, Termination::DepthExceeded);
    assert_eq!(decoded.summary.layer_count, 8);
    assert_eq!(decoded.output.vlan_ids.len(), 7);
    assert_eq!(events.len(), 1);
}

fn icmp_unreachable(quoted: &[u8]) -> Vec<u8> {
    let mut frame = ethernet(0x0800);
    frame.extend(ipv4(1, 8 + quoted.len()));
    frame.extend_from_slice(&[3, 1, 0, 0, 0, 0, 0, 0]);
    frame.extend_from_slice(quoted);
    frame
}

#[test]
fn icmp_error_quote_is_decoded_separately() {
    let mut quoted = ipv4(17, 8);
    quoted.extend_from_slice(&[0x9c, 0x40, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
    let frame = icmp_unreachable(&quoted);

    let pipeline = builtin(PipelineConfig::default().with_max_decode_depth(4));
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(7, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);

    assert_eq!(decoded.summary.termination, Termination::SentinelReached);
    assert_eq!(decoded.summary.layer_count, 3);
    assert!(decoded.summary.flags.contains(ProtoFlags::ICMP4));
    assert!(!decoded.summary.flags.contains(ProtoFlags::UDP));

    let embedded = decoded.output.embedded.as_ref().unwrap();
    assert_eq!(embedded.entry, ProtocolId::IP_EMBEDDED_IN_ICMP4);
    assert_eq!(embedded.offset, 42);
    assert_eq!(embedded.summary.layer_count, 2);
    assert_eq!(embedded.summary.termination, Termination::SentinelReached);
    assert!(
        embedded
            .summary
            .flags
            .contains(ProtoFlags::IP4 | ProtoFlags::UDP)
    );
    assert!(!embedded.summary.flags.contains(ProtoFlags::ETH));
    assert_eq!(embedded.output.layers[0].offset, 0);
    assert_eq!(embedded.output.transport.unwrap().destination_port, 53);
    assert!(events.is_empty());
}

#[test]
fn embedded_failures_carry_nesting_level() {
    let frame = icmp_unreachable(&[0x45, 0, 0]);
    let pipeline = builtin(PipelineConfig::default());
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(8, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);

    assert_eq!(decoded.summary.termination, Termination::SentinelReached);
    assert_eq!(decoded.output.status, DecodeStatus::Complete);
    assert_eq!(decoded.summary.events, 0);
    let embedded = decoded.output.embedded.as_ref().unwrap();
    assert_eq!(embedded.summary.termination, Termination::DecodeFailed);
    assert_eq!(embedded.output.status, DecodeStatus::Partial);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Ipv4Truncated);
    assert_eq!(events[0].nesting, 1);
}

#[test]
fn nested_icmp_quotes_stop_at_nesting_limit() {
    let mut innermost = ipv4(1, 8);
    innermost.extend_from_slice(&[8, 0, 0, 0, 0, 1, 0, 1]);
    let mut middle = ipv4(1, 8 + innermost.len());
    middle.extend_from_slice(&[11, 0, 0, 0, 0, 0, 0, 0]);
    middle.extend(innermost);
    let frame = icmp_unreachable(&middle);

    let pipeline = builtin(PipelineConfig::default());
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(9, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);

    let embedded = decoded.output.embedded.as_ref().unwrap();
    assert!(embedded.output.embedded.is_none());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::EmbedNestingLimit);
    assert_eq!(events[0].severity, Severity::Info);
    assert_eq!(events[0].nesting, 1);
}

#[test]
fn embedded_decoding_can_be_disabled() {
    let mut quoted = ipv4(17, 8);
    quoted.extend_from_slice(&[0; 8]);
    let frame = icmp_unreachable(&quoted);

    let config = PipelineConfig {
        decode_embedded: false,
        ..PipelineConfig::default()
    };
    let pipeline = builtin(config);
    let mut events: Vec<ParserEvent> = Vec::new();
    let decoded = pipeline.decode(10, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut events);
    assert!(decoded.output.embedded.is_none());
    assert_eq!(decoded.summary.layer_count, 3);
}

#[test]
fn same_frame_decodes_identically() {
    let mut quoted = ipv4(17, 8);
    quoted.extend_from_slice(&[0; 8]);
    let frame = icmp_unreachable(&quoted);
    let pipeline = builtin(PipelineConfig::default());

    let mut first_events: Vec<ParserEvent> = Vec::new();
    let mut second_events: Vec<ParserEvent> = Vec::new();
    let first = pipeline.decode(11, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut first_events);
    let second = pipeline.decode(11, &frame, ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING, &mut second_events);
    assert_eq!(first, second);
    assert_eq!(first_events, second_events);
}
