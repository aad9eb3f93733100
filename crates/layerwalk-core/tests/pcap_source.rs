use std::fs;
use std::path::Path;

use etherparse::PacketBuilder;
use layerwalk_core::{
    AnalysisOptions, PacketSource, PcapFileSource, ProtocolId, SourceError, decode_pcap_file,
};
use pcap_parser::Linktype;
use tempfile::TempDir;

fn udp_frame(port: u16) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
        .ipv4([10, 1, 0, 1], [10, 1, 0, 2], 64)
        .udp(port, 9);
    let mut frame = Vec::with_capacity(builder.size(0));
    builder.write(&mut frame, &[]).unwrap();
    frame
}

/// Legacy little-endian PCAP, microsecond timestamps.
fn write_pcap(path: &Path, linktype: u32, frames: &[(u32, Vec<u8>)]) {
    let frames: Vec<_> = frames
        .iter()
        .map(|(ts_sec, frame)| (*ts_sec, 250_000, frame.clone()))
        .collect();
    write_pcap_with_magic(path, 0xa1b2_c3d4, linktype, &frames);
}

fn write_pcap_with_magic(path: &Path, magic: u32, linktype: u32, frames: &[(u32, u32, Vec<u8>)]) {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&magic.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    bytes.extend_from_slice(&[0; 8]);
    bytes.extend_from_slice(&65535u32.to_le_bytes());
    bytes.extend_from_slice(&linktype.to_le_bytes());
    for (ts_sec, ts_fraction, frame) in frames {
        let len = u32::try_from(frame.len()).unwrap();
        bytes.extend_from_slice(&ts_sec.to_le_bytes());
        bytes.extend_from_slice(&ts_fraction.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(frame);
    }
    fs::write(path, bytes).unwrap();
}

#[test]
fn legacy_pcap_yields_frames_in_order() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("two.pcap");
    write_pcap(&path, 1, &[(100, udp_frame(1000)), (101, udp_frame(1001))]);

    let mut source = PcapFileSource::open(&path).unwrap();
    let first = source.next_packet().unwrap().unwrap();
    assert_eq!(first.linktype, Linktype::ETHERNET);
    assert_eq!(first.data, udp_frame(1000));
    assert!((first.ts.unwrap() - 100.25).abs() < 1e-9);
    assert_eq!(
        first.entry_protocol(),
        Some(ProtocolId::ETHERTYPE_TRANS_ETHER_BRIDGING)
    );
    assert_eq!(source.next_packet().unwrap().unwrap().data, udp_frame(1001));
    assert!(source.next_packet().unwrap().is_none());
}

#[test]
fn raw_ip_linktype_enters_at_ip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("raw.pcap");
    let ip_only = udp_frame(2000)[14..].to_vec();
    write_pcap(&path, 101, &[(5, ip_only)]);

    let mut source = PcapFileSource::open(&path).unwrap();
    let packet = source.next_packet().unwrap().unwrap();
    assert_eq!(packet.linktype, Linktype::RAW);
    assert_eq!(packet.entry_protocol(), Some(ProtocolId::ETHERTYPE_IPV4));
}

#[test]
fn nanosecond_pcap_scales_fraction() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nanos.pcap");
    write_pcap_with_magic(&path, 0xa1b2_3c4d, 1, &[(100, 250_000_000, udp_frame(3000))]);

    let mut source = PcapFileSource::open(&path).unwrap();
    let packet = source.next_packet().unwrap().unwrap();
    assert!((packet.ts.unwrap() - 100.25).abs() < 1e-9);

    let report = decode_pcap_file(&path, &AnalysisOptions::default()).unwrap();
    let summary = report.capture_summary.unwrap();
    assert_eq!(summary.time_start.as_deref(), Some("1970-01-01T00:01:40.25Z"));
}

#[test]
fn truncated_header_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("short.pcapng");
    fs::write(&path, [0x0a, 0x0d, 0x0d]).unwrap();
    let err = match PcapFileSource::open(&path) {
        Ok(_) => panic!("expected truncated file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}

#[test]
fn capture_report_covers_every_packet() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("mixed.pcap");
    write_pcap(
        &path,
        1,
        &[(10, udp_frame(53)), (11, vec![0u8; 9]), (12, udp_frame(54))],
    );

    let options = AnalysisOptions {
        include_packets: true,
        ..AnalysisOptions::default()
    };
    let report = decode_pcap_file(&path, &options).unwrap();
    let summary = report.capture_summary.as_ref().unwrap();
    assert_eq!(summary.packets_total, 3);
    assert_eq!(summary.packets_decoded, 3);
    assert_eq!(summary.time_start.as_deref(), Some("1970-01-01T00:00:10.25Z"));
    assert_eq!(report.input.path, path.display().to_string());
    assert_eq!(report.decode.terminations.get("sentinel_reached"), Some(&2));
    assert_eq!(report.decode.terminations.get("decode_failed"), Some(&1));
    assert_eq!(report.decode.protocols.get("udp"), Some(&2));
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].examples, vec![2]);
    assert_eq!(report.packets.len(), 3);
    assert_eq!(report.packets[1].status, "partial");
}
