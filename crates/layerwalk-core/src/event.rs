//! Parser events.
//!
//! Decoders and the pipeline driver report malformed or suspicious layers as
//! [`ParserEvent`] values pushed into an [`EventSink`]. Emission is
//! synchronous and never performs I/O inside the core; what happens to an
//! event afterwards is up to the sink.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::protocol_id::ProtocolId;

/// How much an event matters to the packet that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Anomaly,
    AbortWorthy,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Anomaly => "anomaly",
            Severity::AbortWorthy => "abort-worthy",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TransBridgeTruncated,
    VlanTruncated,
    ArpTruncated,
    ArpBadAddressLength,
    PppoeTruncated,
    PppoeBadVersion,
    MplsTruncated,
    /// Bottom-of-stack label from the reserved range with no defined payload.
    MplsReservedLabel,
    Ipv4Truncated,
    Ipv4BadVersion,
    Ipv4BadHeaderLength,
    Ipv6Truncated,
    Ipv6BadVersion,
    Ipv6ExtTruncated,
    Ipv6ExtBadLength,
    GreTruncated,
    GreBadVersion,
    GreReservedFlags,
    UdpTruncated,
    UdpBadLength,
    TcpTruncated,
    TcpBadDataOffset,
    Icmp4Truncated,
    Icmp6Truncated,
    /// Layer budget of one pipeline invocation used up.
    DepthExceeded,
    /// A decoder reported success with an impossible layer length.
    InternalLengthViolation,
    /// Embedded decode requested past the nesting limit.
    EmbedNestingLimit,
}

impl EventKind {
    pub fn severity(self) -> Severity {
        match self {
            EventKind::DepthExceeded | EventKind::MplsReservedLabel => Severity::Anomaly,
            EventKind::EmbedNestingLimit => Severity::Info,
            _ => Severity::AbortWorthy,
        }
    }

    /// Stable identifier used in reports.
    pub fn code(self) -> &'static str {
        match self {
            EventKind::TransBridgeTruncated => "LW-TRANS-BRIDGE-TRUNCATED",
            EventKind::VlanTruncated => "LW-VLAN-TRUNCATED",
            EventKind::ArpTruncated => "LW-ARP-TRUNCATED",
            EventKind::ArpBadAddressLength => "LW-ARP-BAD-ADDR-LEN",
            EventKind::PppoeTruncated => "LW-PPPOE-TRUNCATED",
            EventKind::PppoeBadVersion => "LW-PPPOE-BAD-VERSION",
            EventKind::MplsTruncated => "LW-MPLS-TRUNCATED",
            EventKind::MplsReservedLabel => "LW-MPLS-RESERVED-LABEL",
            EventKind::Ipv4Truncated => "LW-IPV4-TRUNCATED",
            EventKind::Ipv4BadVersion => "LW-IPV4-BAD-VERSION",
            EventKind::Ipv4BadHeaderLength => "LW-IPV4-BAD-HLEN",
            EventKind::Ipv6Truncated => "LW-IPV6-TRUNCATED",
            EventKind::Ipv6BadVersion => "LW-IPV6-BAD-VERSION",
            EventKind::Ipv6ExtTruncated => "LW-IPV6-EXT-TRUNCATED",
            EventKind::Ipv6ExtBadLength => "LW-IPV6-EXT-BAD-LENGTH",
            EventKind::GreTruncated => "LW-GRE-TRUNCATED",
            EventKind::GreBadVersion => "LW-GRE-BAD-VERSION",
            EventKind::GreReservedFlags => "LW-GRE-RESERVED-FLAGS",
            EventKind::UdpTruncated => "LW-UDP-TRUNCATED",
            EventKind::UdpBadLength => "LW-UDP-BAD-LENGTH",
            EventKind::TcpTruncated => "LW-TCP-TRUNCATED",
            EventKind::TcpBadDataOffset => "LW-TCP-BAD-DATA-OFFSET",
            EventKind::Icmp4Truncated => "LW-ICMP4-TRUNCATED",
            EventKind::Icmp6Truncated => "LW-ICMP6-TRUNCATED",
            EventKind::DepthExceeded => "LW-DEPTH-EXCEEDED",
            EventKind::InternalLengthViolation => "LW-INTERNAL-LENGTH",
            EventKind::EmbedNestingLimit => "LW-EMBED-NESTING",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            EventKind::TransBridgeTruncated => "truncated bridging header",
            EventKind::VlanTruncated => "truncated 802.1Q tag",
            EventKind::ArpTruncated => "truncated ARP packet",
            EventKind::ArpBadAddressLength => "ARP address length is zero",
            EventKind::PppoeTruncated => "truncated PPPoE session header",
            EventKind::PppoeBadVersion => "unsupported PPPoE version/type",
            EventKind::MplsTruncated => "truncated MPLS label stack entry",
            EventKind::MplsReservedLabel => "reserved MPLS label at bottom of stack",
            EventKind::Ipv4Truncated => "truncated IPv4 header",
            EventKind::Ipv4BadVersion => "IPv4 header with wrong version",
            EventKind::Ipv4BadHeaderLength => "IPv4 header length invalid",
            EventKind::Ipv6Truncated => "truncated IPv6 header",
            EventKind::Ipv6BadVersion => "IPv6 header with wrong version",
            EventKind::Ipv6ExtTruncated => "truncated IPv6 extension header",
            EventKind::Ipv6ExtBadLength => "IPv6 extension header length invalid",
            EventKind::GreTruncated => "truncated GRE header",
            EventKind::GreBadVersion => "unsupported GRE version",
            EventKind::GreReservedFlags => "GRE reserved flags set",
            EventKind::UdpTruncated => "truncated UDP header",
            EventKind::UdpBadLength => "UDP length smaller than header",
            EventKind::TcpTruncated => "truncated TCP header",
            EventKind::TcpBadDataOffset => "TCP data offset below minimum",
            EventKind::Icmp4Truncated => "truncated ICMPv4 header",
            EventKind::Icmp6Truncated => "truncated ICMPv6 header",
            EventKind::DepthExceeded => "decode depth limit exceeded",
            EventKind::InternalLengthViolation => {
                "decoder reported success with an invalid layer length"
            }
            EventKind::EmbedNestingLimit => "embedded decode nesting limit reached",
        }
    }

    /// Whether the event indicates a defect in a decoder rather than
    /// something a sender can trigger.
    pub fn is_internal(self) -> bool {
        matches!(self, EventKind::InternalLengthViolation)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One diagnostic produced while decoding a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserEvent {
    pub kind: EventKind,
    pub severity: Severity,
    /// Identity of the packet being decoded.
    pub packet_id: u64,
    /// Protocol being decoded when the event fired.
    pub protocol: ProtocolId,
    /// Zero-based layer index within its invocation.
    pub layer: usize,
    /// Embedded-decode nesting level, 0 for the outer packet.
    pub nesting: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_len: Option<usize>,
}

impl fmt::Display for ParserEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packet {} layer {} {}: {} [{}]",
            self.packet_id,
            self.layer,
            self.protocol,
            self.kind.message(),
            self.kind.code()
        )?;
        if let (Some(expected), Some(actual)) = (self.expected_len, self.actual_len) {
            write!(f, " (expected {expected}, got {actual})")?;
        }
        Ok(())
    }
}

/// Receiver for parser events.
pub trait EventSink {
    fn emit(&mut self, event: ParserEvent);
}

impl EventSink for Vec<ParserEvent> {
    fn emit(&mut self, event: ParserEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: ParserEvent) {
        (**self).emit(event);
    }
}

/// Counts events per severity without keeping them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingSink {
    pub info: usize,
    pub anomaly: usize,
    pub abort_worthy: usize,
}

impl CountingSink {
    pub fn total(&self) -> usize {
        self.info + self.anomaly + self.abort_worthy
    }
}

impl EventSink for CountingSink {
    fn emit(&mut self, event: ParserEvent) {
        match event.severity {
            Severity::Info => self.info += 1,
            Severity::Anomaly => self.anomaly += 1,
            Severity::AbortWorthy => self.abort_worthy += 1,
        }
    }
}

/// Forwards events to `tracing`, at a level derived from severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: ParserEvent) {
        let code = event.kind.code();
        if event.kind.is_internal() {
            error!(packet = event.packet_id, code, "{event}");
            return;
        }
        match event.severity {
            Severity::Info => debug!(packet = event.packet_id, code, "{event}"),
            Severity::Anomaly => info!(packet = event.packet_id, code, "{event}"),
            Severity::AbortWorthy => warn!(packet = event.packet_id, code, "{event}"),
        }
    }
}
