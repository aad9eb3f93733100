//! Protocol identifier space.
//!
//! Dispatch is keyed by a flat 16-bit namespace split into three disjoint
//! ranges:
//!
//! - `0x0000..=0x00FF`: IP protocol numbers
//! - `0x0100..=0x05FF`: internal sentinels with no wire representation
//! - `0x0600..=0xFFFF`: ethertypes
//!
//! Sentinels are never read off the wire. Decoders and the driver assign them
//! to express pseudo-states such as "decode finished" or "an IP header is
//! embedded in this ICMP error".

use std::fmt;

use serde::{Deserialize, Serialize};

const SENTINEL_FIRST: u16 = 0x0100;
const ETHERTYPE_FIRST: u16 = 0x0600;

/// A key selecting the decoder for the next layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub u16);

/// Which partition of the identifier space an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRange {
    IpProtocol,
    Sentinel,
    Ethertype,
}

impl ProtocolId {
    pub const HOPOPTS: Self = Self(0);
    pub const ICMPV4: Self = Self(1);
    pub const IPIP: Self = Self(4);
    pub const TCP: Self = Self(6);
    pub const UDP: Self = Self(17);
    pub const IPV6_IN_IP: Self = Self(41);
    pub const ROUTING: Self = Self(43);
    pub const FRAGMENT: Self = Self(44);
    pub const GRE: Self = Self(47);
    pub const ESP: Self = Self(50);
    pub const AUTH: Self = Self(51);
    pub const MOBILITY: Self = Self(55);
    pub const ICMPV6: Self = Self(58);
    pub const NONEXT: Self = Self(59);
    pub const DSTOPTS: Self = Self(60);
    pub const MOBILITY_HEADER: Self = Self(135);
    pub const RESERVED: Self = Self(255);

    /// Decoding completed; nothing follows.
    pub const FINISHED_DECODE: Self = Self(0x0100);
    pub const TEREDO: Self = Self(0x0101);
    pub const GTP: Self = Self(0x0102);
    pub const IP_EMBEDDED_IN_ICMP4: Self = Self(0x0103);
    pub const IP_EMBEDDED_IN_ICMP6: Self = Self(0x0104);
    /// 802.3 frame whose type field is a length.
    pub const ETHERNET_802_3: Self = Self(0x0105);
    pub const ETHERNET_LLC: Self = Self(0x0106);

    pub const ETHERTYPE_IPV4: Self = Self(0x0800);
    pub const ETHERTYPE_ARP: Self = Self(0x0806);
    pub const ETHERTYPE_TRANS_ETHER_BRIDGING: Self = Self(0x6558);
    pub const ETHERTYPE_REVARP: Self = Self(0x8035);
    pub const ETHERTYPE_8021Q: Self = Self(0x8100);
    pub const ETHERTYPE_IPX: Self = Self(0x8137);
    pub const ETHERTYPE_IPV6: Self = Self(0x86DD);
    pub const ETHERTYPE_PPP: Self = Self(0x880B);
    pub const ETHERTYPE_MPLS_UNICAST: Self = Self(0x8847);
    pub const ETHERTYPE_MPLS_MULTICAST: Self = Self(0x8848);
    pub const ETHERTYPE_PPPOE_SESSION: Self = Self(0x8864);
    pub const ETHERTYPE_EAPOL: Self = Self(0x888E);
    pub const ETHERTYPE_8021AD: Self = Self(0x88A8);

    /// Id for an IP protocol number taken from a header.
    pub const fn from_ip_protocol(protocol: u8) -> Self {
        Self(protocol as u16)
    }

    /// Id for a type field that is defined to carry an ethertype.
    ///
    /// Values below `0x0600` are 802.3 lengths, not ethertypes, and must never
    /// reach the IP protocol range; they map to [`ProtocolId::ETHERNET_802_3`].
    pub const fn from_ethertype(value: u16) -> Self {
        if value < ETHERTYPE_FIRST {
            Self::ETHERNET_802_3
        } else {
            Self(value)
        }
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn is_ip_protocol(self) -> bool {
        self.0 < SENTINEL_FIRST
    }

    pub const fn is_sentinel(self) -> bool {
        self.0 >= SENTINEL_FIRST && self.0 < ETHERTYPE_FIRST
    }

    pub const fn is_ethertype(self) -> bool {
        self.0 >= ETHERTYPE_FIRST
    }

    pub const fn range(self) -> IdRange {
        if self.is_ip_protocol() {
            IdRange::IpProtocol
        } else if self.is_sentinel() {
            IdRange::Sentinel
        } else {
            IdRange::Ethertype
        }
    }

    /// Protocol that starts an embedded-packet decode entered through this
    /// sentinel, if it is one of the embedded entry points.
    pub const fn embedded_entry(self) -> Option<ProtocolId> {
        match self {
            Self::IP_EMBEDDED_IN_ICMP4 => Some(Self::ETHERTYPE_IPV4),
            Self::IP_EMBEDDED_IN_ICMP6 => Some(Self::ETHERTYPE_IPV6),
            _ => None,
        }
    }

    /// Short name for well-known ids.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::HOPOPTS => "hopopts",
            Self::ICMPV4 => "icmp4",
            Self::IPIP => "ipip",
            Self::TCP => "tcp",
            Self::UDP => "udp",
            Self::IPV6_IN_IP => "ipv6-in-ip",
            Self::ROUTING => "routing",
            Self::FRAGMENT => "fragment",
            Self::GRE => "gre",
            Self::ESP => "esp",
            Self::AUTH => "auth",
            Self::MOBILITY => "mobility",
            Self::ICMPV6 => "icmp6",
            Self::NONEXT => "nonext",
            Self::DSTOPTS => "dstopts",
            Self::MOBILITY_HEADER => "mobility-header",
            Self::RESERVED => "reserved",
            Self::FINISHED_DECODE => "finished",
            Self::TEREDO => "teredo",
            Self::GTP => "gtp",
            Self::IP_EMBEDDED_IN_ICMP4 => "ip-in-icmp4",
            Self::IP_EMBEDDED_IN_ICMP6 => "ip-in-icmp6",
            Self::ETHERNET_802_3 => "eth-802.3",
            Self::ETHERNET_LLC => "eth-llc",
            Self::ETHERTYPE_IPV4 => "ipv4",
            Self::ETHERTYPE_ARP => "arp",
            Self::ETHERTYPE_TRANS_ETHER_BRIDGING => "trans-bridge",
            Self::ETHERTYPE_REVARP => "rarp",
            Self::ETHERTYPE_8021Q => "vlan",
            Self::ETHERTYPE_IPX => "ipx",
            Self::ETHERTYPE_IPV6 => "ipv6",
            Self::ETHERTYPE_PPP => "ppp",
            Self::ETHERTYPE_MPLS_UNICAST => "mpls",
            Self::ETHERTYPE_MPLS_MULTICAST => "mpls-multicast",
            Self::ETHERTYPE_PPPOE_SESSION => "pppoe-session",
            Self::ETHERTYPE_EAPOL => "eapol",
            Self::ETHERTYPE_8021AD => "qinq",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}(0x{:04x})", self.0),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

/// Whether an IPv6 next-header value names an extension header rather than a
/// final upper-layer protocol.
///
/// Both the legacy mobility number (55) and the IANA mobility header (135) are
/// treated as extensions. Older extension tables stop at 55; 135 is included
/// on purpose so a mobility header never ends the chain as a transport.
pub const fn is_extension_header(protocol: u8) -> bool {
    matches!(protocol, 0 | 43 | 44 | 50 | 51 | 55 | 59 | 60 | 135)
}
