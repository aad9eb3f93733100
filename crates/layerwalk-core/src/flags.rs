use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    struct Bits: u32 {
        const ETH = 1 << 0;
        const VLAN = 1 << 1;
        const ARP = 1 << 2;
        const PPPOE = 1 << 3;
        const MPLS = 1 << 4;
        const IP4 = 1 << 5;
        const IP6 = 1 << 6;
        const IP6_EXT = 1 << 7;
        const FRAG = 1 << 8;
        const AUTH = 1 << 9;
        const GRE = 1 << 10;
        const UDP = 1 << 11;
        const TCP = 1 << 12;
        const ICMP4 = 1 << 13;
        const ICMP6 = 1 << 14;
    }
}

/// Set of protocols observed while decoding one packet.
///
/// Bits can only be added, so a value held by a decode context grows
/// monotonically over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", from = "u32")]
pub struct ProtoFlags(Bits);

impl ProtoFlags {
    pub const ETH: Self = Self(Bits::ETH);
    pub const VLAN: Self = Self(Bits::VLAN);
    pub const ARP: Self = Self(Bits::ARP);
    pub const PPPOE: Self = Self(Bits::PPPOE);
    pub const MPLS: Self = Self(Bits::MPLS);
    pub const IP4: Self = Self(Bits::IP4);
    pub const IP6: Self = Self(Bits::IP6);
    pub const IP6_EXT: Self = Self(Bits::IP6_EXT);
    pub const FRAG: Self = Self(Bits::FRAG);
    pub const AUTH: Self = Self(Bits::AUTH);
    pub const GRE: Self = Self(Bits::GRE);
    pub const UDP: Self = Self(Bits::UDP);
    pub const TCP: Self = Self(Bits::TCP);
    pub const ICMP4: Self = Self(Bits::ICMP4);
    pub const ICMP6: Self = Self(Bits::ICMP6);

    pub const fn empty() -> Self {
        Self(Bits::empty())
    }

    pub const fn bits(self) -> u32 {
        self.0.bits()
    }

    pub const fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0.contains(other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0.insert(other.0);
    }

    /// Report names of the set flags, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(flag, _)| self.0.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

const NAMES: [(Bits, &str); 15] = [
    (Bits::ETH, "eth"),
    (Bits::VLAN, "vlan"),
    (Bits::ARP, "arp"),
    (Bits::PPPOE, "pppoe"),
    (Bits::MPLS, "mpls"),
    (Bits::IP4, "ip4"),
    (Bits::IP6, "ip6"),
    (Bits::IP6_EXT, "ip6-ext"),
    (Bits::FRAG, "frag"),
    (Bits::AUTH, "auth"),
    (Bits::GRE, "gre"),
    (Bits::UDP, "udp"),
    (Bits::TCP, "tcp"),
    (Bits::ICMP4, "icmp4"),
    (Bits::ICMP6, "icmp6"),
];

impl BitOr for ProtoFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<ProtoFlags> for u32 {
    fn from(flags: ProtoFlags) -> Self {
        flags.bits()
    }
}

impl From<u32> for ProtoFlags {
    /// Unknown bits are dropped.
    fn from(bits: u32) -> Self {
        Self(Bits::from_bits_truncate(bits))
    }
}

impl fmt::Display for ProtoFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        write!(f, "{}", self.names().join("|"))
    }
}
