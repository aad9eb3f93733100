//! Fixed header sizes, offsets and field masks for the builtin decoders.

pub const ETH_HEADER_LEN: usize = 14;
pub const ETH_DST_OFFSET: usize = 0;
pub const ETH_SRC_OFFSET: usize = 6;
pub const ETH_TYPE_OFFSET: usize = 12;

pub const VLAN_TAG_LEN: usize = 4;
pub const VLAN_TCI_OFFSET: usize = 0;
pub const VLAN_TYPE_OFFSET: usize = 2;
pub const VLAN_ID_MASK: u16 = 0x0fff;

pub const ARP_FIXED_LEN: usize = 8;
pub const ARP_HLEN_OFFSET: usize = 4;
pub const ARP_PLEN_OFFSET: usize = 5;

pub const PPPOE_SESSION_ID_OFFSET: usize = 2;
pub const PPPOE_HEADER_LEN: usize = 8;
pub const PPPOE_VER_TYPE_OFFSET: usize = 0;
pub const PPPOE_VER_TYPE: u8 = 0x11;
pub const PPPOE_PPP_PROTO_OFFSET: usize = 6;
pub const PPP_IPV4: u16 = 0x0021;
pub const PPP_IPV6: u16 = 0x0057;

pub const MPLS_ENTRY_LEN: usize = 4;
pub const MPLS_LABEL_SHIFT: u32 = 12;
pub const MPLS_BOS_MASK: u32 = 0x0100;
pub const MPLS_LABEL_IPV4_NULL: u32 = 0;
pub const MPLS_LABEL_IPV6_NULL: u32 = 2;
pub const MPLS_LABEL_RESERVED_MAX: u32 = 15;

pub const IPV4_MIN_HEADER_LEN: usize = 20;

pub const IPV6_HEADER_LEN: usize = 40;

pub const IPV6_EXT_MIN_LEN: usize = 8;
pub const IPV6_EXT_NEXT_OFFSET: usize = 0;
pub const IPV6_EXT_LEN_OFFSET: usize = 1;
pub const IPV6_EXT_UNIT: usize = 8;
pub const IPV6_FRAG_HEADER_LEN: usize = 8;
pub const IPV6_FRAG_FIELD_OFFSET: usize = 2;
pub const IPV6_FRAG_ID_OFFSET: usize = 4;
pub const IPV6_FRAG_OFFSET_MASK: u16 = 0xfff8;
pub const IPV6_FRAG_MORE: u16 = 0x0001;
pub const AUTH_MIN_LEN: usize = 12;
pub const AUTH_UNIT: usize = 4;

pub const GRE_BASE_LEN: usize = 4;
pub const GRE_OPTION_LEN: usize = 4;
pub const GRE_PROTO_OFFSET: usize = 2;
pub const GRE_FLAG_CHECKSUM: u16 = 0x8000;
pub const GRE_FLAG_KEY: u16 = 0x2000;
pub const GRE_FLAG_SEQUENCE: u16 = 0x1000;
pub const GRE_FLAG_ACK: u16 = 0x0080;
pub const GRE_VERSION_MASK: u16 = 0x0007;
/// Bits a version 0 header may carry; routing, strict source route,
/// recursion control and the remaining flag bits must be clear.
pub const GRE_V0_ALLOWED: u16 =
    GRE_FLAG_CHECKSUM | GRE_FLAG_KEY | GRE_FLAG_SEQUENCE | GRE_VERSION_MASK;
/// Bits an enhanced (PPTP) version 1 header may carry.
pub const GRE_V1_ALLOWED: u16 = GRE_FLAG_KEY | GRE_FLAG_SEQUENCE | GRE_FLAG_ACK | GRE_VERSION_MASK;
pub const GRE_V1_BASE_LEN: usize = 8;

pub const UDP_HEADER_LEN: usize = 8;
pub const UDP_LENGTH_OFFSET: usize = 4;

pub const TCP_MIN_HEADER_LEN: usize = 20;
pub const TCP_DATA_OFFSET_OFFSET: usize = 12;

pub const ICMP_HEADER_LEN: usize = 8;
pub const ICMP6_MIN_LEN: usize = 4;
