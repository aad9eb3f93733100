//! Capture file source.
//!
//! Reads legacy PCAP and PCAPNG files through `pcap-parser` and yields one
//! [`PacketEvent`](crate::source::PacketEvent) per captured frame. All file
//! I/O of the crate lives here.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
