/// Buffer handed to the pcap-parser readers; refilled on `Incomplete`.
pub const PCAP_READER_BUFFER_SIZE: usize = 64 * 1024;

/// Section header block type, the first four bytes of every PCAPNG file.
pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Fraction units per second for legacy microsecond captures, and the
/// PCAPNG resolution when `if_tsresol` is absent or unusable.
pub const MICROS_PER_SECOND: u64 = 1_000_000;
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// High nibble of the first byte of a raw IP frame.
pub const IP_VERSION_SHIFT: u8 = 4;
