use std::ops::Range;

use super::error::Truncated;

/// Bounds-checked big-endian field access over one header.
///
/// Reads are positional; nothing is consumed. Every accessor fails with
/// `Truncated` instead of indexing past the slice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn require_len(&self, needed: usize) -> Result<(), Truncated> {
        if self.bytes.len() < needed {
            return Err(Truncated {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, Truncated> {
        self.bytes.get(offset).copied().ok_or(Truncated {
            needed: offset.saturating_add(1),
            actual: self.bytes.len(),
        })
    }

    pub fn read_u16_be(&self, offset: usize) -> Result<u16, Truncated> {
        self.read_array::<2>(offset).map(u16::from_be_bytes)
    }

    pub fn read_u32_be(&self, offset: usize) -> Result<u32, Truncated> {
        self.read_array::<4>(offset).map(u32::from_be_bytes)
    }

    pub fn read_slice(&self, range: Range<usize>) -> Result<&'a [u8], Truncated> {
        self.bytes.get(range.clone()).ok_or(Truncated {
            needed: range.end,
            actual: self.bytes.len(),
        })
    }

    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], Truncated> {
        let end = offset.saturating_add(N);
        let slice = self.read_slice(offset..end)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}
