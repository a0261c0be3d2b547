//! Data Descriptor (DD) slots and DD blocks.
//!
//! Every data object in a file is located by a 12-byte DD slot
//! `(tag, ref, offset, length)`. Slots live in fixed-capacity DD blocks
//! chained through a `next_offset` header field; a zero `next_offset`
//! terminates the chain. The first block starts right after the magic.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::codec;
use crate::error::FormatError;
use crate::tag::TAG_NULL;

/// On-disk size of a DD block header: `next_offset (i32)` + `ndds (u16)`.
pub const DD_BLOCK_HEADER_SIZE: usize = 6;

/// On-disk size of one DD slot.
pub const DD_SLOT_SIZE: usize = 12;

/// Default number of slots in a newly created DD block.
pub const DEFAULT_NDDS: u16 = 16;

/// One data descriptor: the location of a single data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dd {
    /// 16-bit type code; high bit marks a special element.
    pub tag: u16,
    /// 16-bit instance number, unique per base tag.
    pub ref_id: u16,
    /// Byte offset of the object's data (or descriptor) in the file.
    pub offset: u64,
    /// Byte length of the object's data (or descriptor).
    pub length: u64,
}

impl Dd {
    /// A free slot.
    pub const FREE: Dd = Dd {
        tag: TAG_NULL,
        ref_id: 0,
        offset: 0,
        length: 0,
    };

    /// Whether this slot is free.
    pub fn is_free(&self) -> bool {
        self.tag == TAG_NULL
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), FormatError> {
        codec::put_u16(buf, self.tag);
        codec::put_u16(buf, self.ref_id);
        codec::put_off32(buf, self.offset)?;
        codec::put_off32(buf, self.length)?;
        Ok(())
    }

    fn parse(cur: &mut &[u8]) -> Result<Dd, FormatError> {
        Ok(Dd {
            tag: codec::get_u16(cur)?,
            ref_id: codec::get_u16(cur)?,
            offset: codec::get_off32(cur)?,
            length: codec::get_off32(cur)?,
        })
    }
}

/// One DD block: a header plus a fixed array of slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdBlock {
    /// File offset of the next block in the chain; zero terminates.
    pub next_offset: u64,
    /// The block's slots; free slots carry [`TAG_NULL`].
    pub slots: Vec<Dd>,
}

impl DdBlock {
    /// A fresh block with `ndds` free slots and no successor.
    pub fn new_empty(ndds: u16) -> DdBlock {
        DdBlock {
            next_offset: 0,
            slots: vec![Dd::FREE; ndds as usize],
        }
    }

    /// On-disk size of a block with `ndds` slots.
    pub fn disk_size(ndds: u16) -> usize {
        DD_BLOCK_HEADER_SIZE + ndds as usize * DD_SLOT_SIZE
    }

    /// Serialize the whole block (header and slots).
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let mut buf = Vec::with_capacity(Self::disk_size(self.slots.len() as u16));
        codec::put_off32(&mut buf, self.next_offset)?;
        codec::put_u16(&mut buf, self.slots.len() as u16);
        for dd in &self.slots {
            dd.encode(&mut buf)?;
        }
        Ok(buf)
    }

    /// Parse a block header, returning `(next_offset, ndds)`.
    pub fn parse_header(data: &[u8]) -> Result<(u64, u16), FormatError> {
        let mut cur = data;
        let next_offset = codec::get_off32(&mut cur)?;
        let ndds = codec::get_u16(&mut cur)?;
        if ndds == 0 {
            return Err(FormatError::InvalidBlockSize(0));
        }
        Ok((next_offset, ndds))
    }

    /// Parse `ndds` slots following a block header.
    pub fn parse_slots(data: &[u8], ndds: u16) -> Result<Vec<Dd>, FormatError> {
        let mut cur = data;
        let mut slots = Vec::with_capacity(ndds as usize);
        for _ in 0..ndds {
            slots.push(Dd::parse(&mut cur)?);
        }
        Ok(slots)
    }

    /// Parse a complete block from one contiguous buffer.
    pub fn parse(data: &[u8]) -> Result<DdBlock, FormatError> {
        let (next_offset, ndds) = Self::parse_header(data)?;
        if data.len() < Self::disk_size(ndds) {
            return Err(FormatError::UnexpectedEof {
                expected: Self::disk_size(ndds),
                available: data.len(),
            });
        }
        let slots = Self::parse_slots(&data[DD_BLOCK_HEADER_SIZE..], ndds)?;
        Ok(DdBlock { next_offset, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_roundtrip() {
        let block = DdBlock::new_empty(DEFAULT_NDDS);
        let bytes = block.encode().unwrap();
        assert_eq!(bytes.len(), DdBlock::disk_size(DEFAULT_NDDS));
        let back = DdBlock::parse(&bytes).unwrap();
        assert_eq!(back, block);
        assert!(back.slots.iter().all(Dd::is_free));
    }

    #[test]
    fn populated_block_roundtrip() {
        let mut block = DdBlock::new_empty(4);
        block.next_offset = 4096;
        block.slots[0] = Dd {
            tag: 1962,
            ref_id: 1,
            offset: 100,
            length: 5,
        };
        block.slots[2] = Dd {
            tag: 0x8000 | 720,
            ref_id: 3,
            offset: 228,
            length: 14,
        };
        let bytes = block.encode().unwrap();
        let back = DdBlock::parse(&bytes).unwrap();
        assert_eq!(back, block);
        assert!(back.slots[1].is_free());
    }

    #[test]
    fn zero_ndds_rejected() {
        let mut block = DdBlock::new_empty(1);
        block.slots.clear();
        let bytes = block.encode().unwrap();
        assert_eq!(
            DdBlock::parse(&bytes),
            Err(FormatError::InvalidBlockSize(0))
        );
    }

    #[test]
    fn truncated_block_is_eof() {
        let block = DdBlock::new_empty(8);
        let bytes = block.encode().unwrap();
        assert!(matches!(
            DdBlock::parse(&bytes[..20]),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn wire_layout_matches_spec() {
        let mut block = DdBlock::new_empty(1);
        block.next_offset = 0x0102;
        block.slots[0] = Dd {
            tag: 0x00AA,
            ref_id: 0x00BB,
            offset: 0x10,
            length: 0x20,
        };
        let bytes = block.encode().unwrap();
        assert_eq!(
            bytes,
            [
                0x00, 0x00, 0x01, 0x02, // next_offset
                0x00, 0x01, // ndds
                0x00, 0xAA, 0x00, 0xBB, // tag, ref
                0x00, 0x00, 0x00, 0x10, // offset
                0x00, 0x00, 0x00, 0x20, // length
            ]
        );
    }
}
