//! The pass-through coder.
//!
//! Backing bytes equal logical bytes, so every operation maps directly and
//! random reads and writes both work.

use crate::compress::coder::ByteStream;
use crate::error::Result;

pub(crate) struct NoneCoder;

impl NoneCoder {
    pub fn read(&mut self, io: &mut dyn ByteStream, posn: u64, buf: &mut [u8]) -> Result<()> {
        let n = io.read_at(posn, buf)?;
        // Allocated-but-unwritten tails read as zeros.
        buf[n..].fill(0);
        Ok(())
    }

    pub fn write(&mut self, io: &mut dyn ByteStream, posn: u64, data: &[u8]) -> Result<()> {
        io.write_at(posn, data)
    }

    pub fn seek(&mut self, _io: &mut dyn ByteStream, _posn: u64) -> Result<()> {
        Ok(())
    }

    pub fn flush(&mut self, _io: &mut dyn ByteStream) -> Result<()> {
        Ok(())
    }
}
