//! The n-bit projection coder.
//!
//! The logical stream is treated as a sequence of fixed-size big-endian
//! units. Only the bits `[start_bit .. start_bit - bit_len + 1]` of each
//! unit (bit 0 is the unit's least significant bit) are stored, packed
//! MSB-first into the backing stream. Reading reconstitutes full units:
//! bits above the field are sign-extended from the field's top bit when
//! sign extension is on, otherwise they and the bits below the field take
//! the fill value.
//!
//! Because every unit occupies exactly `bit_len` bits, reads are randomly
//! seekable at unit granularity.

use rustyhdf4_format::NBitParams;

use crate::compress::bitio::{BitReader, BitWriter};
use crate::compress::coder::{ByteStream, CoderMode, StreamMode};
use crate::error::{Error, Result};

fn ones(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

pub(crate) struct NBitCoder {
    nt_size: usize,
    sign_ext: bool,
    fill_one: bool,
    start_bit: u32,
    bit_len: u32,
    mode: StreamMode,
    /// Set once the bit writer has padded its final byte; the stream can
    /// not be extended afterwards.
    flushed: bool,
    enc_pos: u64,
    unit: Vec<u8>,
    bw: BitWriter,
    /// Unit index the bit reader is positioned at.
    dec_unit: u64,
    br: BitReader,
}

impl NBitCoder {
    pub fn new(params: &NBitParams, mode: CoderMode) -> NBitCoder {
        NBitCoder {
            nt_size: params.number_type.size(),
            sign_ext: params.sign_ext,
            fill_one: params.fill_one,
            start_bit: params.start_bit,
            bit_len: params.bit_len,
            mode: match mode {
                CoderMode::Read => StreamMode::Decode,
                CoderMode::Write => StreamMode::Encode,
            },
            flushed: false,
            enc_pos: 0,
            unit: Vec::new(),
            bw: BitWriter::new(),
            dec_unit: 0,
            br: BitReader::new(),
        }
    }

    /// Bit position of the bottom of the field within a unit.
    fn field_shift(&self) -> u32 {
        self.start_bit + 1 - self.bit_len
    }

    fn emit_unit(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        let mut u: u64 = 0;
        for &b in &self.unit {
            u = (u << 8) | u64::from(b);
        }
        let field = (u >> self.field_shift()) & ones(self.bit_len);
        self.bw.push_bits(io, field, self.bit_len)?;
        self.unit.clear();
        Ok(())
    }

    /// Rebuild a full unit from its stored field bits.
    fn expand(&self, field: u64) -> u64 {
        let nt_bits = self.nt_size as u32 * 8;
        let nt_mask = ones(nt_bits);
        let shift = self.field_shift();
        let fmask = ones(self.bit_len) << shift;
        let mut v = if self.fill_one { nt_mask } else { 0 };
        v = (v & !fmask) | (field << shift);
        if self.sign_ext {
            let above = nt_mask & !ones(self.start_bit + 1);
            if (field >> (self.bit_len - 1)) & 1 == 1 {
                v |= above;
            } else {
                v &= !above;
            }
        }
        v
    }

    fn finish_encode(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        if !self.unit.is_empty() {
            // A trailing partial unit is zero-padded to unit size.
            self.unit.resize(self.nt_size, 0);
            self.emit_unit(io)?;
        }
        self.bw.flush(io)?;
        self.flushed = true;
        Ok(())
    }

    pub fn write(&mut self, io: &mut dyn ByteStream, posn: u64, data: &[u8]) -> Result<()> {
        if self.mode != StreamMode::Encode || self.flushed || posn != self.enc_pos {
            return Err(Error::CannotRandomWrite);
        }
        for &b in data {
            self.unit.push(b);
            if self.unit.len() == self.nt_size {
                self.emit_unit(io)?;
            }
        }
        self.enc_pos += data.len() as u64;
        Ok(())
    }

    pub fn read(&mut self, io: &mut dyn ByteStream, posn: u64, buf: &mut [u8]) -> Result<()> {
        if self.mode == StreamMode::Encode {
            self.finish_encode(io)?;
            self.mode = StreamMode::Decode;
            self.dec_unit = 0;
            self.br = BitReader::new();
        }
        let nt = self.nt_size as u64;
        let mut pos = posn;
        let mut filled = 0;
        while filled < buf.len() {
            let unit_idx = pos / nt;
            let within = (pos % nt) as usize;
            if unit_idx != self.dec_unit {
                self.br.seek_bits(unit_idx * u64::from(self.bit_len));
                self.dec_unit = unit_idx;
            }
            let field = self.br.next_bits(io, self.bit_len)?;
            self.dec_unit += 1;
            let v = self.expand(field);
            let mut bytes = [0u8; 8];
            for (i, byte) in bytes.iter_mut().enumerate().take(self.nt_size) {
                *byte = (v >> ((self.nt_size - 1 - i) * 8)) as u8;
            }
            let take = (self.nt_size - within).min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&bytes[within..within + take]);
            filled += take;
            pos += take as u64;
        }
        Ok(())
    }

    pub fn seek(&mut self, io: &mut dyn ByteStream, posn: u64) -> Result<()> {
        if self.mode == StreamMode::Encode && posn != self.enc_pos {
            self.finish_encode(io)?;
            self.mode = StreamMode::Decode;
            self.dec_unit = 0;
            self.br = BitReader::new();
        }
        Ok(())
    }

    pub fn flush(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        if self.mode == StreamMode::Encode && !self.flushed {
            self.finish_encode(io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::coder::tests::MemStream;
    use rustyhdf4_format::NumberType;

    fn coder(params: NBitParams, mode: CoderMode) -> NBitCoder {
        params.validate().unwrap();
        NBitCoder::new(&params, mode)
    }

    fn low_byte_i32() -> NBitParams {
        NBitParams {
            number_type: NumberType::Int32,
            sign_ext: true,
            fill_one: false,
            start_bit: 7,
            bit_len: 8,
        }
    }

    #[test]
    fn signed_low_byte_roundtrip() {
        let values: [i32; 5] = [-1, 0, 1, 127, -128];
        let mut data = Vec::new();
        for v in values {
            data.extend_from_slice(&v.to_be_bytes());
        }

        let mut s = MemStream::default();
        let mut c = coder(low_byte_i32(), CoderMode::Write);
        c.write(&mut s, 0, &data).unwrap();
        c.flush(&mut s).unwrap();
        // 5 units of 8 bits pack into 5 bytes.
        assert_eq!(s.data.len(), 5);

        let mut c = coder(low_byte_i32(), CoderMode::Read);
        let mut out = vec![0u8; data.len()];
        c.read(&mut s, 0, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn mid_field_keeps_only_field_bits() {
        // Field covers bits 15..8 of each 32-bit unit.
        let params = NBitParams {
            number_type: NumberType::Int32,
            sign_ext: true,
            fill_one: false,
            start_bit: 15,
            bit_len: 8,
        };
        let values: [i32; 4] = [-256, 0, 256, 32512];
        let mut data = Vec::new();
        for v in values {
            data.extend_from_slice(&v.to_be_bytes());
        }

        let mut s = MemStream::default();
        let mut c = coder(params, CoderMode::Write);
        c.write(&mut s, 0, &data).unwrap();
        c.flush(&mut s).unwrap();

        let mut c = coder(params, CoderMode::Read);
        let mut out = vec![0u8; data.len()];
        c.read(&mut s, 0, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn unsigned_fill_one() {
        let params = NBitParams {
            number_type: NumberType::Uint16,
            sign_ext: false,
            fill_one: true,
            start_bit: 3,
            bit_len: 4,
        };
        let mut s = MemStream::default();
        let mut c = coder(params, CoderMode::Write);
        // Unit 0x0005: field = 5.
        c.write(&mut s, 0, &[0x00, 0x05]).unwrap();
        c.flush(&mut s).unwrap();

        let mut c = coder(params, CoderMode::Read);
        let mut out = [0u8; 2];
        c.read(&mut s, 0, &mut out).unwrap();
        // All non-field bits come back as ones.
        assert_eq!(out, [0xFF, 0xF5]);
    }

    #[test]
    fn odd_bit_lengths_pack_tightly() {
        let params = NBitParams {
            number_type: NumberType::Uint8,
            sign_ext: false,
            fill_one: false,
            start_bit: 4,
            bit_len: 5,
        };
        let data: Vec<u8> = (0..32u8).collect();

        let mut s = MemStream::default();
        let mut c = coder(params, CoderMode::Write);
        c.write(&mut s, 0, &data).unwrap();
        c.flush(&mut s).unwrap();
        assert_eq!(s.data.len(), (32 * 5 + 7) / 8);

        let mut c = coder(params, CoderMode::Read);
        let mut out = vec![0u8; data.len()];
        c.read(&mut s, 0, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn random_unit_seek() {
        let params = low_byte_i32();
        let mut data = Vec::new();
        for v in 0..100i32 {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let mut s = MemStream::default();
        let mut c = coder(params, CoderMode::Write);
        c.write(&mut s, 0, &data).unwrap();
        c.flush(&mut s).unwrap();

        let mut c = coder(low_byte_i32(), CoderMode::Read);
        // Jump to unit 70, then back to unit 10.
        let mut out = [0u8; 4];
        c.read(&mut s, 70 * 4, &mut out).unwrap();
        assert_eq!(i32::from_be_bytes(out), 70);
        c.read(&mut s, 10 * 4, &mut out).unwrap();
        assert_eq!(i32::from_be_bytes(out), 10);
        // Partial-unit read within unit 10.
        let mut tail = [0u8; 2];
        c.read(&mut s, 10 * 4 + 2, &mut tail).unwrap();
        assert_eq!(tail, out[2..4]);
    }

    #[test]
    fn write_after_flush_rejected() {
        let mut s = MemStream::default();
        let mut c = coder(low_byte_i32(), CoderMode::Write);
        c.write(&mut s, 0, &1i32.to_be_bytes()).unwrap();
        c.flush(&mut s).unwrap();
        assert!(matches!(
            c.write(&mut s, 4, &2i32.to_be_bytes()),
            Err(Error::CannotRandomWrite)
        ));
    }

    #[test]
    fn nonsequential_write_rejected() {
        let mut s = MemStream::default();
        let mut c = coder(low_byte_i32(), CoderMode::Write);
        c.write(&mut s, 0, &1i32.to_be_bytes()).unwrap();
        assert!(matches!(
            c.write(&mut s, 0, &2i32.to_be_bytes()),
            Err(Error::CannotRandomWrite)
        ));
    }
}
