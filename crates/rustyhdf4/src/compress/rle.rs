//! Streaming byte-level run-length coder.
//!
//! The encoded stream is a sequence of blocks. A control byte with the top
//! bit set introduces a run: the low seven bits carry the repeat count
//! (3..=127) and one data byte follows. A control byte without the top bit
//! carries a literal count (1..=127) followed by that many raw bytes.
//!
//! Encoding is strictly sequential. Decoding supports seeking: forward by
//! decode-and-discard, backward by restarting from the element start.

use crate::compress::coder::{ByteStream, CoderMode, StreamMode};
use crate::error::{Error, Result};

const MIN_RUN: usize = 3;
const MAX_RUN: u32 = 127;
const MAX_LITERAL: usize = 127;
const RUN_FLAG: u8 = 0x80;

/// Decoder side: what the last control byte promised but the caller has
/// not consumed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Nothing,
    Run { byte: u8, left: u32 },
    Literal { left: u32 },
}

#[derive(Debug)]
struct RleDecoder {
    /// Logical position of the next byte the decoder will produce.
    log_pos: u64,
    /// Backing position of the next encoded byte to read.
    src_pos: u64,
    pending: Pending,
}

impl RleDecoder {
    fn new() -> RleDecoder {
        RleDecoder {
            log_pos: 0,
            src_pos: 0,
            pending: Pending::Nothing,
        }
    }

    /// Decode exactly `buf.len()` bytes at the current position.
    fn decode(&mut self, io: &mut dyn ByteStream, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.pending {
                Pending::Run { byte, left } => {
                    let k = (left as usize).min(buf.len() - filled);
                    buf[filled..filled + k].fill(byte);
                    filled += k;
                    self.log_pos += k as u64;
                    self.pending = if left as usize == k {
                        Pending::Nothing
                    } else {
                        Pending::Run {
                            byte,
                            left: left - k as u32,
                        }
                    };
                }
                Pending::Literal { left } => {
                    let k = (left as usize).min(buf.len() - filled);
                    let got = io.read_at(self.src_pos, &mut buf[filled..filled + k])?;
                    if got < k {
                        return Err(Error::Corrupt("run-length stream truncated"));
                    }
                    self.src_pos += k as u64;
                    filled += k;
                    self.log_pos += k as u64;
                    self.pending = if left as usize == k {
                        Pending::Nothing
                    } else {
                        Pending::Literal {
                            left: left - k as u32,
                        }
                    };
                }
                Pending::Nothing => {
                    let mut ctl = [0u8; 1];
                    if io.read_at(self.src_pos, &mut ctl)? == 0 {
                        return Err(Error::Corrupt("run-length stream truncated"));
                    }
                    self.src_pos += 1;
                    if ctl[0] & RUN_FLAG != 0 {
                        let count = u32::from(ctl[0] & !RUN_FLAG);
                        if count == 0 {
                            return Err(Error::Corrupt("zero-length run"));
                        }
                        let mut byte = [0u8; 1];
                        if io.read_at(self.src_pos, &mut byte)? == 0 {
                            return Err(Error::Corrupt("run-length stream truncated"));
                        }
                        self.src_pos += 1;
                        self.pending = Pending::Run {
                            byte: byte[0],
                            left: count,
                        };
                    } else {
                        if ctl[0] == 0 {
                            return Err(Error::Corrupt("zero-length literal"));
                        }
                        self.pending = Pending::Literal {
                            left: u32::from(ctl[0]),
                        };
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode and discard bytes until the logical position reaches `posn`.
    fn skip_to(&mut self, io: &mut dyn ByteStream, posn: u64) -> Result<()> {
        let mut scratch = [0u8; 256];
        while self.log_pos < posn {
            let k = ((posn - self.log_pos) as usize).min(scratch.len());
            self.decode(io, &mut scratch[..k])?;
        }
        Ok(())
    }
}

pub(crate) struct RleCoder {
    mode: StreamMode,
    /// Logical bytes accepted by the encoder.
    enc_pos: u64,
    /// Backing bytes emitted by the encoder.
    out_pos: u64,
    lit: Vec<u8>,
    run_byte: u8,
    run_len: u32,
    dec: RleDecoder,
}

impl RleCoder {
    pub fn new(mode: CoderMode) -> RleCoder {
        RleCoder {
            mode: match mode {
                CoderMode::Read => StreamMode::Decode,
                CoderMode::Write => StreamMode::Encode,
            },
            enc_pos: 0,
            out_pos: 0,
            lit: Vec::new(),
            run_byte: 0,
            run_len: 0,
            dec: RleDecoder::new(),
        }
    }

    fn flush_run(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        if self.run_len > 0 {
            io.write_at(self.out_pos, &[RUN_FLAG | self.run_len as u8, self.run_byte])?;
            self.out_pos += 2;
            self.run_len = 0;
        }
        Ok(())
    }

    fn flush_literal(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        if !self.lit.is_empty() {
            let mut block = Vec::with_capacity(1 + self.lit.len());
            block.push(self.lit.len() as u8);
            block.extend_from_slice(&self.lit);
            io.write_at(self.out_pos, &block)?;
            self.out_pos += block.len() as u64;
            self.lit.clear();
        }
        Ok(())
    }

    fn push_byte(&mut self, io: &mut dyn ByteStream, b: u8) -> Result<()> {
        if self.run_len > 0 {
            if b == self.run_byte && self.run_len < MAX_RUN {
                self.run_len += 1;
                return Ok(());
            }
            self.flush_run(io)?;
        }
        self.lit.push(b);
        let n = self.lit.len();
        if n >= MIN_RUN && self.lit[n - 1] == self.lit[n - 2] && self.lit[n - 2] == self.lit[n - 3]
        {
            // The tail of the literal turned into a run.
            self.lit.truncate(n - MIN_RUN);
            self.flush_literal(io)?;
            self.run_byte = b;
            self.run_len = MIN_RUN as u32;
        } else if n == MAX_LITERAL {
            self.flush_literal(io)?;
        }
        Ok(())
    }

    /// Write out pending blocks and leave the stream decodable.
    fn finish_encode(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        self.flush_run(io)?;
        self.flush_literal(io)
    }

    pub fn write(&mut self, io: &mut dyn ByteStream, posn: u64, data: &[u8]) -> Result<()> {
        if self.mode != StreamMode::Encode || posn != self.enc_pos {
            return Err(Error::CannotRandomWrite);
        }
        for &b in data {
            self.push_byte(io, b)?;
        }
        self.enc_pos += data.len() as u64;
        Ok(())
    }

    pub fn read(&mut self, io: &mut dyn ByteStream, posn: u64, buf: &mut [u8]) -> Result<()> {
        if self.mode == StreamMode::Encode {
            self.finish_encode(io)?;
            self.mode = StreamMode::Decode;
            self.dec = RleDecoder::new();
        }
        if posn < self.dec.log_pos {
            self.dec = RleDecoder::new();
        }
        self.dec.skip_to(io, posn)?;
        self.dec.decode(io, buf)
    }

    pub fn seek(&mut self, io: &mut dyn ByteStream, posn: u64) -> Result<()> {
        if self.mode == StreamMode::Encode && posn != self.enc_pos {
            self.finish_encode(io)?;
            self.mode = StreamMode::Decode;
            self.dec = RleDecoder::new();
        }
        // Decoder-side positioning happens lazily on the next read.
        Ok(())
    }

    pub fn flush(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        if self.mode == StreamMode::Encode {
            self.finish_encode(io)?;
        }
        Ok(())
    }
}
