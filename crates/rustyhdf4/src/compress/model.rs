//! The modeling layer.
//!
//! A model presents the byte-oriented, seekable view of the logical
//! element to the dispatch layer and feeds the coder underneath. The only
//! implemented variant is the stdio-style identity model, which passes
//! bytes through unchanged; a reordering model (a space-filling-curve
//! traversal, say) would go here as a new variant.

use rustyhdf4_format::ModelCode;

use crate::compress::coder::{ByteStream, CoderState};
use crate::error::Result;

/// The model state of one compressed element; owns the coder.
pub(crate) enum ModelState {
    Stdio(StdioModel),
}

impl ModelState {
    pub fn new(code: ModelCode, coder: CoderState) -> ModelState {
        match code {
            ModelCode::Stdio => ModelState::Stdio(StdioModel { coder }),
        }
    }

    pub fn code(&self) -> ModelCode {
        match self {
            ModelState::Stdio(_) => ModelCode::Stdio,
        }
    }

    pub fn coder(&self) -> &CoderState {
        match self {
            ModelState::Stdio(m) => &m.coder,
        }
    }

    pub fn read(&mut self, io: &mut dyn ByteStream, posn: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            ModelState::Stdio(m) => m.coder.read(io, posn, buf),
        }
    }

    pub fn write(&mut self, io: &mut dyn ByteStream, posn: u64, data: &[u8]) -> Result<()> {
        match self {
            ModelState::Stdio(m) => m.coder.write(io, posn, data),
        }
    }

    pub fn seek(&mut self, io: &mut dyn ByteStream, posn: u64) -> Result<()> {
        match self {
            ModelState::Stdio(m) => m.coder.seek(io, posn),
        }
    }

    pub fn flush(&mut self, io: &mut dyn ByteStream) -> Result<()> {
        match self {
            ModelState::Stdio(m) => m.coder.flush(io),
        }
    }
}

/// The identity model: logical bytes map one-to-one onto coder bytes.
pub(crate) struct StdioModel {
    pub coder: CoderState,
}
