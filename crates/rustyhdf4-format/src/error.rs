//! Error types for HDF4 format parsing.

use core::fmt;

/// Errors that can occur when parsing or serializing HDF4 binary structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The 4-byte HDF magic signature did not match.
    BadMagic {
        /// The bytes actually found at the start of the file.
        found: [u8; 4],
    },
    /// Unexpected end of data.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// A DD block declared zero slots.
    InvalidBlockSize(u16),
    /// An offset or length does not fit the signed 32-bit on-disk field.
    OffsetTooLarge(u64),
    /// The special-element descriptor carries an unsupported header version.
    UnsupportedHeaderVersion(u16),
    /// The special code of a descriptor names no known element variant.
    UnknownSpecialCode(u16),
    /// The model code of a compressed descriptor is not recognized.
    UnknownModelCode(u16),
    /// The coder code of a compressed descriptor is not recognized.
    UnknownCoderCode(u16),
    /// A number-type code could not be resolved to a size.
    BadNumberType(i32),
    /// A skipping-Huffman descriptor with a zero skip unit.
    InvalidSkipSize(u32),
    /// An n-bit field description that does not fit its number type.
    InvalidBitField {
        /// Bit offset of the top of the field (0 = least significant bit).
        start_bit: i32,
        /// Number of bits in the field.
        bit_len: i32,
        /// Total bits in the number type.
        nt_bits: u32,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::BadMagic { found } => {
                write!(
                    f,
                    "bad HDF magic: {:02x} {:02x} {:02x} {:02x}",
                    found[0], found[1], found[2], found[3]
                )
            }
            FormatError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidBlockSize(n) => {
                write!(f, "invalid DD block size: {n}")
            }
            FormatError::OffsetTooLarge(off) => {
                write!(f, "offset {off} exceeds the 32-bit on-disk field")
            }
            FormatError::UnsupportedHeaderVersion(v) => {
                write!(f, "unsupported special-element header version: {v}")
            }
            FormatError::UnknownSpecialCode(c) => {
                write!(f, "unknown special element code: {c}")
            }
            FormatError::UnknownModelCode(c) => {
                write!(f, "unknown compression model code: {c}")
            }
            FormatError::UnknownCoderCode(c) => {
                write!(f, "unknown compression coder code: {c}")
            }
            FormatError::BadNumberType(nt) => {
                write!(f, "unknown number type code: {nt}")
            }
            FormatError::InvalidSkipSize(s) => {
                write!(f, "invalid skipping-Huffman unit size: {s}")
            }
            FormatError::InvalidBitField {
                start_bit,
                bit_len,
                nt_bits,
            } => {
                write!(
                    f,
                    "bit field (start {start_bit}, length {bit_len}) does not fit a \
                     {nt_bits}-bit number type"
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}
