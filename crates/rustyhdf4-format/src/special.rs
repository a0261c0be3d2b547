//! Compressed-element descriptors.
//!
//! A compressed element's visible DD points at a small descriptor block:
//! the special code, a header version, the uncompressed length, the ref of
//! the hidden backing element, the model and coder codes, and any
//! coder-specific trailer. All fields are big-endian.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::codec;
use crate::error::FormatError;
use crate::numtype::NumberType;
use crate::tag::SpecialCode;

/// Version written into every compressed-element descriptor.
pub const COMP_HEADER_VERSION: u16 = 0;

/// Initial logical length of a freshly created compressed element.
pub const COMP_START_BLOCK: u64 = 1;

/// The modeling layer variant of a compressed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCode {
    /// Identity model: bytes pass through unchanged, stdio-style.
    Stdio,
}

impl ModelCode {
    /// Resolve an on-disk model code.
    pub fn from_code(code: u16) -> Result<ModelCode, FormatError> {
        match code {
            0 => Ok(ModelCode::Stdio),
            c => Err(FormatError::UnknownModelCode(c)),
        }
    }

    /// The on-disk code of this model.
    pub fn code(self) -> u16 {
        match self {
            ModelCode::Stdio => 0,
        }
    }
}

/// The coding layer variant of a compressed element, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderCode {
    /// Pass-through.
    None,
    /// Byte-level run-length encoding.
    Rle,
    /// Bit-field projection of fixed-size native values.
    NBit,
    /// Skipping adaptive Huffman.
    SkipHuffman,
}

impl CoderCode {
    /// Resolve an on-disk coder code.
    pub fn from_code(code: u16) -> Result<CoderCode, FormatError> {
        match code {
            0 => Ok(CoderCode::None),
            1 => Ok(CoderCode::Rle),
            2 => Ok(CoderCode::NBit),
            3 => Ok(CoderCode::SkipHuffman),
            c => Err(FormatError::UnknownCoderCode(c)),
        }
    }

    /// The on-disk code of this coder.
    pub fn code(self) -> u16 {
        match self {
            CoderCode::None => 0,
            CoderCode::Rle => 1,
            CoderCode::NBit => 2,
            CoderCode::SkipHuffman => 3,
        }
    }
}

/// Parameters of the n-bit coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NBitParams {
    /// The native type whose size defines the packing unit.
    pub number_type: NumberType,
    /// Sign-extend the field's top bit over the bits above it on read.
    pub sign_ext: bool,
    /// Fill non-field bits with ones instead of zeros on read.
    pub fill_one: bool,
    /// Bit offset of the top of the field; bit 0 is the unit's LSB.
    pub start_bit: u32,
    /// Number of bits kept per unit.
    pub bit_len: u32,
}

impl NBitParams {
    /// Check that the field fits its unit.
    pub fn validate(&self) -> Result<(), FormatError> {
        let nt_bits = self.number_type.size() as u32 * 8;
        if self.bit_len == 0 || self.bit_len > self.start_bit + 1 || self.start_bit >= nt_bits {
            return Err(FormatError::InvalidBitField {
                start_bit: self.start_bit as i32,
                bit_len: self.bit_len as i32,
                nt_bits,
            });
        }
        Ok(())
    }
}

/// Parameters of the skipping-Huffman coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipHuffmanParams {
    /// Size of the skipping unit: byte `i` of the stream belongs to lane
    /// `i % skip_size`, and each lane carries its own adaptive code.
    pub skip_size: u32,
}

impl SkipHuffmanParams {
    /// Check that the unit size is usable.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.skip_size == 0 {
            return Err(FormatError::InvalidSkipSize(0));
        }
        Ok(())
    }
}

/// A coder choice together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderParams {
    /// Pass-through.
    None,
    /// Run-length encoding; no parameters.
    Rle,
    /// N-bit packing.
    NBit(NBitParams),
    /// Skipping adaptive Huffman.
    SkipHuffman(SkipHuffmanParams),
}

impl CoderParams {
    /// The coder code of this parameter set.
    pub fn code(&self) -> CoderCode {
        match self {
            CoderParams::None => CoderCode::None,
            CoderParams::Rle => CoderCode::Rle,
            CoderParams::NBit(_) => CoderCode::NBit,
            CoderParams::SkipHuffman(_) => CoderCode::SkipHuffman,
        }
    }

    /// Validate variant parameters.
    pub fn validate(&self) -> Result<(), FormatError> {
        match self {
            CoderParams::None | CoderParams::Rle => Ok(()),
            CoderParams::NBit(p) => p.validate(),
            CoderParams::SkipHuffman(p) => p.validate(),
        }
    }
}

/// The parsed descriptor of a compressed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompHeader {
    /// Uncompressed logical length of the element.
    pub length: u64,
    /// Reference number of the hidden backing element.
    pub comp_ref: u16,
    /// Modeling layer variant.
    pub model: ModelCode,
    /// Coding layer variant and parameters.
    pub coder: CoderParams,
}

impl CompHeader {
    /// Serialize the full descriptor, special code included.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        self.coder.validate()?;
        let mut buf = Vec::with_capacity(32);
        codec::put_u16(&mut buf, SpecialCode::Compressed.code());
        codec::put_u16(&mut buf, COMP_HEADER_VERSION);
        codec::put_off32(&mut buf, self.length)?;
        codec::put_u16(&mut buf, self.comp_ref);
        codec::put_u16(&mut buf, self.model.code());
        codec::put_u16(&mut buf, self.coder.code().code());
        match self.coder {
            CoderParams::None | CoderParams::Rle => {}
            CoderParams::NBit(p) => {
                codec::put_i32(&mut buf, p.number_type.code());
                codec::put_u16(&mut buf, p.sign_ext as u16);
                codec::put_u16(&mut buf, p.fill_one as u16);
                codec::put_i32(&mut buf, p.start_bit as i32);
                codec::put_i32(&mut buf, p.bit_len as i32);
            }
            CoderParams::SkipHuffman(p) => {
                codec::put_u32(&mut buf, p.skip_size);
                // Reserved word; readers ignore its value.
                codec::put_u32(&mut buf, 0);
            }
        }
        Ok(buf)
    }

    /// Parse a full descriptor, special code included.
    pub fn parse(data: &[u8]) -> Result<CompHeader, FormatError> {
        let mut cur = data;
        let code = codec::get_u16(&mut cur)?;
        if SpecialCode::from_code(code)? != SpecialCode::Compressed {
            return Err(FormatError::UnknownSpecialCode(code));
        }
        let version = codec::get_u16(&mut cur)?;
        if version != COMP_HEADER_VERSION {
            return Err(FormatError::UnsupportedHeaderVersion(version));
        }
        let length = codec::get_off32(&mut cur)?;
        let comp_ref = codec::get_u16(&mut cur)?;
        let model = ModelCode::from_code(codec::get_u16(&mut cur)?)?;
        let coder = match CoderCode::from_code(codec::get_u16(&mut cur)?)? {
            CoderCode::None => CoderParams::None,
            CoderCode::Rle => CoderParams::Rle,
            CoderCode::NBit => {
                let nt = codec::get_i32(&mut cur)?;
                let sign_ext = codec::get_u16(&mut cur)? != 0;
                let fill_one = codec::get_u16(&mut cur)? != 0;
                let start_bit = codec::get_i32(&mut cur)?;
                let bit_len = codec::get_i32(&mut cur)?;
                let number_type = NumberType::from_code(nt)?;
                if start_bit < 0 || bit_len < 0 {
                    return Err(FormatError::InvalidBitField {
                        start_bit,
                        bit_len,
                        nt_bits: number_type.size() as u32 * 8,
                    });
                }
                let params = NBitParams {
                    number_type,
                    sign_ext,
                    fill_one,
                    start_bit: start_bit as u32,
                    bit_len: bit_len as u32,
                };
                params.validate()?;
                CoderParams::NBit(params)
            }
            CoderCode::SkipHuffman => {
                let skip_size = codec::get_u32(&mut cur)?;
                let _reserved = codec::get_u32(&mut cur)?;
                let params = SkipHuffmanParams { skip_size };
                params.validate()?;
                CoderParams::SkipHuffman(params)
            }
        };
        Ok(CompHeader {
            length,
            comp_ref,
            model,
            coder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle_header_roundtrip() {
        let hdr = CompHeader {
            length: 256,
            comp_ref: 2,
            model: ModelCode::Stdio,
            coder: CoderParams::Rle,
        };
        let bytes = hdr.encode().unwrap();
        assert_eq!(bytes.len(), 14);
        assert_eq!(CompHeader::parse(&bytes), Ok(hdr));
    }

    #[test]
    fn rle_header_wire_layout() {
        let hdr = CompHeader {
            length: 0x0100,
            comp_ref: 7,
            model: ModelCode::Stdio,
            coder: CoderParams::Rle,
        };
        let bytes = hdr.encode().unwrap();
        assert_eq!(
            bytes,
            [
                0x00, 0x03, // special code
                0x00, 0x00, // header version
                0x00, 0x00, 0x01, 0x00, // uncompressed length
                0x00, 0x07, // comp_ref
                0x00, 0x00, // model code
                0x00, 0x01, // coder code
            ]
        );
    }

    #[test]
    fn nbit_header_roundtrip() {
        let hdr = CompHeader {
            length: 20,
            comp_ref: 9,
            model: ModelCode::Stdio,
            coder: CoderParams::NBit(NBitParams {
                number_type: NumberType::Int32,
                sign_ext: true,
                fill_one: false,
                start_bit: 15,
                bit_len: 8,
            }),
        };
        let bytes = hdr.encode().unwrap();
        assert_eq!(bytes.len(), 14 + 16);
        assert_eq!(CompHeader::parse(&bytes), Ok(hdr));
    }

    #[test]
    fn skphuff_reserved_word_is_zero_and_ignored() {
        let hdr = CompHeader {
            length: 4096,
            comp_ref: 3,
            model: ModelCode::Stdio,
            coder: CoderParams::SkipHuffman(SkipHuffmanParams { skip_size: 4 }),
        };
        let mut bytes = hdr.encode().unwrap();
        assert_eq!(bytes.len(), 14 + 8);
        assert_eq!(&bytes[18..22], &[0, 0, 0, 0]);
        // Any reserved value must parse.
        bytes[18..22].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(CompHeader::parse(&bytes), Ok(hdr));
    }

    #[test]
    fn bad_coder_code_rejected() {
        let hdr = CompHeader {
            length: 1,
            comp_ref: 1,
            model: ModelCode::Stdio,
            coder: CoderParams::None,
        };
        let mut bytes = hdr.encode().unwrap();
        bytes[13] = 0x77;
        assert_eq!(
            CompHeader::parse(&bytes),
            Err(FormatError::UnknownCoderCode(0x77))
        );
    }

    #[test]
    fn bad_header_version_rejected() {
        let hdr = CompHeader {
            length: 1,
            comp_ref: 1,
            model: ModelCode::Stdio,
            coder: CoderParams::None,
        };
        let mut bytes = hdr.encode().unwrap();
        bytes[3] = 1;
        assert_eq!(
            CompHeader::parse(&bytes),
            Err(FormatError::UnsupportedHeaderVersion(1))
        );
    }

    #[test]
    fn nbit_field_must_fit_unit() {
        let params = NBitParams {
            number_type: NumberType::Int8,
            sign_ext: false,
            fill_one: false,
            start_bit: 9,
            bit_len: 4,
        };
        assert!(matches!(
            params.validate(),
            Err(FormatError::InvalidBitField { .. })
        ));
        let params = NBitParams {
            number_type: NumberType::Int8,
            sign_ext: false,
            fill_one: false,
            start_bit: 3,
            bit_len: 6,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn zero_skip_size_rejected() {
        assert_eq!(
            SkipHuffmanParams { skip_size: 0 }.validate(),
            Err(FormatError::InvalidSkipSize(0))
        );
    }

    #[test]
    fn bad_number_type_in_nbit_header() {
        let hdr = CompHeader {
            length: 8,
            comp_ref: 1,
            model: ModelCode::Stdio,
            coder: CoderParams::NBit(NBitParams {
                number_type: NumberType::Int32,
                sign_ext: false,
                fill_one: false,
                start_bit: 7,
                bit_len: 8,
            }),
        };
        let mut bytes = hdr.encode().unwrap();
        // Corrupt the nt code.
        bytes[14..18].copy_from_slice(&99i32.to_be_bytes());
        assert_eq!(
            CompHeader::parse(&bytes),
            Err(FormatError::BadNumberType(99))
        );
    }
}
