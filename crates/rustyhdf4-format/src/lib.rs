//! Pure-Rust HDF4 binary container format parsing and serialization.
//!
//! This crate provides the low-level on-disk structures of an HDF4 file:
//! the magic signature, the chained Data Descriptor (DD) blocks that index
//! every data object by `(tag, ref)`, and the descriptors of "special"
//! elements whose DD redirects to the real payload (compressed elements).
//! It supports `no_std` environments with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod codec;
pub mod dd;
pub mod error;
pub mod magic;
pub mod numtype;
pub mod special;
pub mod tag;

pub use dd::{Dd, DdBlock, DD_BLOCK_HEADER_SIZE, DD_SLOT_SIZE, DEFAULT_NDDS};
pub use error::FormatError;
pub use magic::{check_magic, FIRST_BLOCK_OFFSET, HDF_MAGIC};
pub use numtype::NumberType;
pub use special::{
    CoderCode, CoderParams, CompHeader, ModelCode, NBitParams, SkipHuffmanParams,
    COMP_HEADER_VERSION, COMP_START_BLOCK,
};
pub use tag::{
    base_tag, is_special, make_special, SpecialCode, REF_WILDCARD, SPECIAL_BIT, TAG_COMPRESSED,
    TAG_LINKED, TAG_NULL, TAG_VERSION, TAG_WILDCARD,
};
