//! Pure-Rust core of the HDF4 container format.
//!
//! An HDF4 file is a random-access, self-describing container: typed data
//! objects are located by `(tag, ref)` identifiers recorded in a chain of
//! Data Descriptor blocks, and selected objects are stored compressed
//! behind a model/coder pipeline that the access layer makes transparent.
//!
//! All state lives in an explicit [`Hdf`] context; files and open
//! elements are addressed through the opaque [`FileId`] and [`Aid`]
//! handles it returns.
//!
//! # Writing and reading an element
//!
//! ```no_run
//! use rustyhdf4::{AccessMode, Hdf};
//!
//! let mut hdf = Hdf::new();
//! let f = hdf.open("data.hdf", AccessMode::Create).unwrap();
//! hdf.put_element(f, 1962, 1, b"hello").unwrap();
//! hdf.close(f).unwrap();
//!
//! let f = hdf.open("data.hdf", AccessMode::Read).unwrap();
//! assert_eq!(hdf.get_element(f, 1962, 1).unwrap(), b"hello");
//! ```
//!
//! # Transparent compression
//!
//! ```no_run
//! use rustyhdf4::{CoderParams, Hdf, ModelCode};
//!
//! let mut hdf = Hdf::new();
//! let f = hdf.create_memory().unwrap();
//! let aid = hdf
//!     .create_compressed(f, 720, 1, ModelCode::Stdio, CoderParams::Rle)
//!     .unwrap();
//! hdf.write(aid, &[0xAA; 256]).unwrap();
//! hdf.endaccess(aid).unwrap();
//! ```

pub mod error;
pub mod stats;

mod access;
mod compress;
mod context;
mod element;
mod file;

pub use access::Aid;
pub use compress::CompressedElementInfo;
pub use element::{ElementInfo, Origin};
pub use error::{Error, Result};
pub use file::{AccessMode, FileId};
pub use stats::IoStats;

// The wire-level vocabulary shared with the format layer.
pub use rustyhdf4_format::{
    CoderCode, CoderParams, ModelCode, NBitParams, NumberType, SkipHuffmanParams, SpecialCode,
    REF_WILDCARD, TAG_COMPRESSED, TAG_LINKED, TAG_NULL, TAG_VERSION, TAG_WILDCARD,
};

/// The library context: the open-file table and the access-record pool.
///
/// Single-threaded by design; wrap the whole context in a lock to share
/// it across threads.
pub struct Hdf {
    pub(crate) files: Vec<Option<file::FileRecord>>,
    pub(crate) access: access::AccessTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_file_roundtrip() {
        let mut hdf = Hdf::new();
        let f = hdf.create_memory().unwrap();
        hdf.put_element(f, 100, 1, b"payload").unwrap();
        let bytes = hdf.into_bytes(f).unwrap();

        let f = hdf.open_bytes(bytes, AccessMode::Read).unwrap();
        assert_eq!(hdf.get_element(f, 100, 1).unwrap(), b"payload");
        hdf.close(f).unwrap();
    }

    #[test]
    fn stale_file_id_rejected() {
        let mut hdf = Hdf::new();
        let f = hdf.create_memory().unwrap();
        hdf.close(f).unwrap();
        assert!(matches!(hdf.new_ref(f), Err(Error::Args(_))));
    }

    #[test]
    fn close_with_open_aid_is_busy() {
        let mut hdf = Hdf::new();
        let f = hdf.create_memory().unwrap();
        let aid = hdf.start_write(f, 100, 1, 4).unwrap();
        assert!(matches!(hdf.close(f), Err(Error::Busy)));
        hdf.endaccess(aid).unwrap();
        hdf.close(f).unwrap();
    }
}
