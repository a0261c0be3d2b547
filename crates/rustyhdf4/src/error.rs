//! Error types for the library.

use std::fmt;

use rustyhdf4_format::FormatError;

/// Errors returned by container operations.
#[derive(Debug)]
pub enum Error {
    /// An argument failed validity checking at entry (forbidden tag, stale
    /// access identifier, wrong storage kind).
    Args(&'static str),
    /// The operation needs an access mode the file was not opened with.
    Denied,
    /// The access-record pool is exhausted.
    TooMany,
    /// No element with the requested tag and reference number.
    NotFound {
        /// The tag looked up.
        tag: u16,
        /// The reference number looked up.
        ref_id: u16,
    },
    /// An offset or length fell outside the element.
    Range,
    /// Disk-block allocation would exceed the container's addressable size.
    NoSpace,
    /// The file still has attached access records.
    Busy,
    /// All 16-bit reference numbers are in use.
    RefsExhausted,
    /// The element is already special and cannot be specialized again.
    CannotModify,
    /// A write at a non-terminal position of a compressed element.
    CannotRandomWrite,
    /// A compressed payload is structurally invalid.
    Corrupt(&'static str),
    /// An internal invariant was violated.
    Internal(&'static str),
    /// I/O error from the storage layer.
    Io(std::io::Error),
    /// Low-level format parsing or serialization error.
    Format(FormatError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Args(what) => write!(f, "invalid argument: {what}"),
            Error::Denied => write!(f, "access denied"),
            Error::TooMany => write!(f, "too many open access records"),
            Error::NotFound { tag, ref_id } => {
                write!(f, "no element with tag {tag}, ref {ref_id}")
            }
            Error::Range => write!(f, "offset or length out of range"),
            Error::NoSpace => write!(f, "container size limit exceeded"),
            Error::Busy => write!(f, "file has attached access records"),
            Error::RefsExhausted => write!(f, "reference numbers exhausted"),
            Error::CannotModify => write!(f, "element is already special"),
            Error::CannotRandomWrite => {
                write!(f, "random write into a compressed element")
            }
            Error::Corrupt(what) => write!(f, "corrupt compressed data: {what}"),
            Error::Internal(what) => write!(f, "internal error: {what}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Format(e) => write!(f, "format error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
