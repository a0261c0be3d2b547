//! Raw I/O counters, kept per open file.
//!
//! Every positional read and write against the storage layer bumps these,
//! so callers can observe how much real I/O a sequence of element
//! operations produced.

/// Counters for raw storage traffic of one open file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Number of read operations issued to the storage.
    pub reads: u64,
    /// Number of write operations issued to the storage.
    pub writes: u64,
    /// Total bytes delivered by reads.
    pub bytes_read: u64,
    /// Total bytes submitted by writes.
    pub bytes_written: u64,
}

impl IoStats {
    /// Total operations of either kind.
    pub fn total_ops(&self) -> u64 {
        self.reads + self.writes
    }
}
