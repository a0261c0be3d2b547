//! File lifecycle and whole-element helpers on the library context.

use rustyhdf4_format::{is_special, CompHeader, FormatError, SpecialCode, DEFAULT_NDDS};
use rustyhdf4_io::{FileStorage, MemoryStorage};

use crate::error::{Error, Result};
use crate::file::{AccessMode, FileId, FileRecord};
use crate::stats::IoStats;
use crate::Hdf;

impl Hdf {
    /// A context with no open files.
    pub fn new() -> Hdf {
        Hdf {
            files: Vec::new(),
            access: crate::access::AccessTable::new(),
        }
    }

    /// Open a container file.
    ///
    /// [`AccessMode::Create`] truncates any existing file and initializes
    /// a fresh container.
    pub fn open<P: AsRef<std::path::Path>>(&mut self, path: P, mode: AccessMode) -> Result<FileId> {
        let record = match mode {
            AccessMode::Create => {
                let storage = FileStorage::create(path)?;
                FileRecord::create(Box::new(storage), DEFAULT_NDDS)?
            }
            AccessMode::Read | AccessMode::ReadWrite => {
                let storage = FileStorage::open(path, matches!(mode, AccessMode::ReadWrite))?;
                FileRecord::open(Box::new(storage), mode)?
            }
        };
        Ok(self.insert_file(record))
    }

    /// Create a container file whose new DD blocks carry `ndds` slots.
    pub fn create_with_ndds<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
        ndds: u16,
    ) -> Result<FileId> {
        if ndds == 0 {
            return Err(Error::Args("DD block size must be nonzero"));
        }
        let storage = FileStorage::create(path)?;
        let record = FileRecord::create(Box::new(storage), ndds)?;
        Ok(self.insert_file(record))
    }

    /// Create a fresh in-memory container.
    pub fn create_memory(&mut self) -> Result<FileId> {
        let record = FileRecord::create(Box::new(MemoryStorage::new()), DEFAULT_NDDS)?;
        Ok(self.insert_file(record))
    }

    /// Open a container held in a byte vector.
    pub fn open_bytes(&mut self, bytes: Vec<u8>, mode: AccessMode) -> Result<FileId> {
        if matches!(mode, AccessMode::Create) {
            return Err(Error::Args("use create_memory for a fresh in-memory file"));
        }
        let record = FileRecord::open(Box::new(MemoryStorage::from_bytes(bytes)), mode)?;
        Ok(self.insert_file(record))
    }

    /// Close a file. Fails with [`Error::Busy`] while access records are
    /// still attached.
    pub fn close(&mut self, fid: FileId) -> Result<()> {
        let slot = self.file_slot(fid)?;
        let fr = self.file_mut(slot)?;
        if fr.attach > 0 {
            return Err(Error::Busy);
        }
        fr.flush()?;
        self.files[slot] = None;
        Ok(())
    }

    /// Close an in-memory file and return its bytes.
    pub fn into_bytes(&mut self, fid: FileId) -> Result<Vec<u8>> {
        let slot = self.file_slot(fid)?;
        if self.file_ref(slot)?.attach > 0 {
            return Err(Error::Busy);
        }
        let record = self.files[slot]
            .take()
            .ok_or(Error::Args("file identifier is not open"))?;
        record.into_bytes()
    }

    /// The next unused reference number for the file.
    pub fn new_ref(&mut self, fid: FileId) -> Result<u16> {
        let slot = self.file_slot(fid)?;
        self.file_mut(slot)?.new_ref()
    }

    /// Remove `(tag, ref)` from the file.
    ///
    /// The element's payload bytes are not reclaimed.
    pub fn delete(&mut self, fid: FileId, tag: u16, ref_id: u16) -> Result<()> {
        let slot = self.file_slot(fid)?;
        let fr = self.file_mut(slot)?;
        if !fr.writable() {
            return Err(Error::Denied);
        }
        fr.delete_dd(tag, ref_id)
    }

    /// Logical length of `(tag, ref)` without attaching to it.
    pub fn length(&mut self, fid: FileId, tag: u16, ref_id: u16) -> Result<u64> {
        let slot = self.file_slot(fid)?;
        let fr = self.file_mut(slot)?;
        let loc = fr
            .lookup(tag, ref_id)
            .ok_or(Error::NotFound { tag, ref_id })?;
        let dd = fr.dd(loc);
        if !is_special(dd.tag) {
            return Ok(dd.length);
        }
        let mut desc = vec![0u8; dd.length as usize];
        fr.read_exact_at(dd.offset, &mut desc)?;
        let mut code = &desc[..];
        let code = rustyhdf4_format::codec::get_u16(&mut code)?;
        if code != SpecialCode::Compressed.code() {
            return Err(Error::Format(FormatError::UnknownSpecialCode(code)));
        }
        Ok(CompHeader::parse(&desc)?.length)
    }

    /// Write a whole element in one call, creating or overwriting it.
    pub fn put_element(&mut self, fid: FileId, tag: u16, ref_id: u16, data: &[u8]) -> Result<()> {
        let aid = self.start_write(fid, tag, ref_id, data.len() as u64)?;
        let wrote = self.write(aid, data);
        let ended = self.endaccess(aid);
        wrote?;
        ended
    }

    /// Read a whole element in one call.
    pub fn get_element(&mut self, fid: FileId, tag: u16, ref_id: u16) -> Result<Vec<u8>> {
        let aid = self.start_read(fid, tag, ref_id)?;
        let data = self.read_all(aid);
        let ended = self.endaccess(aid);
        let data = data?;
        ended?;
        Ok(data)
    }

    /// Raw I/O counters of the file.
    pub fn io_stats(&self, fid: FileId) -> Result<IoStats> {
        let slot = self.file_slot(fid)?;
        Ok(self.file_ref(slot)?.stats)
    }

    // -----------------------------------------------------------------------
    // Internal plumbing
    // -----------------------------------------------------------------------

    fn insert_file(&mut self, record: FileRecord) -> FileId {
        for (i, f) in self.files.iter_mut().enumerate() {
            if f.is_none() {
                *f = Some(record);
                return FileId::for_slot(i);
            }
        }
        self.files.push(Some(record));
        FileId::for_slot(self.files.len() - 1)
    }

    pub(crate) fn file_slot(&self, fid: FileId) -> Result<usize> {
        let slot = fid.slot()?;
        if slot >= self.files.len() || self.files[slot].is_none() {
            return Err(Error::Args("file identifier is not open"));
        }
        Ok(slot)
    }

    pub(crate) fn file_ref(&self, slot: usize) -> Result<&FileRecord> {
        self.files
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(Error::Args("file identifier is not open"))
    }

    pub(crate) fn file_mut(&mut self, slot: usize) -> Result<&mut FileRecord> {
        self.files
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or(Error::Args("file identifier is not open"))
    }
}

impl Default for Hdf {
    fn default() -> Self {
        Self::new()
    }
}
