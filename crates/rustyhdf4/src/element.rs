//! Element access: attach, seek, read, write, inquire, detach.
//!
//! Every operation resolves the AID, then dispatches on the access
//! record's special code: regular elements run raw I/O against their DD's
//! extent, compressed elements drop into the model/coder pipeline. Range
//! and permission checks are uniform across variants and happen here,
//! before dispatch.

use rustyhdf4_format::dd::Dd;
use rustyhdf4_format::{is_special, SpecialCode, FormatError, REF_WILDCARD, TAG_NULL, TAG_WILDCARD};

use crate::access::{AccessTable, Aid};
use crate::error::{Error, Result};
use crate::file::{DdLoc, FileId};

/// Where a seek offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The start of the element.
    Start,
    /// The current position.
    Current,
    /// The end of the element.
    End,
}

/// A snapshot of an access record and its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementInfo {
    /// The owning file.
    pub file_id: FileId,
    /// The element's tag as stored on disk (special bit included).
    pub tag: u16,
    /// The element's reference number.
    pub ref_id: u16,
    /// Logical length of the element.
    pub length: u64,
    /// File offset of the element's data, or of its descriptor for
    /// special elements.
    pub offset: u64,
    /// Current position of this access record.
    pub posn: u64,
    /// Whether the record accepts writes.
    pub writable: bool,
    /// Special code, `None` for regular elements.
    pub special: Option<SpecialCode>,
}

impl crate::Hdf {
    /// Attach to `(tag, ref)` for reading.
    ///
    /// `REF_WILDCARD` attaches to the first element with the tag.
    pub fn start_read(&mut self, fid: FileId, tag: u16, ref_id: u16) -> Result<Aid> {
        let file_slot = self.file_slot(fid)?;
        let loc = self
            .file_ref(file_slot)?
            .lookup(tag, ref_id)
            .ok_or(Error::NotFound { tag, ref_id })?;

        let slot = self.access.acquire()?;
        match self.attach_inner(file_slot, slot, loc, false) {
            Ok(()) => {
                self.file_mut(file_slot)?.attach += 1;
                Ok(AccessTable::aid_for(slot))
            }
            Err(e) => {
                self.access.release(slot);
                Err(e)
            }
        }
    }

    /// Attach to `(tag, ref)` for writing, creating the element with
    /// `length` reserved bytes when it does not exist, and growing an
    /// existing regular element to at least `length`.
    pub fn start_write(&mut self, fid: FileId, tag: u16, ref_id: u16, length: u64) -> Result<Aid> {
        let file_slot = self.file_slot(fid)?;
        if !self.file_ref(file_slot)?.writable() {
            return Err(Error::Denied);
        }
        if is_special(tag) || tag == TAG_NULL || tag == TAG_WILDCARD {
            return Err(Error::Args("tag not usable for writing"));
        }

        let existing = self.file_ref(file_slot)?.lookup(tag, ref_id);
        let slot = self.access.acquire()?;
        let result = match existing {
            Some(loc) => self.attach_existing_for_write(file_slot, slot, loc, length),
            None => self.create_regular(file_slot, slot, tag, ref_id, length),
        };
        match result {
            Ok(()) => {
                self.file_mut(file_slot)?.attach += 1;
                Ok(AccessTable::aid_for(slot))
            }
            Err(e) => {
                self.access.release(slot);
                Err(e)
            }
        }
    }

    /// Write-attach to an existing element, growing a regular one to at
    /// least `length`.
    fn attach_existing_for_write(
        &mut self,
        file_slot: usize,
        slot: usize,
        loc: DdLoc,
        length: u64,
    ) -> Result<()> {
        self.attach_inner(file_slot, slot, loc, true)?;
        if self.access.records[slot].special.is_none() {
            let current = self.file_ref(file_slot)?.dd(loc).length;
            if length > current {
                self.regular_grow(file_slot, loc, length)?;
            }
        }
        Ok(())
    }

    /// Bind the claimed record at `slot` to the DD at `loc`, dispatching
    /// on the element's variant.
    fn attach_inner(&mut self, file_slot: usize, slot: usize, loc: DdLoc, write: bool) -> Result<()> {
        let dd = self.file_ref(file_slot)?.dd(loc);
        {
            let ar = &mut self.access.records[slot];
            ar.file = file_slot;
            ar.block = loc.0;
            ar.slot = loc.1;
            ar.posn = 0;
            ar.writable = write;
            ar.special = None;
        }
        if is_special(dd.tag) {
            let mut code = [0u8; 2];
            self.file_mut(file_slot)?.read_exact_at(dd.offset, &mut code)?;
            let code = u16::from_be_bytes(code);
            if code != SpecialCode::Compressed.code() {
                return Err(Error::Format(FormatError::UnknownSpecialCode(code)));
            }
            self.comp_attach(slot, write)?;
        }
        Ok(())
    }

    /// Create a fresh regular element with `length` bytes reserved.
    fn create_regular(
        &mut self,
        file_slot: usize,
        slot: usize,
        tag: u16,
        ref_id: u16,
        length: u64,
    ) -> Result<()> {
        if ref_id == REF_WILDCARD {
            return Err(Error::Args("ref not usable for a new element"));
        }
        let fr = self.file_mut(file_slot)?;
        let loc = fr.allocate_dd()?;
        let offset = fr.get_disk_block(length)?;
        fr.set_dd(
            loc,
            Dd {
                tag,
                ref_id,
                offset,
                length,
            },
        );
        fr.update_dd(loc.0)?;
        let ar = &mut self.access.records[slot];
        ar.file = file_slot;
        ar.block = loc.0;
        ar.slot = loc.1;
        ar.posn = 0;
        ar.writable = true;
        ar.special = None;
        Ok(())
    }

    /// Logical length of the element behind the record at `slot`.
    fn element_length(&self, slot: usize) -> u64 {
        let ar = &self.access.records[slot];
        if ar.comp.is_some() {
            self.comp_length(slot)
        } else {
            self.file_ref(ar.file)
                .map(|fr| fr.dd((ar.block, ar.slot)).length)
                .unwrap_or(0)
        }
    }

    /// Move the access position.
    ///
    /// A negative resulting position fails with [`Error::Range`]. Seeks
    /// past the end are allowed for compressed elements and for regular
    /// elements flagged [`Hdf::appendable`](crate::Hdf::appendable).
    pub fn seek(&mut self, aid: Aid, offset: i64, origin: Origin) -> Result<()> {
        let slot = self.access.resolve(aid)?;
        let length = self.element_length(slot);
        let base = match origin {
            Origin::Start => 0i128,
            Origin::Current => self.access.records[slot].posn as i128,
            Origin::End => length as i128,
        };
        let target = base + i128::from(offset);
        if target < 0 {
            return Err(Error::Range);
        }
        let target = target as u64;
        let (special, appendable, has_comp) = {
            let ar = &self.access.records[slot];
            (ar.special, ar.appendable, ar.comp.is_some())
        };
        if special.is_none() && target > length && !appendable {
            return Err(Error::Range);
        }
        if has_comp {
            self.comp_seek(slot, target)?;
        }
        self.access.records[slot].posn = target;
        Ok(())
    }

    /// The current access position.
    pub fn tell(&self, aid: Aid) -> Result<u64> {
        let slot = self.access.resolve(aid)?;
        Ok(self.access.records[slot].posn)
    }

    /// Read exactly `buf.len()` bytes at the current position.
    ///
    /// Reading past the element's end fails with [`Error::Range`] and
    /// moves nothing.
    pub fn read(&mut self, aid: Aid, buf: &mut [u8]) -> Result<usize> {
        let slot = self.access.resolve(aid)?;
        let length = self.element_length(slot);
        let posn = self.access.records[slot].posn;
        if posn + buf.len() as u64 > length {
            return Err(Error::Range);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.access.records[slot].comp.is_some() {
            self.comp_read(slot, buf)?;
            self.access.records[slot].posn = posn + buf.len() as u64;
        } else {
            let (file_slot, loc) = {
                let ar = &self.access.records[slot];
                (ar.file, (ar.block, ar.slot))
            };
            let fr = self.file_mut(file_slot)?;
            let offset = fr.dd(loc).offset;
            fr.read_exact_at(offset + posn, buf)?;
            self.access.records[slot].posn = posn + buf.len() as u64;
        }
        Ok(buf.len())
    }

    /// Read from the current position to the end of the element.
    pub fn read_all(&mut self, aid: Aid) -> Result<Vec<u8>> {
        let slot = self.access.resolve(aid)?;
        let length = self.element_length(slot);
        let posn = self.access.records[slot].posn;
        let mut buf = vec![0u8; length.saturating_sub(posn) as usize];
        self.read(aid, &mut buf)?;
        Ok(buf)
    }

    /// Write `data` at the current position.
    ///
    /// Writing beyond the end grows the element. A zero-length write
    /// changes nothing. Compressed elements accept only sequential
    /// writes; anything else fails with [`Error::CannotRandomWrite`].
    pub fn write(&mut self, aid: Aid, data: &[u8]) -> Result<usize> {
        let slot = self.access.resolve(aid)?;
        if !self.access.records[slot].writable {
            return Err(Error::Denied);
        }
        if data.is_empty() {
            return Ok(0);
        }
        if self.access.records[slot].comp.is_some() {
            self.comp_write(slot, data)?;
        } else {
            let (file_slot, loc, posn) = {
                let ar = &self.access.records[slot];
                (ar.file, (ar.block, ar.slot), ar.posn)
            };
            let needed = posn + data.len() as u64;
            if needed > self.file_ref(file_slot)?.dd(loc).length {
                self.regular_grow(file_slot, loc, needed)?;
            }
            let fr = self.file_mut(file_slot)?;
            let offset = fr.dd(loc).offset;
            fr.write_at(offset + posn, data)?;
            self.access.records[slot].posn = needed;
        }
        Ok(data.len())
    }

    /// Allow seeks past the end of a regular element.
    pub fn appendable(&mut self, aid: Aid) -> Result<()> {
        let slot = self.access.resolve(aid)?;
        self.access.records[slot].appendable = true;
        Ok(())
    }

    /// A snapshot of the access record and its element.
    pub fn inquire(&self, aid: Aid) -> Result<ElementInfo> {
        let slot = self.access.resolve(aid)?;
        let length = self.element_length(slot);
        let ar = &self.access.records[slot];
        let fr = self.file_ref(ar.file)?;
        let dd = fr.dd((ar.block, ar.slot));
        Ok(ElementInfo {
            file_id: FileId::for_slot(ar.file),
            tag: dd.tag,
            ref_id: dd.ref_id,
            length,
            offset: dd.offset,
            posn: ar.posn,
            writable: ar.writable,
            special: ar.special,
        })
    }

    /// Detach the access record, flushing any variant state.
    ///
    /// A second call with the same AID fails with [`Error::Args`].
    pub fn endaccess(&mut self, aid: Aid) -> Result<()> {
        let slot = self.access.resolve(aid)?;
        if self.access.records[slot].comp.is_some() {
            self.comp_endaccess(slot)?;
        }
        let file_slot = self.access.records[slot].file;
        self.file_mut(file_slot)?.attach -= 1;
        self.access.release(slot);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Regular-element internals, shared with the compressed backing path
    // -----------------------------------------------------------------------

    /// Grow the regular element at `loc` to `needed` bytes: in place when
    /// its extent ends at EOF, otherwise by relocating the payload. The
    /// vacated region is not reclaimed.
    pub(crate) fn regular_grow(&mut self, file_slot: usize, loc: DdLoc, needed: u64) -> Result<()> {
        let fr = self.file_mut(file_slot)?;
        let mut dd = fr.dd(loc);
        if dd.offset + dd.length == fr.end {
            fr.get_disk_block(needed - dd.length)?;
        } else {
            let mut payload = vec![0u8; dd.length as usize];
            fr.read_exact_at(dd.offset, &mut payload)?;
            let new_offset = fr.get_disk_block(needed)?;
            fr.write_at(new_offset, &payload)?;
            dd.offset = new_offset;
        }
        dd.length = needed;
        fr.set_dd(loc, dd);
        fr.update_dd(loc.0)
    }

    /// Positional clipped read within a regular element.
    pub(crate) fn regular_read_at(&mut self, aid: Aid, pos: u64, buf: &mut [u8]) -> Result<usize> {
        let slot = self.access.resolve(aid)?;
        let (file_slot, loc) = {
            let ar = &self.access.records[slot];
            (ar.file, (ar.block, ar.slot))
        };
        let fr = self.file_mut(file_slot)?;
        let dd = fr.dd(loc);
        if pos >= dd.length {
            return Ok(0);
        }
        let n = buf.len().min((dd.length - pos) as usize);
        let got = fr.read_at_clipped(dd.offset + pos, &mut buf[..n])?;
        Ok(got)
    }

    /// Positional write within a regular element, growing it as needed.
    pub(crate) fn regular_write_at(&mut self, aid: Aid, pos: u64, data: &[u8]) -> Result<()> {
        let slot = self.access.resolve(aid)?;
        let (file_slot, loc) = {
            let ar = &self.access.records[slot];
            (ar.file, (ar.block, ar.slot))
        };
        let needed = pos + data.len() as u64;
        if needed > self.file_ref(file_slot)?.dd(loc).length {
            self.regular_grow(file_slot, loc, needed)?;
        }
        let fr = self.file_mut(file_slot)?;
        let offset = fr.dd(loc).offset;
        fr.write_at(offset + pos, data)
    }
}
