//! Compressed elements: creation, attachment, and I/O plumbing.
//!
//! A compressed element owns two DDs. The visible one (its tag carries the
//! special bit) points at the descriptor parsed by
//! [`rustyhdf4_format::CompHeader`]; the hidden one, keyed by
//! `(TAG_COMPRESSED, comp_ref)`, holds the raw coder output and is opened
//! as an ordinary nested access record. Dispatch drops into the model,
//! the model drives the coder, and the coder does positional byte I/O
//! against the backing element through [`coder::ByteStream`].

pub(crate) mod bitio;
pub(crate) mod coder;
pub(crate) mod model;
pub(crate) mod nbit;
pub(crate) mod none;
pub(crate) mod rle;
pub(crate) mod skphuff;

use std::cell::RefCell;
use std::rc::Rc;

use rustyhdf4_format::dd::Dd;
use rustyhdf4_format::{
    codec, is_special, make_special, CoderCode, CoderParams, CompHeader, ModelCode, SpecialCode,
    COMP_START_BLOCK, REF_WILDCARD, TAG_COMPRESSED, TAG_NULL,
};

use self::coder::{ByteStream, CoderMode, CoderState};
use self::model::ModelState;
use crate::access::{AccessTable, Aid};
use crate::error::{Error, Result};
use crate::file::{DdLoc, FileId, FileRecord};
use crate::Hdf;

/// Shared state of one open compressed element.
///
/// Access records attached to the same `(tag, ref)` share one of these
/// through `Rc<RefCell<_>>`; `attached` counts them, and the backing
/// access record is closed when the last one detaches.
pub(crate) struct CompressedInfo {
    /// Uncompressed logical length.
    pub length: u64,
    /// Reference number of the backing element.
    pub comp_ref: u16,
    /// Number of access records sharing this state.
    pub attached: u32,
    /// Nested access record on `(TAG_COMPRESSED, comp_ref)`.
    pub backing: Aid,
    /// The modeling layer, which owns the coder.
    pub model: ModelState,
}

/// Variant-specific information about a compressed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedElementInfo {
    /// The modeling variant.
    pub model: ModelCode,
    /// The coding variant.
    pub coder: CoderCode,
    /// On-disk size of the backing element.
    pub comp_size: u64,
}

/// Positional view of the backing element, handed to coders.
pub(crate) struct BackingStream<'a> {
    pub hdf: &'a mut Hdf,
    pub aid: Aid,
}

impl ByteStream for BackingStream<'_> {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        self.hdf.regular_read_at(self.aid, pos, buf)
    }

    fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        self.hdf.regular_write_at(self.aid, pos, data)
    }
}

fn find_dd_slot(fr: &FileRecord, dd: Dd) -> Option<DdLoc> {
    for (b, cb) in fr.blocks.iter().enumerate() {
        for (s, slot_dd) in cb.block.slots.iter().enumerate() {
            if *slot_dd == dd {
                return Some((b, s));
            }
        }
    }
    None
}

impl Hdf {
    /// Create a compressed element, migrating any existing regular data at
    /// the same `(tag, ref)` into it.
    ///
    /// Fails with [`Error::CannotModify`] when `(tag, ref)` already names
    /// a special element.
    pub fn create_compressed(
        &mut self,
        fid: FileId,
        tag: u16,
        ref_id: u16,
        model: ModelCode,
        coder: CoderParams,
    ) -> Result<Aid> {
        let file_slot = self.file_slot(fid)?;
        if is_special(tag) || tag == TAG_NULL || tag == rustyhdf4_format::TAG_WILDCARD {
            return Err(Error::Args("tag not usable for a new element"));
        }
        if ref_id == REF_WILDCARD {
            return Err(Error::Args("ref not usable for a new element"));
        }
        coder.validate()?;
        if !self.file_ref(file_slot)?.writable() {
            return Err(Error::Denied);
        }

        let slot = self.access.acquire()?;
        match self.create_compressed_inner(file_slot, slot, tag, ref_id, model, coder) {
            Ok(aid) => Ok(aid),
            Err(e) => {
                // Release whatever the failing path had acquired.
                if let Some(rc) = self.access.records[slot].comp.take() {
                    let backing = {
                        let mut info = rc.borrow_mut();
                        info.attached -= 1;
                        (info.attached == 0).then_some(info.backing)
                    };
                    if let Some(backing) = backing {
                        let _ = self.endaccess(backing);
                    }
                }
                self.access.release(slot);
                Err(e)
            }
        }
    }

    fn create_compressed_inner(
        &mut self,
        file_slot: usize,
        slot: usize,
        tag: u16,
        ref_id: u16,
        model: ModelCode,
        coder: CoderParams,
    ) -> Result<Aid> {
        let fid = FileId::for_slot(file_slot);

        // An existing regular element gets migrated; an existing special
        // element cannot be specialized again.
        let existing = {
            let fr = self.file_ref(file_slot)?;
            match fr.lookup(tag, ref_id) {
                Some(loc) => {
                    let dd = fr.dd(loc);
                    if is_special(dd.tag) {
                        return Err(Error::CannotModify);
                    }
                    Some(dd)
                }
                None => None,
            }
        };

        let length = match existing {
            Some(dd) => dd.length,
            None => COMP_START_BLOCK,
        };

        let (loc, comp_ref) = {
            let fr = self.file_mut(file_slot)?;
            let loc = fr.allocate_dd()?;
            let comp_ref = fr.new_ref()?;
            let header = CompHeader {
                length,
                comp_ref,
                model,
                coder,
            };
            let bytes = header.encode()?;
            let offset = fr.get_disk_block(bytes.len() as u64)?;
            fr.write_at(offset, &bytes)?;
            fr.set_dd(
                loc,
                Dd {
                    tag: make_special(tag),
                    ref_id,
                    offset,
                    length: bytes.len() as u64,
                },
            );
            fr.update_dd(loc.0)?;
            (loc, comp_ref)
        };

        {
            let ar = &mut self.access.records[slot];
            ar.file = file_slot;
            ar.block = loc.0;
            ar.slot = loc.1;
            ar.posn = 0;
            ar.writable = true;
            ar.special = Some(SpecialCode::Compressed);
        }

        // Eagerly create the backing element so later writes only extend it.
        let backing_len = match coder {
            CoderParams::None => length.max(COMP_START_BLOCK),
            _ => COMP_START_BLOCK,
        };
        let backing = self.start_write(fid, TAG_COMPRESSED, comp_ref, backing_len)?;

        let coder_state = CoderState::new(&coder, CoderMode::Write);
        let rc = Rc::new(RefCell::new(CompressedInfo {
            length,
            comp_ref,
            attached: 1,
            backing,
            model: ModelState::new(model, coder_state),
        }));
        self.access.records[slot].comp = Some(rc);

        // Pump existing data through the pipeline, then drop the old DD.
        // The freed payload region is not reclaimed.
        if let Some(old_dd) = existing {
            let mut buf = vec![0u8; old_dd.length as usize];
            self.file_mut(file_slot)?
                .read_exact_at(old_dd.offset, &mut buf)?;
            // The index now maps (tag, ref) to the new descriptor, so
            // locate the old slot by its exact contents.
            let old_loc = find_dd_slot(self.file_ref(file_slot)?, old_dd);
            self.comp_write(slot, &buf)?;
            self.comp_seek(slot, 0)?;
            self.access.records[slot].posn = 0;
            if let Some(old_loc) = old_loc {
                self.file_mut(file_slot)?.free_slot_at(old_loc)?;
            }
        }

        self.file_mut(file_slot)?.attach += 1;
        Ok(AccessTable::aid_for(slot))
    }

    /// Attach the access record at `slot` to an existing compressed
    /// element whose DD it already names.
    pub(crate) fn comp_attach(&mut self, slot: usize, write: bool) -> Result<()> {
        let (file_slot, loc) = {
            let ar = &self.access.records[slot];
            (ar.file, (ar.block, ar.slot))
        };

        // Access records attached to the same element share one state.
        if let Some(rc) = self.find_shared(file_slot, loc, slot) {
            rc.borrow_mut().attached += 1;
            let ar = &mut self.access.records[slot];
            ar.special = Some(SpecialCode::Compressed);
            ar.comp = Some(rc);
            return Ok(());
        }

        let header = {
            let fr = self.file_mut(file_slot)?;
            let dd = fr.dd(loc);
            let mut desc = vec![0u8; dd.length as usize];
            fr.read_exact_at(dd.offset, &mut desc)?;
            CompHeader::parse(&desc)?
        };

        let fid = FileId::for_slot(file_slot);
        let backing = if write {
            let init = match header.coder {
                CoderParams::None => header.length.max(COMP_START_BLOCK),
                _ => COMP_START_BLOCK,
            };
            self.start_write(fid, TAG_COMPRESSED, header.comp_ref, init)?
        } else {
            self.start_read(fid, TAG_COMPRESSED, header.comp_ref)?
        };

        let mode = if write {
            CoderMode::Write
        } else {
            CoderMode::Read
        };
        let coder_state = CoderState::new(&header.coder, mode);
        let rc = Rc::new(RefCell::new(CompressedInfo {
            length: header.length,
            comp_ref: header.comp_ref,
            attached: 1,
            backing,
            model: ModelState::new(header.model, coder_state),
        }));
        let ar = &mut self.access.records[slot];
        ar.special = Some(SpecialCode::Compressed);
        ar.comp = Some(rc);
        Ok(())
    }

    fn find_shared(
        &self,
        file_slot: usize,
        loc: DdLoc,
        exclude: usize,
    ) -> Option<Rc<RefCell<CompressedInfo>>> {
        for (i, rec) in self.access.records.iter().enumerate() {
            if i != exclude && rec.used && rec.file == file_slot && (rec.block, rec.slot) == loc {
                if let Some(rc) = &rec.comp {
                    return Some(rc.clone());
                }
            }
        }
        None
    }

    /// The logical length of the compressed element at `slot`.
    pub(crate) fn comp_length(&self, slot: usize) -> u64 {
        let rc = self.access.records[slot]
            .comp
            .as_ref()
            .expect("compressed state");
        let length = rc.borrow().length;
        length
    }

    pub(crate) fn comp_read(&mut self, slot: usize, buf: &mut [u8]) -> Result<()> {
        let posn = self.access.records[slot].posn;
        let rc = self.access.records[slot]
            .comp
            .clone()
            .ok_or(Error::Internal("compressed state missing"))?;
        let mut info = rc.borrow_mut();
        let backing = info.backing;
        let mut io = BackingStream {
            hdf: self,
            aid: backing,
        };
        info.model.read(&mut io, posn, buf)
    }

    pub(crate) fn comp_write(&mut self, slot: usize, data: &[u8]) -> Result<()> {
        let posn = self.access.records[slot].posn;
        let rc = self.access.records[slot]
            .comp
            .clone()
            .ok_or(Error::Internal("compressed state missing"))?;
        {
            let mut info = rc.borrow_mut();
            let backing = info.backing;
            let mut io = BackingStream {
                hdf: self,
                aid: backing,
            };
            info.model.write(&mut io, posn, data)?;
        }

        let new_posn = posn + data.len() as u64;
        self.access.records[slot].posn = new_posn;

        // Appends grow the element; the descriptor's length field is
        // rewritten in place.
        let mut info = rc.borrow_mut();
        if new_posn > info.length {
            info.length = new_posn;
            let (file_slot, loc) = {
                let ar = &self.access.records[slot];
                (ar.file, (ar.block, ar.slot))
            };
            let mut bytes = Vec::with_capacity(4);
            codec::put_off32(&mut bytes, info.length)?;
            let fr = self.file_mut(file_slot)?;
            let desc_offset = fr.dd(loc).offset;
            fr.write_at(desc_offset + 4, &bytes)?;
        }
        Ok(())
    }

    pub(crate) fn comp_seek(&mut self, slot: usize, posn: u64) -> Result<()> {
        let rc = self.access.records[slot]
            .comp
            .clone()
            .ok_or(Error::Internal("compressed state missing"))?;
        let mut info = rc.borrow_mut();
        let backing = info.backing;
        let mut io = BackingStream {
            hdf: self,
            aid: backing,
        };
        info.model.seek(&mut io, posn)
    }

    /// Flush the pipeline and drop this record's share of the state,
    /// closing the backing element with the last detach.
    pub(crate) fn comp_endaccess(&mut self, slot: usize) -> Result<()> {
        let rc = self.access.records[slot]
            .comp
            .clone()
            .ok_or(Error::Internal("compressed state missing"))?;
        {
            let mut info = rc.borrow_mut();
            let backing = info.backing;
            let mut io = BackingStream {
                hdf: self,
                aid: backing,
            };
            info.model.flush(&mut io)?;
        }
        self.access.records[slot].comp = None;
        let backing = {
            let mut info = rc.borrow_mut();
            info.attached -= 1;
            (info.attached == 0).then_some(info.backing)
        };
        if let Some(backing) = backing {
            self.endaccess(backing)?;
        }
        Ok(())
    }

    /// Variant-specific information about the compressed element behind
    /// `aid`, or `None` for a regular element.
    pub fn special_info(&self, aid: Aid) -> Result<Option<CompressedElementInfo>> {
        let slot = self.access.resolve(aid)?;
        let Some(rc) = self.access.records[slot].comp.clone() else {
            return Ok(None);
        };
        let info = rc.borrow();
        let file_slot = self.access.records[slot].file;
        let fr = self.file_ref(file_slot)?;
        let comp_size = fr
            .lookup(TAG_COMPRESSED, info.comp_ref)
            .map(|loc| fr.dd(loc).length)
            .unwrap_or(0);
        Ok(Some(CompressedElementInfo {
            model: info.model.code(),
            coder: info.model.coder().code(),
            comp_size,
        }))
    }
}
