//! The access-record table.
//!
//! Every open element handle occupies one slot in a fixed-capacity pool.
//! The opaque [`Aid`] handed to callers is the slot index biased by a
//! cookie in the high bits, so stale or fabricated handles are rejected at
//! resolution time rather than hitting a random live record.

use std::cell::RefCell;
use std::rc::Rc;

use rustyhdf4_format::SpecialCode;

use crate::compress::CompressedInfo;
use crate::error::{Error, Result};

/// Capacity of the access-record pool.
pub const MAX_ACCESS: usize = 256;

const AID_COOKIE: u32 = 0x00AA_0000;
const AID_SLOT_MASK: u32 = 0x0000_FFFF;

/// Opaque handle to an open access record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Aid(pub(crate) u32);

/// One access record: a transient binding of a caller to a DD entry.
#[derive(Default)]
pub(crate) struct AccessRecord {
    pub used: bool,
    /// Slot of the owning file in the file table.
    pub file: usize,
    /// Chain-block index of the element's DD.
    pub block: usize,
    /// Slot index of the element's DD within its block.
    pub slot: usize,
    /// Current logical position within the element.
    pub posn: u64,
    pub writable: bool,
    /// Whether seeks past the end of a regular element are allowed.
    pub appendable: bool,
    /// Special code of the element, `None` for regular elements.
    pub special: Option<SpecialCode>,
    /// Shared compressed-element state, present when `special` is
    /// [`SpecialCode::Compressed`].
    pub comp: Option<Rc<RefCell<CompressedInfo>>>,
}

/// The fixed pool of access records.
pub(crate) struct AccessTable {
    pub records: Vec<AccessRecord>,
}

impl AccessTable {
    pub fn new() -> AccessTable {
        AccessTable {
            records: (0..MAX_ACCESS).map(|_| AccessRecord::default()).collect(),
        }
    }

    /// Claim the first unused slot.
    pub fn acquire(&mut self) -> Result<usize> {
        for (i, rec) in self.records.iter_mut().enumerate() {
            if !rec.used {
                *rec = AccessRecord {
                    used: true,
                    ..AccessRecord::default()
                };
                return Ok(i);
            }
        }
        Err(Error::TooMany)
    }

    /// Free a slot, dropping any variant state it held.
    pub fn release(&mut self, slot: usize) {
        self.records[slot] = AccessRecord::default();
    }

    /// Map an AID back to its slot, rejecting stale or fabricated handles.
    pub fn resolve(&self, aid: Aid) -> Result<usize> {
        if aid.0 & !AID_SLOT_MASK != AID_COOKIE {
            return Err(Error::Args("not an access identifier"));
        }
        let slot = (aid.0 & AID_SLOT_MASK) as usize;
        if slot >= self.records.len() || !self.records[slot].used {
            return Err(Error::Args("access identifier is not open"));
        }
        Ok(slot)
    }

    /// The AID for a claimed slot.
    pub fn aid_for(slot: usize) -> Aid {
        Aid(AID_COOKIE | slot as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let mut t = AccessTable::new();
        let a = t.acquire().unwrap();
        let b = t.acquire().unwrap();
        assert_ne!(a, b);
        let aid = AccessTable::aid_for(a);
        assert_eq!(t.resolve(aid).unwrap(), a);
        t.release(a);
        assert!(t.resolve(aid).is_err());
        // The slot is reusable afterwards.
        assert_eq!(t.acquire().unwrap(), a);
    }

    #[test]
    fn pool_exhaustion() {
        let mut t = AccessTable::new();
        for _ in 0..MAX_ACCESS {
            t.acquire().unwrap();
        }
        assert!(matches!(t.acquire(), Err(Error::TooMany)));
    }

    #[test]
    fn fabricated_aid_rejected() {
        let t = AccessTable::new();
        assert!(matches!(t.resolve(Aid(3)), Err(Error::Args(_))));
        assert!(matches!(
            t.resolve(Aid(0xDEAD_0000)),
            Err(Error::Args(_))
        ));
    }
}
