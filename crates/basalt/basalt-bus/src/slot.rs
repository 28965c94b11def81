//! Behavior of the shared slot record: locked reads and overwriting writes.
//!
//! A `SlotHeader` sits at the base of its mapped region with the payload at
//! `SLOT_DATA_OFFSET`. Every method that touches the payload is `unsafe`
//! with the same contract: the header must live at the base of a live
//! mapping at least `SLOT_DATA_OFFSET + capacity` bytes long.

use crate::error::BusError;
use crate::layout::{SLOT_DATA_OFFSET, SLOT_MAGIC, SlotHeader, pack_name, unpack_name};
use crate::rw_mutex::RwReadGuard;
use crate::seq::SequenceCounter;
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};

impl SlotHeader {
    /// A freshly initialized header, for placement into a new slot region.
    pub(crate) fn new(name: &str, index: u32) -> Self {
        Self {
            magic: SLOT_MAGIC,
            lock: Default::default(),
            index,
            seq: SequenceCounter::new(),
            length: AtomicU32::new(0),
            flags: AtomicU32::new(0),
            name: pack_name(name),
        }
    }

    pub(crate) fn magic_ok(&self) -> bool {
        self.magic == SLOT_MAGIC
    }

    pub(crate) fn name(&self) -> &str {
        unpack_name(&self.name)
    }

    #[inline]
    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    fn payload_base(&self) -> *mut u8 {
        // The payload lives in the same mapping, at a fixed offset past us.
        unsafe { (self as *const SlotHeader as *mut u8).add(SLOT_DATA_OFFSET) }
    }

    /// Take the read lock and return a view of the current payload.
    ///
    /// SAFETY: see the module contract.
    pub(crate) unsafe fn read(&self) -> Result<LockedView<'_>, BusError> {
        let guard = self.lock.read().map_err(BusError::Futex)?;
        let len = self.length.load(SeqCst) as usize;
        // SAFETY: `length` never exceeds capacity (enforced on the write
        // side) and the lock keeps writers out while the view lives.
        let bytes = unsafe { std::slice::from_raw_parts(self.payload_base(), len) };
        Ok(LockedView {
            bytes,
            slot: self,
            _guard: guard,
        })
    }

    /// Copy `payload` in under the write lock, then bump the domain counter
    /// with this slot's bit.
    ///
    /// SAFETY: see the module contract; `capacity` must be the true payload
    /// capacity of the region this header heads.
    pub(crate) unsafe fn write(
        &self,
        payload: &[u8],
        capacity: usize,
        domain_seq: &SequenceCounter,
    ) -> Result<(), BusError> {
        if payload.len() > capacity {
            return Err(BusError::PayloadTooLarge {
                len: payload.len(),
                capacity,
            });
        }
        {
            let _w = self.lock.write().map_err(BusError::Futex)?;
            // SAFETY: length checked against capacity above; the write lock
            // excludes every reader and other writer.
            unsafe {
                ptr::copy_nonoverlapping(payload.as_ptr(), self.payload_base(), payload.len());
            }
            self.length.store(payload.len() as u32, SeqCst);
            self.seq.bump_silent();
        }
        // The wake happens outside the write lock so woken subscribers can
        // take their read locks immediately.
        domain_seq.bump(1 << self.index).map_err(BusError::Futex)?;
        Ok(())
    }
}

/// A read-locked window onto a slot's current payload.
///
/// Holds the slot's read lock for as long as it lives; writers to this slot
/// block until it is dropped. Copy the bytes out before dropping the view
/// if they need to be retained.
pub struct LockedView<'a> {
    bytes: &'a [u8],
    slot: &'a SlotHeader,
    _guard: RwReadGuard<'a>,
}

impl LockedView<'_> {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Name of the slot this view reads from.
    pub fn slot_name(&self) -> &str {
        self.slot.name()
    }

    /// Wake-mask bit index of the slot this view reads from.
    pub fn slot_index(&self) -> u32 {
        self.slot.index()
    }
}

impl Deref for LockedView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl std::fmt::Debug for LockedView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedView")
            .field("slot", &self.slot_name())
            .field("len", &self.bytes.len())
            .finish()
    }
}
