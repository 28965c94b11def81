//! Behavior of the shared domain record: the slot-name registry and the
//! global wake counter.
//!
//! The registry maps slot names to wake-mask bit indices. An index is the
//! name's position in the table, so assignment is append-only and an index,
//! once handed out, is stable for the life of the bus. All table access
//! happens under the domain's registry write lock; the global sequence
//! counter is never behind that lock (writers bump it with plain
//! fetch-add).

use crate::error::BusError;
use crate::layout::{DOMAIN_MAGIC, DomainHeader, MAX_SLOTS, NameCell, pack_name, unpack_name};
use crate::seq::SequenceCounter;
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};

impl DomainHeader {
    /// A freshly initialized header, for placement into a new domain region.
    pub(crate) fn new(name: &str, slot_region_bytes: u64) -> Self {
        Self {
            magic: DOMAIN_MAGIC,
            lock: Default::default(),
            seq: SequenceCounter::new(),
            slot_region_bytes,
            name: pack_name(name),
            slot_capacity: MAX_SLOTS as u32,
            slot_count: AtomicU32::new(0),
            table: std::array::from_fn(|_| NameCell::empty()),
        }
    }

    pub(crate) fn magic_ok(&self) -> bool {
        self.magic == DOMAIN_MAGIC
    }

    pub(crate) fn name(&self) -> &str {
        unpack_name(&self.name)
    }

    #[inline]
    pub(crate) fn slot_region_bytes(&self) -> u64 {
        self.slot_region_bytes
    }

    pub(crate) fn slot_count(&self) -> u32 {
        self.slot_count.load(SeqCst)
    }

    /// Return `name`'s wake-mask bit index, assigning the next free one when
    /// the name is new. Errors when the table is full.
    pub(crate) fn register_slot(&self, name: &str) -> Result<u32, BusError> {
        let _g = self.lock.write().map_err(BusError::Futex)?;

        let count = self.slot_count.load(SeqCst);
        for i in 0..count {
            // SAFETY: we hold the registry write lock.
            let entry = unsafe { self.table[i as usize].get() };
            if unpack_name(entry) == name {
                return Ok(i);
            }
        }
        if count >= self.slot_capacity {
            return Err(BusError::SlotTableFull(self.slot_capacity));
        }
        // SAFETY: we hold the registry write lock.
        unsafe { self.table[count as usize].set(name) };
        self.slot_count.store(count + 1, SeqCst);
        Ok(count)
    }
}
