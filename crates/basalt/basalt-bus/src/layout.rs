//! Shared binary layout of the bus objects.
//!
//! A domain and each of its slots live at offset 0 of their own fixed-size
//! backing files, mapped shared read-write by every participating process.
//! The layout must therefore be identical in every process: both headers
//! are `#[repr(C)]`, integers are native little-endian, and the slot
//! payload starts at a fixed offset past the slot header.
//!
//! # Domain region
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ magic │ lock │ seq │ slot_region_bytes │ name │ cap │ count  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ name table: [slot name; 32] (bit index = table position)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ unused up to the region size                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Slot region
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ magic │ lock │ index │ seq │ length │ flags │ name │ pad     │  256 B
//! ├──────────────────────────────────────────────────────────────┤
//! │ payload: region size − 256 bytes                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::rw_mutex::RwMutex;
use crate::seq::SequenceCounter;
use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU32;

pub const SLOT_MAGIC: [u8; 4] = *b"slot";
pub const DOMAIN_MAGIC: [u8; 4] = *b"dom ";

/// Name buffer size; names keep one byte for the NUL terminator.
pub const NAME_CAP: usize = 32;

/// Byte offset of the payload from the slot region base. Leaves room for
/// the header to grow without moving payloads.
pub const SLOT_DATA_OFFSET: usize = 256;

/// One bit per slot in the 32-bit wake mask.
pub const MAX_SLOTS: usize = 32;

pub const DEFAULT_PREFIX: &str = "/dev/shm";
pub const DEFAULT_DOMAIN_BYTES: u64 = 4 << 20;
pub const DEFAULT_SLOT_BYTES: u64 = 16 << 20;

/// Header at offset 0 of every slot region.
#[repr(C)]
pub struct SlotHeader {
    pub(crate) magic: [u8; 4],
    pub(crate) lock: RwMutex,
    /// Bit position in the domain wake mask. Assigned once at creation.
    pub(crate) index: u32,
    pub(crate) seq: SequenceCounter,
    /// Current payload length in bytes.
    pub(crate) length: AtomicU32,
    /// Opaque application bits; the bus never interprets them.
    pub(crate) flags: AtomicU32,
    pub(crate) name: [u8; NAME_CAP],
}

const _: () = assert!(
    size_of::<SlotHeader>() <= SLOT_DATA_OFFSET,
    "SlotHeader must fit below the payload offset"
);

/// Header at offset 0 of every domain region.
#[repr(C)]
pub struct DomainHeader {
    pub(crate) magic: [u8; 4],
    /// Registry lock: guards the name table, nothing else.
    pub(crate) lock: RwMutex,
    /// Global counter; bumped with the writing slot's bit on every write.
    pub(crate) seq: SequenceCounter,
    /// Region size used for every slot of this domain.
    pub(crate) slot_region_bytes: u64,
    pub(crate) name: [u8; NAME_CAP],
    pub(crate) slot_capacity: u32,
    pub(crate) slot_count: AtomicU32,
    pub(crate) table: [NameCell; MAX_SLOTS],
}

const _: () = assert!(
    size_of::<DomainHeader>() as u64 <= DEFAULT_DOMAIN_BYTES,
    "DomainHeader must fit the default domain region"
);

// The name table cells are plain bytes mutated under the registry write
// lock, so the header as a whole is safe to share between threads.
unsafe impl Sync for DomainHeader {}

/// A slot-name entry in the domain table. Written once, under the domain's
/// registry write lock; read under the same lock.
#[repr(transparent)]
pub(crate) struct NameCell(UnsafeCell<[u8; NAME_CAP]>);

impl NameCell {
    pub(crate) const fn empty() -> Self {
        Self(UnsafeCell::new([0; NAME_CAP]))
    }

    /// SAFETY: caller holds the domain registry lock (read or write for
    /// `get`, write for `set`).
    pub(crate) unsafe fn get(&self) -> &[u8; NAME_CAP] {
        unsafe { &*self.0.get() }
    }

    pub(crate) unsafe fn set(&self, name: &str) {
        unsafe { *self.0.get() = pack_name(name) };
    }
}

/// Copy `name` into a NUL-padded fixed buffer. Callers validate length
/// first; anything longer than `NAME_CAP - 1` is truncated.
pub(crate) fn pack_name(name: &str) -> [u8; NAME_CAP] {
    let mut buf = [0u8; NAME_CAP];
    let n = name.len().min(NAME_CAP - 1);
    buf[..n].copy_from_slice(&name.as_bytes()[..n]);
    buf
}

/// The name stored in a fixed buffer, up to the first NUL.
pub(crate) fn unpack_name(buf: &[u8; NAME_CAP]) -> &str {
    let n = buf.iter().position(|&b| b == 0).unwrap_or(NAME_CAP);
    std::str::from_utf8(&buf[..n]).unwrap_or("")
}
