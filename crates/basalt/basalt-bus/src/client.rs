//! Per-process handles over the shared objects.
//!
//! A `ClientDomain` owns the mapping of one domain region plus a
//! process-private cache from slot name to `ClientSlot`. Each `ClientSlot`
//! owns the mapping of its slot region and shares the domain mapping
//! through an `Arc`, so the domain region always outlives every slot
//! handle, waiter, and locked view derived from it. Cross-process
//! references are names, never pointers: two processes map the same files
//! at whatever addresses they get.

use crate::error::BusError;
use crate::layout::{
    DEFAULT_DOMAIN_BYTES, DEFAULT_PREFIX, DEFAULT_SLOT_BYTES, DomainHeader, NAME_CAP,
    SLOT_DATA_OFFSET, SlotHeader,
};
use crate::slot::LockedView;
use basalt_mmap::{Region, RegionBuilder};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Where and how big the backing regions are.
#[derive(Debug, Clone)]
pub struct DomainOptions {
    /// Directory holding the backing files, normally a tmpfs.
    pub prefix: PathBuf,
    pub domain_bytes: u64,
    pub slot_bytes: u64,
}

impl Default for DomainOptions {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from(DEFAULT_PREFIX),
            domain_bytes: DEFAULT_DOMAIN_BYTES,
            slot_bytes: DEFAULT_SLOT_BYTES,
        }
    }
}

/// The domain mapping, shared by every handle derived from the domain.
pub(crate) struct DomainShared {
    region: Region,
    prefix: PathBuf,
}

impl DomainShared {
    pub(crate) fn header(&self) -> &DomainHeader {
        // SAFETY: the region is at least DEFAULT_DOMAIN_BYTES (checked at
        // open), the header was placement-initialized by the creating
        // process, and the magic was verified before this struct existed.
        unsafe { &*(self.region.as_ptr() as *const DomainHeader) }
    }
}

/// Process-local handle to a named bus.
pub struct ClientDomain {
    shared: Arc<DomainShared>,
    slots: Mutex<HashMap<String, Arc<ClientSlot>>>,
}

impl ClientDomain {
    /// Open the domain called `name` under the default tmpfs prefix,
    /// creating and initializing it when this is the first process in.
    pub fn open_or_create(name: &str) -> Result<Self, BusError> {
        Self::open_or_create_with(name, &DomainOptions::default())
    }

    pub fn open_or_create_with(name: &str, opts: &DomainOptions) -> Result<Self, BusError> {
        validate_name(name)?;
        if opts.domain_bytes < size_of::<DomainHeader>() as u64 {
            return Err(BusError::RegionTooSmall {
                kind: "domain",
                bytes: opts.domain_bytes,
            });
        }
        if opts.slot_bytes < SLOT_DATA_OFFSET as u64 {
            return Err(BusError::RegionTooSmall {
                kind: "slot",
                bytes: opts.slot_bytes,
            });
        }
        let region = RegionBuilder::new()
            .path(opts.prefix.join(name))
            .size(opts.domain_bytes)
            .allow_create()
            .build()?;

        let ptr = region.as_ptr() as *mut DomainHeader;
        if region.created() {
            tracing::debug!(domain = name, "initializing fresh domain region");
            // SAFETY: we exclusively created the file, the region is large
            // enough for the header, and nobody else can pass the magic
            // check until this write completes.
            unsafe { ptr.write(DomainHeader::new(name, opts.slot_bytes)) };
        }
        // SAFETY: header is at the region base; magic is verified below.
        let hdr = unsafe { &*ptr };
        if !hdr.magic_ok() {
            return Err(BusError::BadMagic { kind: "domain" });
        }

        Ok(Self {
            shared: Arc::new(DomainShared {
                region,
                prefix: opts.prefix.clone(),
            }),
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        self.shared.header().name()
    }

    /// Current value of the domain's global wake counter.
    pub fn global_sequence(&self) -> u32 {
        self.shared.header().seq.load()
    }

    /// Number of slots registered in the domain so far.
    pub fn slot_count(&self) -> u32 {
        self.shared.header().slot_count()
    }

    pub(crate) fn shared(&self) -> &Arc<DomainShared> {
        &self.shared
    }

    /// Get (creating if absent) the slot called `name`.
    ///
    /// The first call in this process maps the slot region; later calls
    /// return the cached handle.
    pub fn get_slot(&self, name: &str) -> Result<Arc<ClientSlot>, BusError> {
        let mut cache = self.slots.lock().unwrap();
        if let Some(slot) = cache.get(name) {
            return Ok(Arc::clone(slot));
        }

        validate_name(name)?;
        let hdr = self.shared.header();
        // The sizing parameter travels in the shared header; a domain
        // created by a foreign (or corrupt) writer gets re-checked here.
        if hdr.slot_region_bytes() < SLOT_DATA_OFFSET as u64 {
            return Err(BusError::RegionTooSmall {
                kind: "slot",
                bytes: hdr.slot_region_bytes(),
            });
        }
        let index = hdr.register_slot(name)?;

        let region = RegionBuilder::new()
            .path(self.shared.prefix.join(name))
            .size(hdr.slot_region_bytes())
            .allow_create()
            .build()?;

        let ptr = region.as_ptr() as *mut SlotHeader;
        if region.created() {
            tracing::debug!(slot = name, index, "initializing fresh slot region");
            // SAFETY: as for the domain header above.
            unsafe { ptr.write(SlotHeader::new(name, index)) };
        }
        // SAFETY: header is at the region base; checks follow.
        let slot_hdr = unsafe { &*ptr };
        if !slot_hdr.magic_ok() {
            return Err(BusError::BadMagic { kind: "slot" });
        }
        if slot_hdr.name() != name {
            return Err(BusError::NameMismatch {
                expected: name.to_owned(),
                found: slot_hdr.name().to_owned(),
            });
        }
        debug_assert_eq!(slot_hdr.index(), index, "registry and slot header disagree");

        let slot = Arc::new(ClientSlot {
            domain: Arc::clone(&self.shared),
            region,
        });
        cache.insert(name.to_owned(), Arc::clone(&slot));
        Ok(slot)
    }
}

/// Process-local handle to one slot of a bus.
pub struct ClientSlot {
    domain: Arc<DomainShared>,
    region: Region,
}

impl ClientSlot {
    fn header(&self) -> &SlotHeader {
        // SAFETY: the region holds an initialized, magic-checked slot
        // header at its base (established in `get_slot`).
        unsafe { &*(self.region.as_ptr() as *const SlotHeader) }
    }

    pub fn name(&self) -> &str {
        self.header().name()
    }

    /// Bit position of this slot in the domain's wake mask.
    pub fn index(&self) -> u32 {
        self.header().index()
    }

    /// Maximum payload size in bytes.
    pub fn capacity(&self) -> usize {
        self.region.len() - SLOT_DATA_OFFSET
    }

    /// Current value of this slot's sequence counter.
    pub fn sequence(&self) -> u32 {
        self.header().seq.load()
    }

    /// Opaque application flag bits stored alongside the payload.
    pub fn flags(&self) -> u32 {
        self.header().flags.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn set_flags(&self, flags: u32) {
        self.header()
            .flags
            .store(flags, std::sync::atomic::Ordering::SeqCst);
    }

    /// Overwrite the slot payload and wake subscribers.
    ///
    /// Takes the slot write lock for the copy, bumps the slot counter, then
    /// (outside the lock) bumps the domain counter with this slot's bit.
    pub fn write(&self, payload: &[u8]) -> Result<(), BusError> {
        // SAFETY: region invariants established at construction; capacity
        // is derived from the actual region length.
        unsafe {
            self.header()
                .write(payload, self.capacity(), &self.domain.header().seq)
        }
    }

    /// Take a read lock and return a view of the current payload.
    pub fn read(&self) -> Result<LockedView<'_>, BusError> {
        // SAFETY: region invariants established at construction.
        unsafe { self.header().read() }
    }
}

/// Backing-file name rules: printable ASCII, no `/`, no whitespace, and
/// short enough to leave the NUL terminator in the fixed buffer.
fn validate_name(name: &str) -> Result<(), BusError> {
    if name.is_empty() || name.len() > NAME_CAP - 1 {
        return Err(BusError::InvalidName(name.to_owned()));
    }
    for b in name.bytes() {
        if b == b'/' || !(b'!'..=b'~').contains(&b) {
            return Err(BusError::InvalidName(name.to_owned()));
        }
    }
    Ok(())
}
