use std::io;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("invalid {kind} header magic")]
    BadMagic { kind: &'static str },

    #[error("slot name mismatch: found '{found}', expected '{expected}'")]
    NameMismatch { expected: String, found: String },

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("payload of {len} bytes exceeds slot capacity of {capacity}")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("domain slot table is full ({0} slots)")]
    SlotTableFull(u32),

    #[error("{kind} region of {bytes} bytes is too small to hold its header")]
    RegionTooSmall { kind: &'static str, bytes: u64 },

    #[error("no subscribed slot is wake-eligible")]
    NoWakeEligibleSlots,

    #[error("backing region i/o failed")]
    Io(#[from] io::Error),

    #[error("futex operation failed")]
    Futex(#[source] io::Error),
}
