//! `basalt-bus`: a shared-memory publish/subscribe bus for cooperating
//! processes on one host.
//!
//! Producers overwrite variable-size byte payloads into named **slots**;
//! consumers subscribe to any subset of a **domain**'s slots and block in a
//! single futex call until one of them is written. Everything that
//! synchronizes lives inside memory-mapped files in a tmpfs, so the hot
//! path is a memcpy, two atomic bumps, and one `FUTEX_WAKE_BITSET` —
//! no broker, no sockets, no serialization.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   /dev/shm/<domain>    ┌────────────────────────┐
//! │ publisher  │ ───────────────────────│ consumer (Waiter)      │
//! │ (Process A)│   /dev/shm/<slot> ...  │ (Process B)            │
//! └────────────┘    (mmap regions)      └────────────────────────┘
//!                                       ┌────────────────────────┐
//!                                       │ consumer (Waiter)      │
//!                                       │ (Process C)            │
//!                                       └────────────────────────┘
//! ```
//!
//! The domain region holds a global sequence counter; each slot region
//! holds a payload, a reader/writer futex lock, and its own counter. A
//! write bumps the slot counter (silently) and then the domain counter
//! tagged with the slot's bit, waking exactly the waiters that subscribed
//! to that bit.
//!
//! # Example
//!
//! ```ignore
//! use basalt_bus::{ClientDomain, Waiter};
//!
//! // Publisher (typically one process)
//! let dom = ClientDomain::open_or_create("robot")?;
//! let imu = dom.get_slot("imu")?;
//! imu.write(b"x=0.1 y=0.2")?;
//!
//! // Consumer (same or different process)
//! let dom = ClientDomain::open_or_create("robot")?;
//! let imu = dom.get_slot("imu")?;
//! let mut waiter = Waiter::new(&dom);
//! waiter.subscribe(&imu, true);
//! waiter.wait_exclusive()?;
//! waiter.for_each_new_slot(|view| println!("imu: {:?}", view.bytes()))?;
//! ```
//!
//! # Guarantees and non-guarantees
//!
//! Delivery is last-writer-wins: a slot holds only its most recent
//! payload, and slow consumers observe the latest write, not a history.
//! Locks have no owner tracking, so a process that dies while holding a
//! slot's write lock wedges that slot until the backing file is removed.
//!
//! # Internal modules
//!
//! - `futex`: kernel futex wrapper (plain + bitset wait/wake)
//! - `rw_mutex`: one-word cross-process reader/writer lock
//! - `seq`: monotonic counter with bitset wake semantics
//! - `layout`: shared binary layout of domain and slot regions
//! - `slot` / `domain`: behavior of the shared records
//! - `client`: per-process handles and the open/write/read API
//! - `waiter`: multi-slot blocking subscription

mod client;
mod domain;
mod error;
mod futex;
mod layout;
mod rw_mutex;
mod seq;
mod slot;
mod waiter;

pub use client::{ClientDomain, ClientSlot, DomainOptions};
pub use error::BusError;
pub use futex::{Futex, WAKE_ALL, WaitOutcome};
pub use layout::{
    DEFAULT_DOMAIN_BYTES, DEFAULT_PREFIX, DEFAULT_SLOT_BYTES, MAX_SLOTS, NAME_CAP,
    SLOT_DATA_OFFSET,
};
pub use rw_mutex::{RwMutex, RwReadGuard, RwWriteGuard};
pub use seq::SequenceCounter;
pub use slot::LockedView;
pub use waiter::Waiter;
