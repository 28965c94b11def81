//! Cross-process reader/writer lock on a single futex word.
//!
//! The whole lock is one 32-bit word stored in-place in shared memory, so
//! any process mapping the region can contend on it.
//!
//! # Word states
//!
//! - `1` (`UNLOCKED`): free
//! - `0`: one writer holds the lock
//! - `v > 1`: `v - 1` readers hold the lock
//!
//! All accesses are sequentially consistent. Acquisition is a CAS loop
//! where every failed attempt futex-waits on the exact value last read, so
//! there is no unbounded spinning. Fairness is not guaranteed and the lock
//! is not reentrant.
//!
//! There is no owner tracking: a process that aborts while holding the
//! lock leaves the word in a non-free state and wedges the slot until the
//! backing file is removed or a supervisor resets the word.

use crate::futex::{Futex, WAKE_ALL};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};

const WRITE_HELD: u32 = 0;
const UNLOCKED: u32 = 1;

#[repr(transparent)]
pub struct RwMutex {
    word: AtomicU32,
}

const _: () = assert!(size_of::<RwMutex>() == 4, "RwMutex must be one futex word");

impl RwMutex {
    pub fn new() -> Self {
        Self {
            word: AtomicU32::new(UNLOCKED),
        }
    }

    /// Raw word value; test and diagnostic use only.
    pub fn load(&self) -> u32 {
        self.word.load(SeqCst)
    }

    /// Acquire the write lock, sleeping until it is free.
    pub fn write(&self) -> io::Result<RwWriteGuard<'_>> {
        loop {
            let mut cur = self.word.load(SeqCst);
            if cur == UNLOCKED {
                match self
                    .word
                    .compare_exchange(UNLOCKED, WRITE_HELD, SeqCst, SeqCst)
                {
                    Ok(_) => return Ok(RwWriteGuard { lock: self }),
                    Err(actual) => cur = actual,
                }
            }
            // Sleep on the value we last observed. A stale value means the
            // word already moved and the kernel refuses the sleep; loop.
            Futex::new(&self.word).wait(cur)?;
        }
    }

    /// Acquire a read lock, sleeping while a writer holds the word.
    pub fn read(&self) -> io::Result<RwReadGuard<'_>> {
        loop {
            let mut cur = self.word.load(SeqCst);
            if cur != WRITE_HELD {
                match self.word.compare_exchange(cur, cur + 1, SeqCst, SeqCst) {
                    Ok(_) => return Ok(RwReadGuard { lock: self }),
                    Err(actual) => cur = actual,
                }
            }
            Futex::new(&self.word).wait(cur)?;
        }
    }

    fn unlock_write(&self) {
        let old = self.word.fetch_add(1, SeqCst);
        debug_assert_eq!(old, WRITE_HELD);
        // An unknown mix of readers and writers may be parked: broadcast.
        if let Err(e) = Futex::new(&self.word).wake(WAKE_ALL) {
            tracing::error!("rw_mutex: wake after write-unlock failed: {e}");
        }
    }

    fn unlock_read(&self) {
        let old = self.word.fetch_sub(1, SeqCst);
        debug_assert!(old > UNLOCKED);
        // Last reader out: admit one parked writer.
        if old - 1 == UNLOCKED {
            if let Err(e) = Futex::new(&self.word).wake(1) {
                tracing::error!("rw_mutex: wake after read-unlock failed: {e}");
            }
        }
    }
}

impl Default for RwMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the write lock (and wakes all waiters) on drop.
pub struct RwWriteGuard<'a> {
    lock: &'a RwMutex,
}

impl Drop for RwWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

/// Releases one read hold on drop.
pub struct RwReadGuard<'a> {
    lock: &'a RwMutex,
}

impl Drop for RwReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}
