//! 32-bit monotonic sequence counter with futex-bitset wake semantics.
//!
//! One counter lives in every slot header (edge detection per slot) and one
//! in the domain header (the single word a `Waiter` sleeps on). Writers tag
//! each domain bump with the written slot's bit so sleepers can filter
//! wakes down to the slots they subscribed to.
//!
//! Wraparound is deliberate and ignored: the only observable test anywhere
//! is inequality with a previously sampled value.

use crate::futex::{Futex, WAKE_ALL};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};

#[repr(transparent)]
pub struct SequenceCounter {
    value: AtomicU32,
}

const _: () = assert!(
    size_of::<SequenceCounter>() == 4,
    "SequenceCounter must be one futex word"
);

impl SequenceCounter {
    pub fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn load(&self) -> u32 {
        self.value.load(SeqCst)
    }

    /// Advance the counter without waking anyone. Returns the pre-bump value.
    #[inline]
    pub fn bump_silent(&self) -> u32 {
        self.value.fetch_add(1, SeqCst)
    }

    /// Advance the counter, then wake every sleeper whose wait mask
    /// intersects `mask`. Returns the pre-bump value.
    pub fn bump(&self, mask: u32) -> io::Result<u32> {
        let prev = self.value.fetch_add(1, SeqCst);
        if let Err(e) = Futex::new(&self.value).wake_bitset(WAKE_ALL, mask) {
            tracing::error!("sequence counter: wake_bitset failed: {e}");
            return Err(e);
        }
        Ok(prev)
    }

    /// Block until the counter no longer equals `prv`, sleeping with `mask`
    /// so only intersecting bumps wake us. Returns the freshest value
    /// observed; spurious returns (value still `prv`) are possible and
    /// callers re-check.
    pub fn wait_for_change(&self, prv: u32, mask: u32) -> io::Result<u32> {
        let cur = self.load();
        if cur != prv {
            return Ok(cur);
        }
        Futex::new(&self.value).wait_bitset(cur, mask)?;
        Ok(self.load())
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
