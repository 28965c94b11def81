//! Thin wrapper over the kernel futex syscall for 32-bit words living in
//! shared memory.
//!
//! The bitset variants attach a 32-bit mask to each sleep and wake: a
//! sleeper is only awakened when `sleep_mask & wake_mask != 0`. This is
//! what lets one blocking call wait on any subset of slots (see
//! `SequenceCounter` and `Waiter`).
//!
//! `FUTEX_PRIVATE_FLAG` is deliberately absent everywhere: the words sit in
//! `MAP_SHARED` mappings and must be able to wake sleepers in other
//! processes.

use std::io;
use std::ptr;
use std::sync::atomic::AtomicU32;

/// Wake count large enough to mean "everyone" for any realistic waiter set.
pub const WAKE_ALL: u32 = 65536;

/// Result of a futex wait that did not fail hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The kernel put us to sleep and something woke us (or the sleep was
    /// interrupted). The word may or may not have changed; callers re-check.
    Woken,
    /// The word no longer held the expected value, so the kernel refused to
    /// sleep (`EAGAIN`). Benign: the change we were waiting for already
    /// happened.
    Stale,
}

/// A borrowed view of a shared 32-bit word, usable as a futex.
pub struct Futex<'a> {
    word: &'a AtomicU32,
}

impl<'a> Futex<'a> {
    #[inline]
    pub fn new(word: &'a AtomicU32) -> Self {
        Self { word }
    }

    fn syscall(&self, op: libc::c_int, val: u32, mask: u32) -> libc::c_long {
        // SAFETY: the futex word is a valid, aligned u32 for the lifetime
        // of `self`; the timeout and uaddr2 arguments are unused by the
        // ops issued here.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                op,
                val,
                ptr::null::<libc::timespec>(),
                ptr::null::<u32>(),
                mask,
            )
        }
    }

    /// Sleep while the word equals `expected`.
    pub fn wait(&self, expected: u32) -> io::Result<WaitOutcome> {
        wait_result(self.syscall(libc::FUTEX_WAIT, expected, 0))
    }

    /// Sleep while the word equals `expected`, tagged with `mask` so that
    /// only intersecting `wake_bitset` calls wake us.
    pub fn wait_bitset(&self, expected: u32, mask: u32) -> io::Result<WaitOutcome> {
        wait_result(self.syscall(libc::FUTEX_WAIT_BITSET, expected, mask))
    }

    /// Wake up to `count` sleepers. Returns how many were woken.
    pub fn wake(&self, count: u32) -> io::Result<u32> {
        wake_result(self.syscall(libc::FUTEX_WAKE, count, 0))
    }

    /// Wake up to `count` sleepers whose sleep mask intersects `mask`.
    pub fn wake_bitset(&self, count: u32, mask: u32) -> io::Result<u32> {
        wake_result(self.syscall(libc::FUTEX_WAKE_BITSET, count, mask))
    }
}

fn wait_result(rc: libc::c_long) -> io::Result<WaitOutcome> {
    if rc == 0 {
        return Ok(WaitOutcome::Woken);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EAGAIN) => Ok(WaitOutcome::Stale),
        // Interrupted sleeps look like wakes; every caller loops and
        // re-checks the word anyway.
        Some(libc::EINTR) => Ok(WaitOutcome::Woken),
        _ => Err(err),
    }
}

fn wake_result(rc: libc::c_long) -> io::Result<u32> {
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rc as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::thread;
    use std::time::Duration;

    // Long enough for a spawned thread to reach its futex sleep.
    const SETTLE: Duration = Duration::from_millis(20);

    #[test]
    fn wake_with_no_sleepers_wakes_none() {
        let word = AtomicU32::new(0);
        let ftx = Futex::new(&word);
        assert_eq!(ftx.wake(1).unwrap(), 0);
        assert_eq!(ftx.wake(2).unwrap(), 0);
    }

    #[test]
    fn each_sleeper_needs_its_own_wake() {
        let word = AtomicU32::new(0);
        thread::scope(|s| {
            let ftx = Futex::new(&word);

            s.spawn(|| {
                Futex::new(&word).wait(0).unwrap();
            });
            s.spawn(|| {
                Futex::new(&word).wait(0).unwrap();
            });
            thread::sleep(SETTLE);

            assert_eq!(ftx.wake(1).unwrap(), 1);
            thread::sleep(SETTLE);
            assert_eq!(ftx.wake(1).unwrap(), 1);
            thread::sleep(SETTLE);
            assert_eq!(ftx.wake(1).unwrap(), 0);
        });
    }

    #[test]
    fn wait_on_stale_value_does_not_sleep() {
        let word = AtomicU32::new(5);
        let ftx = Futex::new(&word);
        assert_eq!(ftx.wait(4).unwrap(), WaitOutcome::Stale);
    }

    #[test]
    fn bitset_wake_only_reaches_intersecting_masks() {
        let word = AtomicU32::new(0);
        thread::scope(|s| {
            let ftx = Futex::new(&word);

            s.spawn(|| {
                Futex::new(&word).wait_bitset(0, 0b01).unwrap();
            });
            thread::sleep(SETTLE);

            // Disjoint mask: the sleeper stays asleep.
            assert_eq!(ftx.wake_bitset(WAKE_ALL, 0b10).unwrap(), 0);
            // Intersecting mask: woken.
            thread::sleep(SETTLE);
            assert_eq!(ftx.wake_bitset(WAKE_ALL, 0b11).unwrap(), 1);
        });
    }
}
