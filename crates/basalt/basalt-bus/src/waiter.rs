//! Blocking consumer over any subset of a domain's slots.
//!
//! The two-level counter scheme collapses "wait on any of N slots" into a
//! single futex call: the domain counter is bumped (with the writing
//! slot's bit) on every write, so a waiter sleeps once on that word with
//! the union of its subscribed bits, and the per-slot counters then tell
//! it exactly which slots advanced. A subscription with `wake_with =
//! false` contributes no bit to the sleep mask but is still visited on
//! every wake, so low-priority slots can piggyback on higher-priority
//! traffic.

use crate::client::{ClientDomain, ClientSlot};
use crate::error::BusError;
use crate::slot::LockedView;
use std::collections::HashMap;
use std::sync::Arc;

/// One subscription: a slot plus the last sequence value seen there.
struct WaitTarget {
    slot: Arc<ClientSlot>,
    last_seq: u32,
    wake_with: bool,
}

impl WaitTarget {
    fn new(slot: Arc<ClientSlot>, wake_with: bool) -> Self {
        // Sample now: only writes after subscription count as new.
        let last_seq = slot.sequence();
        Self {
            slot,
            last_seq,
            wake_with,
        }
    }

    /// Reload the slot counter; record and report whether it moved.
    fn check_and_update(&mut self) -> bool {
        let cur = self.slot.sequence();
        if cur != self.last_seq {
            self.last_seq = cur;
            return true;
        }
        false
    }
}

/// A process-private set of slot subscriptions over one domain.
///
/// Subscription state is not shared: use one waiter per consuming thread,
/// each opened against the same `ClientDomain`.
pub struct Waiter {
    domain: Arc<crate::client::DomainShared>,
    targets: HashMap<String, WaitTarget>,
}

impl Waiter {
    pub fn new(domain: &ClientDomain) -> Self {
        Self {
            domain: Arc::clone(domain.shared()),
            targets: HashMap::new(),
        }
    }

    /// Subscribe to `slot`. With `wake_with` the slot's bit joins the sleep
    /// mask; without it the slot is only visited opportunistically when
    /// something else wakes this waiter. Re-subscribing resamples the
    /// slot's counter.
    pub fn subscribe(&mut self, slot: &Arc<ClientSlot>, wake_with: bool) {
        self.targets.insert(
            slot.name().to_owned(),
            WaitTarget::new(Arc::clone(slot), wake_with),
        );
    }

    pub fn unsubscribe(&mut self, slot: &ClientSlot) {
        self.targets.remove(slot.name());
    }

    pub fn subscription_count(&self) -> usize {
        self.targets.len()
    }

    /// The futex sleep mask: the union of wake-eligible subscribed bits.
    pub fn wake_mask(&self) -> u32 {
        self.targets
            .values()
            .filter(|t| t.wake_with)
            .fold(0, |mask, t| mask | (1u32 << t.slot.index()))
    }

    /// Block until a wake-eligible subscribed slot is written (or a
    /// spurious wake happens; callers follow up with
    /// [`for_each_new_slot`](Self::for_each_new_slot) and loop when it
    /// reports nothing new).
    pub fn wait_exclusive(&self) -> Result<(), BusError> {
        let mask = self.wake_mask();
        if mask == 0 {
            return Err(BusError::NoWakeEligibleSlots);
        }
        let seq = &self.domain.header().seq;
        let prv = seq.load();
        seq.wait_for_change(prv, mask).map_err(BusError::Futex)?;
        Ok(())
    }

    /// Visit every subscribed slot (wake-eligible or not) whose counter
    /// moved since the last visit, passing a read-locked view of its
    /// payload to `f`. Returns how many slots were visited.
    pub fn for_each_new_slot<F>(&mut self, mut f: F) -> Result<u32, BusError>
    where
        F: FnMut(LockedView<'_>),
    {
        let mut visited = 0;
        for target in self.targets.values_mut() {
            if target.check_and_update() {
                visited += 1;
                f(target.slot.read()?);
            }
        }
        Ok(visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DomainOptions;
    use crate::layout::SLOT_DATA_OFFSET;
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    fn scratch(tag: &str) -> (DomainOptions, PathBuf) {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir =
            std::env::temp_dir().join(format!("basalt_waiter_{tag}_{}_{ts}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let opts = DomainOptions {
            prefix: dir.clone(),
            domain_bytes: 1 << 20,
            slot_bytes: (SLOT_DATA_OFFSET + 1024) as u64,
        };
        (opts, dir)
    }

    #[test]
    fn producer_thread_wakes_subscribed_consumer() {
        let (opts, dir) = scratch("wake");
        let dom = ClientDomain::open_or_create_with("bus", &opts).unwrap();
        let slot = dom.get_slot("s").unwrap();

        // Subscribe before spawning so the consumer's baseline sample
        // definitely precedes the write.
        let mut waiter = Waiter::new(&dom);
        waiter.subscribe(&slot, true);

        thread::scope(|s| {
            let consumer = s.spawn(move || {
                waiter.wait_exclusive().unwrap();
                let mut seen = Vec::new();
                let n = waiter
                    .for_each_new_slot(|view| seen.extend_from_slice(&view))
                    .unwrap();
                (n, seen)
            });

            thread::sleep(Duration::from_millis(50));
            slot.write(b"hello1\0").unwrap();

            let (n, seen) = consumer.join().unwrap();
            assert_eq!(n, 1);
            assert_eq!(seen, b"hello1\0");
        });
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn visits_report_zero_until_a_new_write_arrives() {
        let (opts, dir) = scratch("edge");
        let dom = ClientDomain::open_or_create_with("bus", &opts).unwrap();
        let slot = dom.get_slot("s").unwrap();

        // Written before subscription: not new.
        slot.write(b"old").unwrap();

        let mut waiter = Waiter::new(&dom);
        waiter.subscribe(&slot, true);
        assert_eq!(waiter.for_each_new_slot(|_| {}).unwrap(), 0);

        slot.write(b"new").unwrap();
        assert_eq!(waiter.for_each_new_slot(|_| {}).unwrap(), 1);
        // Edge-triggered: the same write is never reported twice.
        assert_eq!(waiter.for_each_new_slot(|_| {}).unwrap(), 0);
        assert_eq!(waiter.for_each_new_slot(|_| {}).unwrap(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn passive_subscription_is_visited_but_does_not_wake() {
        let (opts, dir) = scratch("passive");
        let dom = ClientDomain::open_or_create_with("bus", &opts).unwrap();
        let control = dom.get_slot("control").unwrap();
        let telemetry = dom.get_slot("telemetry").unwrap();

        let mut waiter = Waiter::new(&dom);
        waiter.subscribe(&control, true);
        waiter.subscribe(&telemetry, false);
        assert_eq!(waiter.wake_mask(), 1 << control.index());

        thread::scope(|s| {
            let consumer = s.spawn(move || {
                waiter.wait_exclusive().unwrap();
                let mut names = Vec::new();
                let n = waiter
                    .for_each_new_slot(|view| names.push(view.slot_name().to_owned()))
                    .unwrap();
                (n, names)
            });

            // The wake comes from `control`, but the visit pass must report
            // the passive slot's new payload too.
            thread::sleep(Duration::from_millis(50));
            telemetry.write(b"t0").unwrap();
            control.write(b"c0").unwrap();

            let (n, mut names) = consumer.join().unwrap();
            assert_eq!(n, 2);
            names.sort();
            assert_eq!(names, ["control", "telemetry"]);
        });
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn waiting_with_no_wake_eligible_slots_is_an_error() {
        let (opts, dir) = scratch("nomask");
        let dom = ClientDomain::open_or_create_with("bus", &opts).unwrap();
        let slot = dom.get_slot("s").unwrap();

        let mut waiter = Waiter::new(&dom);
        assert!(matches!(
            waiter.wait_exclusive(),
            Err(BusError::NoWakeEligibleSlots)
        ));

        waiter.subscribe(&slot, false);
        assert!(matches!(
            waiter.wait_exclusive(),
            Err(BusError::NoWakeEligibleSlots)
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsubscribe_removes_the_target() {
        let (opts, dir) = scratch("unsub");
        let dom = ClientDomain::open_or_create_with("bus", &opts).unwrap();
        let a = dom.get_slot("a").unwrap();
        let b = dom.get_slot("b").unwrap();

        let mut waiter = Waiter::new(&dom);
        waiter.subscribe(&a, true);
        waiter.subscribe(&b, true);
        assert_eq!(waiter.subscription_count(), 2);

        waiter.unsubscribe(&b);
        assert_eq!(waiter.subscription_count(), 1);
        assert_eq!(waiter.wake_mask(), 1 << a.index());

        b.write(b"ignored").unwrap();
        assert_eq!(waiter.for_each_new_slot(|_| {}).unwrap(), 0);
        let _ = fs::remove_dir_all(&dir);
    }
}
