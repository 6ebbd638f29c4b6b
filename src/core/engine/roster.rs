//! Arena of elastic worker slots guarded by a single mutex.
//!
//! The slot count equals the elastic ceiling, so a spawn can only happen when
//! a free slot exists. Spawning pops a slot index and retiring pushes it back,
//! both O(1) under the same lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

struct Slots {
    /// Handle of the latest thread to occupy each slot.
    handles: Vec<Option<JoinHandle<()>>>,
    free: Vec<usize>,
}

pub(super) struct ElasticRoster {
    slots: Mutex<Slots>,
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl ElasticRoster {
    pub(super) fn new(ceiling: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                handles: (0..ceiling).map(|_| None).collect(),
                free: (0..ceiling).rev().collect(),
            }),
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Claim a free slot and start a worker in it.
    ///
    /// Returns `Ok(false)` when the ceiling is reached or `admit` declines.
    /// `admit` and the spawn both run under the roster lock, so a new worker
    /// cannot retire before its handle is recorded and no worker is added
    /// after [`drain`](Self::drain) once `admit` observes cancellation.
    pub(super) fn try_spawn<A, F>(&self, admit: A, spawn: F) -> std::io::Result<bool>
    where
        A: FnOnce() -> bool,
        F: FnOnce(usize) -> std::io::Result<JoinHandle<()>>,
    {
        let mut slots = self.slots.lock();
        if !admit() {
            return Ok(false);
        }
        let Some(slot) = slots.free.pop() else {
            return Ok(false);
        };

        let previous = slots.handles[slot].take();
        let spawned = match spawn(slot) {
            Ok(handle) => {
                slots.handles[slot] = Some(handle);
                let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
                self.peak.fetch_max(live, Ordering::AcqRel);
                Ok(true)
            }
            Err(e) => {
                slots.free.push(slot);
                Err(e)
            }
        };
        drop(slots);

        // The previous occupant released this slot on its way out; join it
        // outside the lock.
        if let Some(previous) = previous {
            let _ = previous.join();
        }
        spawned
    }

    /// Release `slot`. The worker must not block after this call, since a
    /// spawn reusing the slot joins it. `live` drops immediately.
    pub(super) fn retire(&self, slot: usize) {
        let mut slots = self.slots.lock();
        slots.free.push(slot);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }

    /// Release `slot` only if `should_retire` holds, evaluated under the
    /// roster lock. Returns whether the slot was released.
    pub(super) fn retire_if<F>(&self, slot: usize, should_retire: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let mut slots = self.slots.lock();
        if !should_retire() {
            return false;
        }
        slots.free.push(slot);
        self.live.fetch_sub(1, Ordering::AcqRel);
        true
    }

    /// Take every recorded handle, live or retired, for joining.
    pub(super) fn drain(&self) -> Vec<JoinHandle<()>> {
        let mut slots = self.slots.lock();
        slots.handles.iter_mut().filter_map(Option::take).collect()
    }

    pub(super) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}
