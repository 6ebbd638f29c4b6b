//! Counting semaphore that wakes workers, with a one-shot cancellation scope.
//!
//! Built on `parking_lot::Mutex` + `parking_lot::Condvar` like the rest of the
//! crate's blocking primitives. One permit is released per submission and one
//! is consumed per successful acquire, whether or not the acquiring worker then
//! finds an item in the queue.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Outcome of waiting for a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    /// A permit was taken.
    Acquired,
    /// The bounded wait elapsed without a permit.
    TimedOut,
    /// The cancellation scope was triggered.
    Cancelled,
}

#[derive(Debug)]
struct PermitState {
    available: usize,
    /// Workers currently blocked in an acquire.
    parked: usize,
    cancelled: bool,
}

/// Dispatch permit shared by all workers of one engine.
#[derive(Debug)]
pub(crate) struct DispatchPermits {
    state: Mutex<PermitState>,
    condvar: Condvar,
}

impl DispatchPermits {
    pub(crate) fn new(initial: usize) -> Self {
        Self {
            state: Mutex::new(PermitState {
                available: initial,
                parked: 0,
                cancelled: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Add one permit and wake one parked worker.
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        state.available += 1;
        drop(state);
        self.condvar.notify_one();
    }

    /// Wait for a permit with no time bound.
    pub(crate) fn acquire(&self) -> Acquire {
        self.acquire_until(None)
    }

    /// Wait for a permit for at most `timeout`.
    pub(crate) fn acquire_timeout(&self, timeout: Duration) -> Acquire {
        // An unrepresentable deadline is treated as unbounded.
        self.acquire_until(Instant::now().checked_add(timeout))
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> Acquire {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return Acquire::Cancelled;
            }
            if state.available > 0 {
                state.available -= 1;
                return Acquire::Acquired;
            }

            state.parked += 1;
            let timed_out = match deadline {
                Some(deadline) => self.condvar.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.condvar.wait(&mut state);
                    false
                }
            };
            state.parked -= 1;

            // A release racing the timeout still wins.
            if timed_out && !state.cancelled && state.available == 0 {
                return Acquire::TimedOut;
            }
        }
    }

    /// Trigger the cancellation scope and wake every parked worker.
    ///
    /// Returns `false` if the scope was already cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        let first = !state.cancelled;
        state.cancelled = true;
        drop(state);
        self.condvar.notify_all();
        first
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Permits released but not yet acquired.
    pub(crate) fn available(&self) -> usize {
        self.state.lock().available
    }

    /// Permits that no parked worker is positioned to claim.
    ///
    /// Non-zero means every idle worker already has a permit waiting for it
    /// and the surplus would sit until a busy worker frees up. Approximate:
    /// a notified worker counts as parked until it reacquires the lock.
    pub(crate) fn unclaimed(&self) -> usize {
        let state = self.state.lock();
        state.available.saturating_sub(state.parked)
    }
}
