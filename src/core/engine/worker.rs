//! Fixed and elastic worker loops.
//!
//! Workers are dedicated OS threads. Each builds its [`WorkKind`] context
//! (a current-thread tokio runtime for async engines) and then waits on the
//! engine's dispatch permit. Fixed workers wait without a bound and only exit
//! on cancellation; elastic workers wait for at most the idle timeout and drop
//! their context before giving up their roster slot.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace};

use crate::core::permits::Acquire;
use crate::core::work::WorkKind;

use super::EngineShared;

/// Spawn fixed worker `index`.
pub(super) fn spawn_fixed<K: WorkKind>(
    shared: Arc<EngineShared<K>>,
    index: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread_builder(&shared, "fixed", index).spawn(move || run_fixed(&shared, index))
}

/// Spawn an elastic worker occupying roster `slot`.
pub(super) fn spawn_elastic<K: WorkKind>(
    shared: Arc<EngineShared<K>>,
    slot: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread_builder(&shared, "elastic", slot).spawn(move || run_elastic(&shared, slot))
}

fn thread_builder<K: WorkKind>(
    shared: &EngineShared<K>,
    role: &str,
    index: usize,
) -> thread::Builder {
    let builder = thread::Builder::new().name(format!("dispatch-{}-{role}-{index}", K::KIND));
    match shared.config.thread_stack_size() {
        Some(size) => builder.stack_size(size),
        None => builder,
    }
}

fn run_fixed<K: WorkKind>(shared: &EngineShared<K>, worker_id: usize) {
    debug!(kind = %K::KIND, worker_id = worker_id, "Fixed worker started");

    let context = match K::worker_context() {
        Ok(context) => context,
        Err(e) => {
            error!(
                kind = %K::KIND,
                worker_id = worker_id,
                error = %e,
                "Failed to create worker context"
            );
            return;
        }
    };

    loop {
        match shared.permits.acquire() {
            Acquire::Acquired => {}
            Acquire::Cancelled => break,
            Acquire::TimedOut => continue,
        }

        match shared.queue.try_pop() {
            Some(item) => shared.execute(&context, item),
            // Another worker drained the queue first; the permit is spent.
            None => trace!(kind = %K::KIND, worker_id = worker_id, "Stale permit"),
        }
    }

    debug!(kind = %K::KIND, worker_id = worker_id, "Fixed worker exiting");
}

fn run_elastic<K: WorkKind>(shared: &EngineShared<K>, slot: usize) {
    debug!(kind = %K::KIND, slot = slot, "Elastic worker started");

    let Some(mut context) = elastic_context(shared, slot) else {
        return;
    };

    let idle_timeout = shared.config.elastic_idle_timeout();
    loop {
        match shared.permits.acquire_timeout(idle_timeout) {
            Acquire::Acquired => {}
            Acquire::Cancelled => break,
            Acquire::TimedOut => {
                // Tear the context down before the slot can be reused.
                drop(context);
                if shared
                    .roster
                    .retire_if(slot, || shared.permits.unclaimed() == 0)
                {
                    debug!(kind = %K::KIND, slot = slot, "Elastic worker idle, retired");
                    return;
                }
                // A submission landed while the roster was full.
                let Some(fresh) = elastic_context(shared, slot) else {
                    return;
                };
                context = fresh;
                continue;
            }
        }

        if let Some(item) = shared.queue.try_pop() {
            shared.execute(&context, item);
        } else {
            debug!(kind = %K::KIND, slot = slot, "Elastic worker found no work, retiring");
            break;
        }
    }

    drop(context);
    debug!(kind = %K::KIND, slot = slot, "Elastic worker exiting");
    shared.roster.retire(slot);
}

/// Build the worker context, releasing `slot` on failure.
fn elastic_context<K: WorkKind>(shared: &EngineShared<K>, slot: usize) -> Option<K::Context> {
    match K::worker_context() {
        Ok(context) => Some(context),
        Err(e) => {
            error!(
                kind = %K::KIND,
                slot = slot,
                error = %e,
                "Failed to create elastic worker context"
            );
            shared.roster.retire(slot);
            None
        }
    }
}
