//! Dispatch engine: a weighted queue served by fixed and elastic workers.
//!
//! One engine instance handles one [`WorkKind`]. Submissions push onto the
//! [`WeightedQueue`] and release one dispatch permit; a worker that acquires a
//! permit pops the heaviest queued item and executes it between the
//! configured hooks.
//!
//! # Elastic scaling
//!
//! After every submission the engine checks whether the released permits
//! outnumber the workers parked on the permit, i.e. whether no idle worker is
//! positioned to claim the new work. If so, the queue is non-empty and the
//! elastic roster has a free slot, one elastic worker is spawned. The check is
//! a best-effort hint: bursts may spawn a worker more or less than strictly
//! needed. The roster ceiling is the only hard limit and is enforced under the
//! roster lock.
//!
//! # Lifecycle
//!
//! Fixed workers start in [`DispatchEngine::new`]. [`DispatchEngine::dispose`]
//! cancels the permit, joins every worker and can only succeed once. In-flight
//! executions run to completion; queued items are dropped unexecuted.

mod roster;
mod worker;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::EngineConfig;
use crate::core::error::{DispatchError, DispatchResult, WorkPanic};
use crate::core::permits::DispatchPermits;
use crate::core::work::{AsyncKind, ExecutionKind, SyncKind, WorkKind};
use crate::core::work_item::{Weight, WorkId, WorkIdSource, WorkItem};
use crate::infra::queue::WeightedQueue;

use roster::ElasticRoster;

/// Engine for synchronous callables.
pub type SyncEngine = DispatchEngine<SyncKind>;

/// Engine for asynchronous callables.
pub type AsyncEngine = DispatchEngine<AsyncKind>;

/// Point-in-time engine statistics. Approximate under concurrent mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Engine flavour.
    pub kind: ExecutionKind,
    /// Persistent workers.
    pub fixed_workers: usize,
    /// Elastic ceiling.
    pub max_elastic_workers: usize,
    /// Elastic workers currently alive.
    pub elastic_workers: usize,
    /// Highest number of simultaneously live elastic workers observed.
    pub peak_elastic_workers: usize,
    /// Items queued and not yet dequeued.
    pub pending: usize,
    /// Items accepted since construction.
    pub submitted: u64,
    /// Items whose payload and hooks finished without failure.
    pub completed: u64,
    /// Items reported through the failure path.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct EngineCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// State shared between the engine handle and its workers.
struct EngineShared<K: WorkKind> {
    config: EngineConfig,
    queue: WeightedQueue<WorkItem<K::Payload>>,
    permits: DispatchPermits,
    roster: ElasticRoster,
    ids: WorkIdSource,
    counters: EngineCounters,
}

impl<K: WorkKind> EngineShared<K> {
    /// Spawn one elastic worker if the scale-up hint fires.
    fn scale_up(self: &Arc<Self>) {
        if !self.config.is_elastic()
            || self.permits.unclaimed() == 0
            || self.queue.is_empty()
            || self.permits.is_cancelled()
        {
            return;
        }

        // Re-checked under the roster lock so nothing spawns after dispose drains.
        let admit = || !self.permits.is_cancelled();
        match self
            .roster
            .try_spawn(admit, |slot| worker::spawn_elastic(Arc::clone(self), slot))
        {
            Ok(true) => debug!(
                kind = %K::KIND,
                elastic_workers = self.roster.live(),
                "Elastic worker spawned"
            ),
            Ok(false) => trace!(kind = %K::KIND, "No elastic slot available"),
            // The item stays queued for the workers already running.
            Err(e) => warn!(kind = %K::KIND, error = %e, "Failed to spawn elastic worker"),
        }
    }

    /// Run one dequeued item between its hooks. Never unwinds.
    fn execute(&self, context: &K::Context, item: WorkItem<K::Payload>) {
        let info = item.info(K::KIND);
        let hooks = self.config.hooks();
        let payload = item.into_payload();

        trace!(kind = %K::KIND, id = info.id, weight = info.weight, "Executing work item");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> anyhow::Result<()> {
            hooks.run_before(&info);
            K::run(context, payload)?;
            hooks.run_after(&info);
            Ok(())
        }))
        .unwrap_or_else(|panic| Err(WorkPanic::from_payload(&*panic).into()));

        match outcome {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                trace!(kind = %K::KIND, id = info.id, "Work item completed");
            }
            Err(error) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %K::KIND, id = info.id, error = %error, "Work item failed");

                match panic::catch_unwind(AssertUnwindSafe(|| {
                    hooks.run_on_failure(&info, &error)
                })) {
                    Ok(true) => {}
                    Ok(false) => trace!(kind = %K::KIND, id = info.id, "No failure hook registered"),
                    Err(panic) => error!(
                        kind = %K::KIND,
                        id = info.id,
                        panic = %WorkPanic::from_payload(&*panic),
                        "Failure hook panicked"
                    ),
                }
            }
        }
    }
}

/// Weighted work dispatcher over a bounded pool of worker threads.
///
/// # Design
///
/// - **Permit signalling**: a counting semaphore on `parking_lot` primitives,
///   no polling
/// - **Spawn guard**: elastic workers live in a fixed arena of slots, so the
///   ceiling cannot be overshot
/// - **Failure isolation**: payload errors and panics are reported through the
///   failure hook and never end a worker
pub struct DispatchEngine<K: WorkKind> {
    shared: Arc<EngineShared<K>>,
    fixed_workers: Mutex<Vec<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl<K: WorkKind> DispatchEngine<K> {
    /// Create an engine with its own id source and start its fixed workers.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` if the configuration is invalid
    /// or `DispatchError::WorkerSpawn` if a worker thread cannot be started.
    pub fn new(config: EngineConfig) -> DispatchResult<Self> {
        Self::with_id_source(config, WorkIdSource::new())
    }

    /// Create an engine drawing item ids from `ids`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_id_source(config: EngineConfig, ids: WorkIdSource) -> DispatchResult<Self> {
        config.validate()?;

        let fixed_count = config.fixed_workers();
        let shared = Arc::new(EngineShared {
            roster: ElasticRoster::new(config.max_elastic_workers()),
            queue: WeightedQueue::new(),
            permits: DispatchPermits::new(0),
            counters: EngineCounters::default(),
            ids,
            config,
        });

        let mut fixed_workers = Vec::with_capacity(fixed_count);
        for worker_id in 0..fixed_count {
            match worker::spawn_fixed(Arc::clone(&shared), worker_id) {
                Ok(handle) => fixed_workers.push(handle),
                Err(source) => {
                    shared.permits.cancel();
                    for handle in fixed_workers {
                        let _ = handle.join();
                    }
                    return Err(DispatchError::WorkerSpawn {
                        kind: K::KIND,
                        source,
                    });
                }
            }
        }

        info!(
            kind = %K::KIND,
            fixed_workers = fixed_count,
            max_elastic_workers = shared.config.max_elastic_workers(),
            elastic_idle_timeout_ms = u64::try_from(shared.config.elastic_idle_timeout().as_millis())
                .unwrap_or(u64::MAX),
            "DispatchEngine started"
        );

        Ok(Self {
            shared,
            fixed_workers: Mutex::new(fixed_workers),
            disposed: AtomicBool::new(false),
        })
    }

    /// Queue `payload` with `weight` and wake a worker.
    ///
    /// Returns the id the hooks will report for this item.
    ///
    /// # Errors
    ///
    /// - `DispatchError::AlreadyDisposed` after [`dispose`](Self::dispose)
    /// - `DispatchError::NoCapacity` if the engine has no workers at all; the
    ///   item is not queued
    pub fn submit(&self, payload: K::Payload, weight: Weight) -> DispatchResult<WorkId> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(DispatchError::AlreadyDisposed);
        }
        if !self.shared.config.has_capacity() {
            return Err(DispatchError::NoCapacity { kind: K::KIND });
        }

        let item = WorkItem::new(&self.shared.ids, weight, payload);
        let id = item.id();
        self.shared.queue.push(item, weight);
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.permits.release();

        trace!(kind = %K::KIND, id = id, weight = weight, "Work item submitted");

        self.shared.scale_up();
        Ok(id)
    }

    /// Engine flavour.
    #[must_use]
    pub const fn kind(&self) -> ExecutionKind {
        K::KIND
    }

    /// Configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Items queued and not yet dequeued; executing items are not counted.
    #[must_use]
    pub fn pending_work(&self) -> usize {
        self.shared.queue.len()
    }

    /// Elastic workers currently alive.
    #[must_use]
    pub fn current_elastic_workers(&self) -> usize {
        self.shared.roster.live()
    }

    /// Highest number of simultaneously live elastic workers so far.
    #[must_use]
    pub fn peak_elastic_workers(&self) -> usize {
        self.shared.roster.peak()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Snapshot of the engine's counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let counters = &self.shared.counters;
        EngineStats {
            kind: K::KIND,
            fixed_workers: self.shared.config.fixed_workers(),
            max_elastic_workers: self.shared.config.max_elastic_workers(),
            elastic_workers: self.shared.roster.live(),
            peak_elastic_workers: self.shared.roster.peak(),
            pending: self.shared.queue.len(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Cancel all workers and wait for them to exit.
    ///
    /// Workers finish the item they are executing; nothing else is dequeued.
    ///
    /// # Errors
    ///
    /// - `DispatchError::AlreadyDisposed` on every call after the first
    /// - `DispatchError::WorkerJoin` if worker threads panicked; the engine is
    ///   still disposed
    pub fn dispose(&self) -> DispatchResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::AlreadyDisposed);
        }

        info!(
            kind = %K::KIND,
            pending = self.shared.queue.len(),
            "Disposing DispatchEngine"
        );
        self.shared.permits.cancel();

        let mut handles = std::mem::take(&mut *self.fixed_workers.lock());
        handles.extend(self.shared.roster.drain());
        let worker_count = handles.len();

        let failed = handles
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count();

        if failed > 0 {
            warn!(kind = %K::KIND, failed = failed, "Worker threads panicked during dispose");
            return Err(DispatchError::WorkerJoin {
                kind: K::KIND,
                failed,
            });
        }

        info!(kind = %K::KIND, worker_count = worker_count, "DispatchEngine disposed");
        Ok(())
    }
}

impl<K: WorkKind> Drop for DispatchEngine<K> {
    fn drop(&mut self) {
        // Cancel but don't join; explicit dispose() is required for a clean shutdown.
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.shared.permits.cancel();
            debug!(
                kind = %K::KIND,
                "DispatchEngine dropped without dispose - workers will be detached"
            );
        }
    }
}
