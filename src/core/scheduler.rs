//! Hybrid scheduler routing sync and async work to dedicated engines.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::engine::{AsyncEngine, EngineStats, SyncEngine};
use crate::core::error::{DispatchError, DispatchResult};
use crate::core::work::{AsyncWork, SyncWork};
use crate::core::work_item::{Weight, WorkId, WorkIdSource, DEFAULT_WEIGHT};

/// Statistics for both engines of a [`HybridScheduler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Sync engine snapshot.
    pub sync_engine: EngineStats,
    /// Async engine snapshot.
    pub async_engine: EngineStats,
}

/// Two dispatch engines behind one submission surface.
///
/// Sync callables run on the sync engine's threads; async callables are
/// driven to completion on the async engine's threads. Both engines draw item
/// ids from the same [`WorkIdSource`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use weighted_dispatch::{EngineConfig, HybridScheduler};
///
/// # fn main() -> weighted_dispatch::DispatchResult<()> {
/// let scheduler = HybridScheduler::with_configs(
///     EngineConfig::elastic(1, 4, Duration::from_millis(500))?,
///     EngineConfig::basic(2)?,
/// )?;
///
/// scheduler.submit_sync_weighted(|| Ok(()), 10)?;
/// scheduler.submit_async(|| async { Ok(()) })?;
///
/// scheduler.dispose()?;
/// # Ok(())
/// # }
/// ```
pub struct HybridScheduler {
    sync_engine: SyncEngine,
    async_engine: AsyncEngine,
    ids: WorkIdSource,
    disposed: AtomicBool,
}

impl HybridScheduler {
    /// Create a scheduler whose engines both use `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either engine fails to start.
    pub fn create(config: EngineConfig) -> DispatchResult<Self> {
        Self::with_configs(config.clone(), config)
    }

    /// Create a scheduler with independent engine configurations.
    ///
    /// # Errors
    ///
    /// Returns an error if either engine fails to start.
    pub fn with_configs(
        async_config: EngineConfig,
        sync_config: EngineConfig,
    ) -> DispatchResult<Self> {
        Self::with_id_source(async_config, sync_config, WorkIdSource::new())
    }

    /// Create a scheduler whose engines draw ids from `ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if either engine fails to start. An already started
    /// engine is disposed before returning.
    pub fn with_id_source(
        async_config: EngineConfig,
        sync_config: EngineConfig,
        ids: WorkIdSource,
    ) -> DispatchResult<Self> {
        let sync_engine = SyncEngine::with_id_source(sync_config, ids.clone())?;
        let async_engine = match AsyncEngine::with_id_source(async_config, ids.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                let _ = sync_engine.dispose();
                return Err(e);
            }
        };

        info!(
            sync_fixed_workers = sync_engine.config().fixed_workers(),
            async_fixed_workers = async_engine.config().fixed_workers(),
            "HybridScheduler started"
        );

        Ok(Self {
            sync_engine,
            async_engine,
            ids,
            disposed: AtomicBool::new(false),
        })
    }

    /// Submit a sync callable with the default weight.
    ///
    /// # Errors
    ///
    /// See [`submit_sync_weighted`](Self::submit_sync_weighted).
    pub fn submit_sync<F>(&self, work: F) -> DispatchResult<WorkId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.submit_sync_weighted(work, DEFAULT_WEIGHT)
    }

    /// Submit a sync callable. Higher weights run first.
    ///
    /// # Errors
    ///
    /// `DispatchError::NoCapacity` if the sync engine has no workers,
    /// `DispatchError::AlreadyDisposed` after disposal.
    pub fn submit_sync_weighted<F>(&self, work: F, weight: Weight) -> DispatchResult<WorkId>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.ensure_active()?;
        let work: SyncWork = Box::new(work);
        self.sync_engine.submit(work, weight)
    }

    /// Submit an async callable with the default weight.
    ///
    /// # Errors
    ///
    /// See [`submit_async_weighted`](Self::submit_async_weighted).
    pub fn submit_async<F, Fut>(&self, work: F) -> DispatchResult<WorkId>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.submit_async_weighted(work, DEFAULT_WEIGHT)
    }

    /// Submit an async callable. The future is created and awaited on an
    /// async worker, which stays occupied until it resolves.
    ///
    /// # Errors
    ///
    /// `DispatchError::NoCapacity` if the async engine has no workers,
    /// `DispatchError::AlreadyDisposed` after disposal.
    pub fn submit_async_weighted<F, Fut>(&self, work: F, weight: Weight) -> DispatchResult<WorkId>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.ensure_active()?;
        let work: AsyncWork = Box::new(move || work().boxed());
        self.async_engine.submit(work, weight)
    }

    /// Items queued on both engines.
    #[must_use]
    pub fn pending_work(&self) -> usize {
        self.pending_sync_work() + self.pending_async_work()
    }

    /// Items queued on the async engine.
    #[must_use]
    pub fn pending_async_work(&self) -> usize {
        self.async_engine.pending_work()
    }

    /// Items queued on the sync engine.
    #[must_use]
    pub fn pending_sync_work(&self) -> usize {
        self.sync_engine.pending_work()
    }

    /// Elastic workers alive on both engines.
    #[must_use]
    pub fn current_elastic_workers(&self) -> usize {
        self.current_sync_elastic_workers() + self.current_async_elastic_workers()
    }

    /// Elastic workers alive on the async engine.
    #[must_use]
    pub fn current_async_elastic_workers(&self) -> usize {
        self.async_engine.current_elastic_workers()
    }

    /// Elastic workers alive on the sync engine.
    #[must_use]
    pub fn current_sync_elastic_workers(&self) -> usize {
        self.sync_engine.current_elastic_workers()
    }

    /// Snapshot of both engines.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            sync_engine: self.sync_engine.stats(),
            async_engine: self.async_engine.stats(),
        }
    }

    /// Sync engine.
    #[must_use]
    pub const fn sync_engine(&self) -> &SyncEngine {
        &self.sync_engine
    }

    /// Async engine.
    #[must_use]
    pub const fn async_engine(&self) -> &AsyncEngine {
        &self.async_engine
    }

    /// Id source shared by both engines.
    #[must_use]
    pub const fn id_source(&self) -> &WorkIdSource {
        &self.ids
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Shut down both engines, joining all workers.
    ///
    /// Worker join failures are logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// `DispatchError::AlreadyDisposed` on every call after the first.
    pub fn dispose(&self) -> DispatchResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::AlreadyDisposed);
        }

        for result in [self.sync_engine.dispose(), self.async_engine.dispose()] {
            match result {
                Ok(()) => {}
                Err(DispatchError::WorkerJoin { kind, failed }) => {
                    warn!(kind = %kind, failed = failed, "Ignoring worker join failures");
                }
                Err(e) => return Err(e),
            }
        }

        info!("HybridScheduler disposed");
        Ok(())
    }

    fn ensure_active(&self) -> DispatchResult<()> {
        if self.is_disposed() {
            Err(DispatchError::AlreadyDisposed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for HybridScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridScheduler")
            .field("pending_sync_work", &self.pending_sync_work())
            .field("pending_async_work", &self.pending_async_work())
            .field("ids", &self.ids)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::work::ExecutionKind;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_routes_by_kind() {
        let scheduler = HybridScheduler::create(EngineConfig::basic(1).unwrap()).unwrap();
        let sync_hits = Arc::new(AtomicUsize::new(0));
        let async_hits = Arc::new(AtomicUsize::new(0));

        {
            let sync_hits = Arc::clone(&sync_hits);
            scheduler
                .submit_sync(move || {
                    let name = std::thread::current().name().map(str::to_string);
                    assert_eq!(name.as_deref(), Some("dispatch-sync-fixed-0"));
                    sync_hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
        {
            let async_hits = Arc::clone(&async_hits);
            scheduler
                .submit_async(move || async move {
                    tokio::task::yield_now().await;
                    async_hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        assert!(wait_until(Duration::from_secs(5), || {
            sync_hits.load(Ordering::SeqCst) == 1 && async_hits.load(Ordering::SeqCst) == 1
        }));
        assert!(wait_until(Duration::from_secs(1), || {
            let stats = scheduler.stats();
            stats.sync_engine.completed == 1 && stats.async_engine.completed == 1
        }));
        assert_eq!(scheduler.stats().sync_engine.kind, ExecutionKind::Sync);
        scheduler.dispose().unwrap();
    }

    #[test]
    fn test_ids_unique_across_engines() {
        let scheduler = HybridScheduler::with_id_source(
            EngineConfig::basic(1).unwrap(),
            EngineConfig::basic(1).unwrap(),
            WorkIdSource::starting_at(10),
        )
        .unwrap();

        let a = scheduler.submit_sync(|| Ok(())).unwrap();
        let b = scheduler.submit_async(|| async { Ok(()) }).unwrap();
        let c = scheduler.submit_sync(|| Ok(())).unwrap();
        assert_eq!((a, b, c), (10, 11, 12));
        assert_eq!(scheduler.id_source().peek(), 13);

        scheduler.dispose().unwrap();
    }

    #[test]
    fn test_disabled_side_rejects() {
        let scheduler =
            HybridScheduler::with_configs(EngineConfig::disabled(), EngineConfig::basic(1).unwrap())
                .unwrap();

        let err = scheduler.submit_async(|| async { Ok(()) }).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::NoCapacity {
                kind: ExecutionKind::Async
            }
        ));
        assert!(scheduler.submit_sync(|| Ok(())).is_ok());
        scheduler.dispose().unwrap();
    }

    #[test]
    fn test_dispose_twice_and_submit_after_dispose() {
        let scheduler = HybridScheduler::create(EngineConfig::basic(1).unwrap()).unwrap();
        scheduler.dispose().unwrap();
        assert!(scheduler.is_disposed());
        assert!(matches!(scheduler.dispose(), Err(DispatchError::AlreadyDisposed)));
        assert!(matches!(
            scheduler.submit_sync(|| Ok(())),
            Err(DispatchError::AlreadyDisposed)
        ));
        assert!(matches!(
            scheduler.submit_async(|| async { Ok(()) }),
            Err(DispatchError::AlreadyDisposed)
        ));
    }

    #[test]
    fn test_metrics_aggregate_both_engines() {
        let scheduler = HybridScheduler::with_configs(
            EngineConfig::elastic(0, 2, Duration::from_millis(30)).unwrap(),
            EngineConfig::elastic(0, 2, Duration::from_millis(30)).unwrap(),
        )
        .unwrap();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Arc::new(parking_lot::Mutex::new(release_rx));

        {
            let release_rx = Arc::clone(&release_rx);
            scheduler
                .submit_sync(move || {
                    let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
                    Ok(())
                })
                .unwrap();
        }
        scheduler
            .submit_async(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            })
            .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            scheduler.current_sync_elastic_workers() == 1
                && scheduler.current_async_elastic_workers() == 1
        }));
        assert_eq!(scheduler.current_elastic_workers(), 2);

        release_tx.send(()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            scheduler.current_elastic_workers() == 0 && scheduler.pending_work() == 0
        }));
        scheduler.dispose().unwrap();
    }
}
