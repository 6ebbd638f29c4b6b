//! Integration tests for HybridScheduler
//!
//! These tests validate:
//! - Routing of sync and async callables
//! - Metrics aggregation over both engines
//! - Settings-driven construction
//! - Shutdown semantics

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use weighted_dispatch::{
    build_scheduler, DispatchError, EngineConfig, EngineSettings, ExecutionHooks,
    ExecutionKind, HybridScheduler, SchedulerSettings, WorkIdSource,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn recording_hooks(log: &Arc<Mutex<Vec<(u64, bool)>>>) -> ExecutionHooks {
    let log = Arc::clone(log);
    ExecutionHooks::new().after(move |info| log.lock().push((info.id, info.is_async)))
}

// ============================================================================
// ROUTING
// ============================================================================

#[test]
fn test_sync_and_async_work_reach_their_engines() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let hooks = recording_hooks(&log);
    let scheduler = HybridScheduler::with_configs(
        EngineConfig::basic(2).unwrap().with_hooks(hooks.clone()),
        EngineConfig::basic(2).unwrap().with_hooks(hooks),
    )
    .unwrap();

    let sync_id = scheduler.submit_sync(|| Ok(())).unwrap();
    let async_id = scheduler
        .submit_async(|| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        })
        .unwrap();
    assert_ne!(sync_id, async_id);

    assert!(wait_until(Duration::from_secs(5), || log.lock().len() == 2));
    let mut entries = log.lock().clone();
    entries.sort_unstable();
    let mut expected = vec![(sync_id, false), (async_id, true)];
    expected.sort_unstable();
    assert_eq!(entries, expected);

    scheduler.dispose().unwrap();
}

#[test]
fn test_async_work_holds_worker_until_resolved() {
    let scheduler = HybridScheduler::create(EngineConfig::basic(1).unwrap()).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let active = Arc::clone(&active);
        let overlap = Arc::clone(&overlap);
        scheduler
            .submit_async(move || async move {
                if active.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.stats().async_engine.completed == 3
    }));
    assert_eq!(overlap.load(Ordering::SeqCst), 0);
    scheduler.dispose().unwrap();
}

#[test]
fn test_weighted_submissions_on_both_sides() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let scheduler = HybridScheduler::create(EngineConfig::basic(1).unwrap()).unwrap();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let started = Arc::new(AtomicUsize::new(0));

    {
        let started = Arc::clone(&started);
        scheduler
            .submit_sync_weighted(
                move || {
                    started.fetch_add(1, Ordering::SeqCst);
                    let _ = release_rx.recv_timeout(Duration::from_secs(10));
                    Ok(())
                },
                i32::MAX,
            )
            .unwrap();
    }
    assert!(wait_until(Duration::from_secs(5), || {
        started.load(Ordering::SeqCst) == 1
    }));

    for weight in [-5, 20, 0] {
        let order = Arc::clone(&order);
        scheduler
            .submit_sync_weighted(
                move || {
                    order.lock().push(weight);
                    Ok(())
                },
                weight,
            )
            .unwrap();
    }
    assert_eq!(scheduler.pending_sync_work(), 3);
    assert_eq!(scheduler.pending_async_work(), 0);
    assert_eq!(scheduler.pending_work(), 3);

    release_tx.send(()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || order.lock().len() == 3));
    assert_eq!(*order.lock(), vec![20, 0, -5]);
    scheduler.dispose().unwrap();
}

// ============================================================================
// CAPACITY AND IDS
// ============================================================================

#[test]
fn test_submission_to_engine_without_workers_is_rejected() {
    let scheduler =
        HybridScheduler::with_configs(EngineConfig::basic(1).unwrap(), EngineConfig::disabled())
            .unwrap();

    let err = scheduler.submit_sync(|| Ok(())).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::NoCapacity {
            kind: ExecutionKind::Sync
        }
    ));
    assert_eq!(scheduler.pending_work(), 0);
    assert!(scheduler.submit_async(|| async { Ok(()) }).is_ok());
    scheduler.dispose().unwrap();
}

#[test]
fn test_injected_id_source_is_shared() {
    let ids = WorkIdSource::new();
    let scheduler = HybridScheduler::with_id_source(
        EngineConfig::basic(1).unwrap(),
        EngineConfig::basic(1).unwrap(),
        ids.clone(),
    )
    .unwrap();

    let mut seen: Vec<u64> = (0..5)
        .map(|i| {
            if i % 2 == 0 {
                scheduler.submit_sync(|| Ok(())).unwrap()
            } else {
                scheduler.submit_async(|| async { Ok(()) }).unwrap()
            }
        })
        .collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert_eq!(ids.peek(), 6);
    scheduler.dispose().unwrap();
}

// ============================================================================
// ELASTIC METRICS
// ============================================================================

#[test]
fn test_elastic_workers_summed_and_retired() {
    let idle_timeout = Duration::from_millis(40);
    let scheduler = HybridScheduler::with_configs(
        EngineConfig::elastic(0, 2, idle_timeout).unwrap(),
        EngineConfig::elastic(0, 2, idle_timeout).unwrap(),
    )
    .unwrap();

    for _ in 0..4 {
        scheduler
            .submit_sync(|| {
                thread::sleep(Duration::from_millis(20));
                Ok(())
            })
            .unwrap();
        scheduler
            .submit_async(|| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            })
            .unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.current_sync_elastic_workers() >= 1
            && scheduler.current_async_elastic_workers() >= 1
    }));
    assert!(scheduler.current_elastic_workers() <= 4);

    assert!(wait_until(Duration::from_secs(5), || {
        let stats = scheduler.stats();
        stats.sync_engine.completed == 4 && stats.async_engine.completed == 4
    }));
    assert!(wait_until(idle_timeout + Duration::from_millis(500), || {
        scheduler.current_elastic_workers() == 0
    }));
    let stats = scheduler.stats();
    assert!(stats.sync_engine.peak_elastic_workers <= 2);
    assert!(stats.async_engine.peak_elastic_workers <= 2);
    scheduler.dispose().unwrap();
}

// ============================================================================
// SETTINGS AND SHUTDOWN
// ============================================================================

#[test]
fn test_build_scheduler_from_json_settings() {
    let settings = SchedulerSettings::from_json_str(
        r#"{
            "sync_engine": { "mode": "basic", "fixed_workers": 2 },
            "async_engine": { "mode": "elastic", "max_elastic_workers": 2, "idle_timeout_ms": 30 }
        }"#,
    )
    .unwrap();
    assert!(matches!(settings.async_engine, EngineSettings::Elastic { .. }));

    let failures = Arc::new(AtomicUsize::new(0));
    let hooks = {
        let failures = Arc::clone(&failures);
        ExecutionHooks::new().on_failure(move |_, _| {
            failures.fetch_add(1, Ordering::SeqCst);
        })
    };
    let scheduler = build_scheduler(&settings, hooks).unwrap();

    scheduler
        .submit_sync(|| Err(anyhow::anyhow!("sync failure")))
        .unwrap();
    scheduler
        .submit_async(|| async { Err(anyhow::anyhow!("async failure")) })
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        failures.load(Ordering::SeqCst) == 2
    }));
    scheduler.dispose().unwrap();
}

#[test]
fn test_stats_serialize_to_json() {
    let scheduler = HybridScheduler::create(EngineConfig::basic(1).unwrap()).unwrap();
    scheduler.submit_sync(|| Ok(())).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.stats().sync_engine.completed == 1
    }));

    let json = serde_json::to_value(scheduler.stats()).unwrap();
    assert_eq!(json["sync_engine"]["kind"], "sync");
    assert_eq!(json["sync_engine"]["submitted"], 1);
    assert_eq!(json["async_engine"]["kind"], "async");
    scheduler.dispose().unwrap();
}

#[test]
fn test_second_dispose_fails() {
    let scheduler = HybridScheduler::create(
        EngineConfig::elastic(1, 2, Duration::from_millis(20)).unwrap(),
    )
    .unwrap();
    scheduler.submit_sync(|| Ok(())).unwrap();

    scheduler.dispose().unwrap();
    let err = scheduler.dispose().unwrap_err();
    assert!(matches!(err, DispatchError::AlreadyDisposed));
    assert_eq!(err.to_string(), "dispatcher has already been disposed");
}
