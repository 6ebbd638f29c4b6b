//! # Weighted Dispatch
//!
//! A weighted, elastically-scaled work dispatcher for sync and async callables.
//!
//! Work is submitted with an integer weight and executed by a bounded pool of
//! dedicated worker threads, heaviest first. Each engine keeps a configurable
//! number of persistent workers and can grow up to a ceiling of elastic
//! workers that retire after an idle timeout.
//!
//! ## Core Pieces
//!
//! - **`WeightedQueue`**: thread-safe max-priority queue keyed by weight
//! - **`DispatchEngine`**: queue plus fixed and elastic workers for one kind of
//!   work (`SyncEngine`, `AsyncEngine`)
//! - **`HybridScheduler`**: one sync and one async engine behind a single
//!   submission surface
//! - **`ExecutionHooks`**: before / after / on-failure callbacks around every
//!   execution
//! - **`EngineConfig`**: validated engine settings (`basic`, `elastic`,
//!   `disabled`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use weighted_dispatch::{EngineConfig, ExecutionHooks, HybridScheduler};
//!
//! # fn main() -> weighted_dispatch::DispatchResult<()> {
//! let hooks = ExecutionHooks::new()
//!     .after(|info| println!("finished #{} (weight {})", info.id, info.weight))
//!     .on_failure(|info, error| eprintln!("#{} failed: {error:#}", info.id));
//!
//! let scheduler = HybridScheduler::with_configs(
//!     EngineConfig::elastic(0, 8, Duration::from_secs(2))?.with_hooks(hooks.clone()),
//!     EngineConfig::basic(4)?.with_hooks(hooks),
//! )?;
//!
//! scheduler.submit_sync_weighted(|| Ok(()), 100)?;
//! scheduler.submit_async(|| async {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     Ok(())
//! })?;
//!
//! scheduler.dispose()?;
//! # Ok(())
//! # }
//! ```
//!
//! Execution failures never reach the submitter; they are observable only
//! through the `on_failure` hook and the engine statistics.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core dispatch abstractions: work items, hooks, permits and engines.
pub mod core;
/// Configuration models for engines and schedulers.
pub mod config;
/// Builders to construct engines and schedulers from settings.
pub mod builders;
/// Infrastructure adapters: the weighted queue.
pub mod infra;
/// Shared utilities.
pub mod util;

pub use crate::builders::{build_engine_config, build_scheduler};
pub use crate::config::{EngineConfig, EngineSettings, SchedulerSettings};
pub use crate::core::{
    AsyncEngine, DispatchEngine, DispatchError, DispatchResult, EngineStats, ExecutionHooks,
    ExecutionInfo, ExecutionKind, HybridScheduler, SchedulerStats, SyncEngine, Weight, WorkId,
    WorkIdSource, DEFAULT_WEIGHT,
};
pub use crate::infra::queue::WeightedQueue;
pub use crate::util::{init_tracing, init_tracing_with_default};
