//! Core dispatch abstractions: work items, hooks, permits and engines.

pub mod engine;
pub mod error;
pub mod hooks;
pub(crate) mod permits;
pub mod scheduler;
pub mod work;
pub mod work_item;

pub use engine::{AsyncEngine, DispatchEngine, EngineStats, SyncEngine};
pub use error::{DispatchError, DispatchResult, WorkPanic};
pub use hooks::{ExecutionHooks, ExecutionInfo, FailureHook, InfoHook};
pub use scheduler::{HybridScheduler, SchedulerStats};
pub use work::{AsyncKind, AsyncWork, ExecutionKind, SyncKind, SyncWork, WorkKind};
pub use work_item::{Weight, WorkId, WorkIdSource, WorkItem, DEFAULT_WEIGHT};
