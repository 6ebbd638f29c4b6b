//! Error types for dispatch operations.

use std::any::Any;

use thiserror::Error;

use crate::core::work::ExecutionKind;

/// Errors surfaced synchronously by engines and schedulers.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Worker/elastic/timeout combination is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The target engine has neither fixed workers nor elastic capacity.
    #[error("{kind} engine has no workers configured; submission rejected")]
    NoCapacity {
        /// Engine the submission was routed to.
        kind: ExecutionKind,
    },
    /// The engine or scheduler has already been disposed.
    #[error("dispatcher has already been disposed")]
    AlreadyDisposed,
    /// An OS thread for a worker could not be started.
    #[error("failed to spawn {kind} worker thread: {source}")]
    WorkerSpawn {
        /// Engine the worker belongs to.
        kind: ExecutionKind,
        /// Underlying spawn failure.
        #[source]
        source: std::io::Error,
    },
    /// Worker threads panicked before they could be joined.
    #[error("{failed} {kind} worker thread(s) panicked before joining")]
    WorkerJoin {
        /// Engine the workers belong to.
        kind: ExecutionKind,
        /// Number of workers whose join reported a panic.
        failed: usize,
    },
}

/// Result alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// A panic caught while running a work item or one of its hooks.
///
/// Delivered to the failure hook wrapped in an [`anyhow::Error`], so it can be
/// recovered with `error.downcast_ref::<WorkPanic>()`.
#[derive(Debug, Error)]
#[error("work item panicked: {0}")]
pub struct WorkPanic(pub String);

impl WorkPanic {
    /// Build from the payload returned by `catch_unwind`.
    #[must_use]
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self(message)
    }
}
