//! Work kinds: how each engine flavour runs its payloads.
//!
//! A [`DispatchEngine`](crate::core::DispatchEngine) is generic over a
//! [`WorkKind`]. The kind fixes the payload type, the per-worker context a
//! worker thread owns for its lifetime, and how a payload is driven to
//! completion on that context.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::core::error::WorkPanic;

/// Synchronous callable accepted by the sync engine.
pub type SyncWork = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Asynchronous callable accepted by the async engine.
///
/// Calling it produces the future the worker awaits before dequeuing again.
pub type AsyncWork = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send + 'static>;

/// Which engine flavour executed an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Synchronous callables.
    Sync,
    /// Asynchronous callables.
    Async,
}

impl ExecutionKind {
    /// Lowercase label used in thread names and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy describing how an engine executes its payloads.
pub trait WorkKind: Send + Sync + 'static {
    /// Callable type queued by the engine.
    type Payload: Send + 'static;

    /// State owned by one worker thread for its whole lifetime.
    type Context;

    /// Engine flavour reported in hooks, logs and errors.
    const KIND: ExecutionKind;

    /// Build the worker context on the worker thread.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while building the context.
    fn worker_context() -> std::io::Result<Self::Context>;

    /// Run `payload` to completion on the worker thread.
    ///
    /// # Errors
    ///
    /// Returns whatever failure the payload produced.
    fn run(context: &Self::Context, payload: Self::Payload) -> anyhow::Result<()>;
}

/// Work kind for [`SyncWork`] callables, run inline on the worker thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncKind;

impl WorkKind for SyncKind {
    type Payload = SyncWork;
    type Context = ();

    const KIND: ExecutionKind = ExecutionKind::Sync;

    fn worker_context() -> std::io::Result<Self::Context> {
        Ok(())
    }

    fn run(_context: &Self::Context, payload: Self::Payload) -> anyhow::Result<()> {
        payload()
    }
}

/// Work kind for [`AsyncWork`] callables.
///
/// Every worker thread owns a current-thread tokio runtime and blocks on the
/// payload's future. Tasks the payload spawns onto that runtime only make
/// progress while the worker is driving a payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncKind;

impl WorkKind for AsyncKind {
    type Payload = AsyncWork;
    type Context = tokio::runtime::Runtime;

    const KIND: ExecutionKind = ExecutionKind::Async;

    fn worker_context() -> std::io::Result<Self::Context> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
    }

    fn run(context: &Self::Context, payload: Self::Payload) -> anyhow::Result<()> {
        let future = payload();
        // Keep panics from unwinding through the runtime's block_on.
        context
            .block_on(AssertUnwindSafe(future).catch_unwind())
            .unwrap_or_else(|panic| Err(WorkPanic::from_payload(&*panic).into()))
    }
}
