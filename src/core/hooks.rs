//! Execution hooks invoked around every work item.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::work::ExecutionKind;
use crate::core::work_item::{Weight, WorkId};

/// Snapshot of a work item handed to the hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExecutionInfo {
    /// Id of the executing item.
    pub id: WorkId,
    /// Weight the item was submitted with.
    pub weight: Weight,
    /// `true` when the async engine ran the item.
    pub is_async: bool,
}

impl ExecutionInfo {
    /// Engine kind that ran the item.
    #[must_use]
    pub const fn kind(&self) -> ExecutionKind {
        if self.is_async {
            ExecutionKind::Async
        } else {
            ExecutionKind::Sync
        }
    }
}

/// Hook called before or after an execution.
pub type InfoHook = Arc<dyn Fn(&ExecutionInfo) + Send + Sync>;

/// Hook called when a payload or one of its hooks fails.
pub type FailureHook = Arc<dyn Fn(&ExecutionInfo, &anyhow::Error) + Send + Sync>;

/// Optional callbacks run around each execution.
///
/// Hooks run on the worker thread without extra synchronization. A panic in
/// `before` or `after` is reported through `on_failure` exactly like a payload
/// failure.
#[derive(Clone, Default)]
pub struct ExecutionHooks {
    before: Option<InfoHook>,
    after: Option<InfoHook>,
    on_failure: Option<FailureHook>,
}

impl ExecutionHooks {
    /// Hooks with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the before-execution hook.
    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ExecutionInfo) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Register the after-execution hook, run only on success.
    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ExecutionInfo) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Register the failure hook.
    #[must_use]
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ExecutionInfo, &anyhow::Error) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    pub(crate) fn run_before(&self, info: &ExecutionInfo) {
        if let Some(hook) = &self.before {
            hook(info);
        }
    }

    pub(crate) fn run_after(&self, info: &ExecutionInfo) {
        if let Some(hook) = &self.after {
            hook(info);
        }
    }

    /// Returns `false` when no failure hook is registered.
    pub(crate) fn run_on_failure(&self, info: &ExecutionInfo, error: &anyhow::Error) -> bool {
        self.on_failure.as_ref().is_some_and(|hook| {
            hook(info, error);
            true
        })
    }

    /// Whether a failure hook is registered.
    #[must_use]
    pub const fn has_failure_hook(&self) -> bool {
        self.on_failure.is_some()
    }
}

impl fmt::Debug for ExecutionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn info() -> ExecutionInfo {
        ExecutionInfo {
            id: 9,
            weight: 3,
            is_async: false,
        }
    }

    #[test]
    fn test_empty_hooks_are_noops() {
        let hooks = ExecutionHooks::new();
        hooks.run_before(&info());
        hooks.run_after(&info());
        assert!(!hooks.run_on_failure(&info(), &anyhow::anyhow!("ignored")));
        assert!(!hooks.has_failure_hook());
    }

    #[test]
    fn test_registered_hooks_receive_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let before_calls = Arc::clone(&calls);
        let failure_calls = Arc::clone(&calls);

        let hooks = ExecutionHooks::new()
            .before(move |info| {
                assert_eq!(info.id, 9);
                before_calls.fetch_add(1, Ordering::SeqCst);
            })
            .on_failure(move |info, error| {
                assert_eq!(info.weight, 3);
                assert_eq!(error.to_string(), "bad");
                failure_calls.fetch_add(10, Ordering::SeqCst);
            });

        hooks.run_before(&info());
        hooks.run_after(&info());
        assert!(hooks.run_on_failure(&info(), &anyhow::anyhow!("bad")));
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_info_kind() {
        assert_eq!(info().kind(), ExecutionKind::Sync);
        let async_info = ExecutionInfo {
            is_async: true,
            ..info()
        };
        assert_eq!(async_info.kind(), ExecutionKind::Async);
    }
}
