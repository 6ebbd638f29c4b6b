//! Engine configuration: worker counts, elastic scaling and hooks.

use std::time::Duration;

use crate::core::{DispatchError, DispatchResult, ExecutionHooks};

/// Validated settings for one dispatch engine.
///
/// Built with [`basic`](Self::basic), [`elastic`](Self::elastic) or
/// [`disabled`](Self::disabled), optionally refined with the `with_*`
/// methods, then handed to an engine which keeps it unchanged.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    fixed_workers: usize,
    max_elastic_workers: usize,
    elastic_idle_timeout: Duration,
    thread_stack_size: Option<usize>,
    hooks: ExecutionHooks,
}

impl EngineConfig {
    /// Fixed workers only.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` if `fixed_workers` is zero.
    pub fn basic(fixed_workers: usize) -> DispatchResult<Self> {
        if fixed_workers < 1 {
            return Err(DispatchError::InvalidConfig(
                "a basic configuration needs at least 1 fixed worker".into(),
            ));
        }
        Ok(Self {
            fixed_workers,
            ..Self::disabled()
        })
    }

    /// Fixed workers plus up to `max_elastic_workers` transient workers that
    /// retire after `idle_timeout` without work. `fixed_workers` may be zero.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` if `max_elastic_workers` is zero
    /// or `idle_timeout` is zero.
    pub fn elastic(
        fixed_workers: usize,
        max_elastic_workers: usize,
        idle_timeout: Duration,
    ) -> DispatchResult<Self> {
        if max_elastic_workers < 1 {
            return Err(DispatchError::InvalidConfig(
                "an elastic configuration needs at least 1 elastic worker".into(),
            ));
        }
        if idle_timeout.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "an elastic configuration needs a positive idle timeout".into(),
            ));
        }
        Ok(Self {
            fixed_workers,
            max_elastic_workers,
            elastic_idle_timeout: idle_timeout,
            ..Self::disabled()
        })
    }

    /// No workers at all. Submissions to an engine built from this are
    /// rejected; useful when a scheduler serves only one kind of work.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            fixed_workers: 0,
            max_elastic_workers: 0,
            elastic_idle_timeout: Duration::ZERO,
            thread_stack_size: None,
            hooks: ExecutionHooks::default(),
        }
    }

    /// Attach execution hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ExecutionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Stack size for worker threads.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` if `bytes` is zero.
    pub fn with_thread_stack_size(mut self, bytes: usize) -> DispatchResult<Self> {
        if bytes == 0 {
            return Err(DispatchError::InvalidConfig(
                "thread_stack_size must be greater than 0".into(),
            ));
        }
        self.thread_stack_size = Some(bytes);
        Ok(self)
    }

    /// Number of persistent workers.
    #[must_use]
    pub const fn fixed_workers(&self) -> usize {
        self.fixed_workers
    }

    /// Ceiling on concurrently live elastic workers.
    #[must_use]
    pub const fn max_elastic_workers(&self) -> usize {
        self.max_elastic_workers
    }

    /// How long an elastic worker waits for work before retiring.
    #[must_use]
    pub const fn elastic_idle_timeout(&self) -> Duration {
        self.elastic_idle_timeout
    }

    /// Worker thread stack size, if overridden.
    #[must_use]
    pub const fn thread_stack_size(&self) -> Option<usize> {
        self.thread_stack_size
    }

    /// Hooks run around each execution.
    #[must_use]
    pub const fn hooks(&self) -> &ExecutionHooks {
        &self.hooks
    }

    /// Whether elastic scaling is enabled.
    #[must_use]
    pub const fn is_elastic(&self) -> bool {
        self.max_elastic_workers > 0
    }

    /// Whether any worker could ever service a submission.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.fixed_workers > 0 || self.max_elastic_workers > 0
    }

    /// Re-check the invariants the constructors enforce.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` describing the first violation.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.is_elastic() && self.elastic_idle_timeout.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "elastic_idle_timeout must be positive when elastic workers are enabled".into(),
            ));
        }
        if self.thread_stack_size == Some(0) {
            return Err(DispatchError::InvalidConfig(
                "thread_stack_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
