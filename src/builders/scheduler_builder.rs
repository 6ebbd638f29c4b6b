//! Turn plain settings into validated engine configurations and schedulers.

use std::time::Duration;

use crate::config::{EngineConfig, EngineSettings, SchedulerSettings};
use crate::core::{DispatchError, DispatchResult, ExecutionHooks, HybridScheduler};

/// Build an engine configuration from settings, attaching `hooks`.
///
/// # Errors
///
/// Returns `DispatchError::InvalidConfig` if the settings violate the
/// `EngineConfig` constructor rules.
pub fn build_engine_config(
    settings: &EngineSettings,
    hooks: ExecutionHooks,
) -> DispatchResult<EngineConfig> {
    let config = match *settings {
        EngineSettings::Basic { fixed_workers } => EngineConfig::basic(fixed_workers)?,
        EngineSettings::Elastic {
            fixed_workers,
            max_elastic_workers,
            idle_timeout_ms,
        } => EngineConfig::elastic(
            fixed_workers,
            max_elastic_workers,
            Duration::from_millis(idle_timeout_ms),
        )?,
        EngineSettings::Disabled => EngineConfig::disabled(),
    };
    Ok(config.with_hooks(hooks))
}

/// Build and start a hybrid scheduler from settings. Both engines share
/// `hooks`.
///
/// # Errors
///
/// Returns `DispatchError::InvalidConfig` for invalid settings, or the engine
/// start-up error.
pub fn build_scheduler(
    settings: &SchedulerSettings,
    hooks: ExecutionHooks,
) -> DispatchResult<HybridScheduler> {
    settings
        .validate()
        .map_err(|e| DispatchError::InvalidConfig(format!("config invalid: {e}")))?;

    let sync_config = build_engine_config(&settings.sync_engine, hooks.clone())?;
    let async_config = build_engine_config(&settings.async_engine, hooks)?;
    HybridScheduler::with_configs(async_config, sync_config)
}
