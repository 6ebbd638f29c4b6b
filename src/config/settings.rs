//! Serializable scheduler settings loaded from JSON or the environment.
//!
//! Settings carry only plain values; hooks are closures and are attached
//! when the settings are turned into an [`EngineConfig`](super::EngineConfig)
//! by the builders.

use serde::{Deserialize, Serialize};

use crate::core::{DispatchError, DispatchResult};

/// Plain-data description of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EngineSettings {
    /// Fixed workers only.
    Basic {
        /// Number of persistent workers.
        fixed_workers: usize,
    },
    /// Fixed workers plus auto-scaled elastic workers.
    Elastic {
        /// Number of persistent workers; may be zero.
        #[serde(default)]
        fixed_workers: usize,
        /// Ceiling on live elastic workers.
        max_elastic_workers: usize,
        /// Idle time before an elastic worker retires, in milliseconds.
        idle_timeout_ms: u64,
    },
    /// No workers; submissions are rejected.
    Disabled,
}

impl EngineSettings {
    /// Validate values against the constructor rules of `EngineConfig`.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violation.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Basic { fixed_workers } if *fixed_workers == 0 => {
                Err("fixed_workers must be greater than 0 in basic mode".into())
            }
            Self::Elastic {
                max_elastic_workers,
                ..
            } if *max_elastic_workers == 0 => {
                Err("max_elastic_workers must be greater than 0 in elastic mode".into())
            }
            Self::Elastic {
                idle_timeout_ms, ..
            } if *idle_timeout_ms == 0 => {
                Err("idle_timeout_ms must be greater than 0 in elastic mode".into())
            }
            _ => Ok(()),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::Basic {
            fixed_workers: num_cpus::get().max(1),
        }
    }
}

/// Root settings: one entry per engine of a hybrid scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Engine for synchronous callables.
    #[serde(default)]
    pub sync_engine: EngineSettings,
    /// Engine for asynchronous callables.
    #[serde(default)]
    pub async_engine: EngineSettings,
}

/// Environment variable prefix for [`SchedulerSettings::from_env`].
pub const ENV_PREFIX: &str = "DISPATCH";

impl SchedulerSettings {
    /// Validate both engines.
    ///
    /// # Errors
    ///
    /// Returns a message naming the invalid engine.
    pub fn validate(&self) -> Result<(), String> {
        self.sync_engine
            .validate()
            .map_err(|e| format!("sync engine invalid: {e}"))?;
        self.async_engine
            .validate()
            .map_err(|e| format!("async engine invalid: {e}"))?;
        Ok(())
    }

    /// Parse settings from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` on parse or validation failure.
    pub fn from_json_str(input: &str) -> DispatchResult<Self> {
        let settings: Self = serde_json::from_str(input)
            .map_err(|e| DispatchError::InvalidConfig(format!("parse error: {e}")))?;
        settings.validate().map_err(DispatchError::InvalidConfig)?;
        Ok(settings)
    }

    /// Read settings from the process environment, loading a `.env` file
    /// first if one is present.
    ///
    /// See [`from_lookup`](Self::from_lookup) for the variables consulted.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` on malformed or invalid values.
    pub fn from_env() -> DispatchResult<Self> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from a key lookup.
    ///
    /// For each engine (`SYNC`, `ASYNC`) reads
    /// `DISPATCH_<ENGINE>_FIXED_WORKERS`, `DISPATCH_<ENGINE>_MAX_ELASTIC_WORKERS`
    /// and `DISPATCH_<ENGINE>_ELASTIC_IDLE_TIMEOUT_MS`. A non-zero elastic
    /// ceiling selects elastic mode; zero fixed workers without an elastic
    /// ceiling selects disabled mode. Fixed workers default to the number of
    /// CPUs.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidConfig` on malformed or invalid values.
    pub fn from_lookup<F>(lookup: F) -> DispatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self {
            sync_engine: engine_from_lookup(&lookup, "SYNC")?,
            async_engine: engine_from_lookup(&lookup, "ASYNC")?,
        };
        settings.validate().map_err(DispatchError::InvalidConfig)?;
        Ok(settings)
    }
}

fn engine_from_lookup<F>(lookup: &F, engine: &str) -> DispatchResult<EngineSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| -> DispatchResult<Option<u64>> {
        let key = format!("{ENV_PREFIX}_{engine}_{name}");
        lookup(&key)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|e| {
                    DispatchError::InvalidConfig(format!("{key}: cannot parse `{raw}`: {e}"))
                })
            })
            .transpose()
    };
    let to_usize = |value: u64| {
        usize::try_from(value)
            .map_err(|e| DispatchError::InvalidConfig(format!("{engine} worker count: {e}")))
    };

    let fixed_workers = match read("FIXED_WORKERS")? {
        Some(value) => to_usize(value)?,
        None => num_cpus::get().max(1),
    };
    let max_elastic_workers = to_usize(read("MAX_ELASTIC_WORKERS")?.unwrap_or(0))?;

    if max_elastic_workers > 0 {
        let idle_timeout_ms = read("ELASTIC_IDLE_TIMEOUT_MS")?.ok_or_else(|| {
            DispatchError::InvalidConfig(format!(
                "{ENV_PREFIX}_{engine}_ELASTIC_IDLE_TIMEOUT_MS is required in elastic mode"
            ))
        })?;
        Ok(EngineSettings::Elastic {
            fixed_workers,
            max_elastic_workers,
            idle_timeout_ms,
        })
    } else if fixed_workers == 0 {
        Ok(EngineSettings::Disabled)
    } else {
        Ok(EngineSettings::Basic { fixed_workers })
    }
}
