//! Configuration models for engines and schedulers.

pub mod engine;
pub mod settings;

pub use engine::EngineConfig;
pub use settings::{EngineSettings, SchedulerSettings};
