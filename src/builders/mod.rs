//! Builders to construct engines and schedulers from settings.

pub mod scheduler_builder;

pub use scheduler_builder::{build_engine_config, build_scheduler};
