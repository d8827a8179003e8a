//! Configuration and error types shared across the pipeline.

pub mod config;
pub mod errors;

pub use config::{CacheBackend, PipelineConfig};
pub use errors::{CacheError, ConfigError, ExplainError, PositionError};
