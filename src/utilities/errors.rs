//! Error types shared across the pipeline.
//!
//! Transport errors from the generative model live with the model trait in
//! [`crate::llms::base_llm::LlmError`].

use thiserror::Error;

use crate::llms::base_llm::LlmError;

/// Errors building or querying a [`crate::position::Position`].
#[derive(Debug, Error)]
pub enum PositionError {
    /// The FEN string was rejected by the board parser.
    #[error("Invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    /// A square name could not be parsed.
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
}

/// Errors from a cache backend. Callers treat every one of these as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or failed mid-operation.
    #[error("Cache backend error: {message}")]
    Backend { message: String },

    /// A stored value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure in the on-disk backend.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading or validating [`crate::utilities::config::PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Errors surfaced by [`crate::explain::ExplanationAgent::explain`].
///
/// Grounding, malformed-response and cache failures are recovered inside the
/// pipeline and never appear here.
#[derive(Debug, Error)]
pub enum ExplainError {
    /// The final generation call failed after its retry.
    #[error("Explanation generation failed after {attempts} attempt(s): {source}")]
    Generation {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    /// A result was about to be built on an unvalidated, uncorrected extraction.
    #[error("Refusing to build an explanation on ungrounded position data: {detail}")]
    Ungrounded { detail: String },
}
