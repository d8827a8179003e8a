//! # chess-explainer
//!
//! Grounded natural-language explanations of chess moves.
//!
//! A generative model is first asked to read the position back; its reading
//! is validated square by square against the authoritative board and retried
//! with correction hints until it is accepted or the budget runs out, in
//! which case ground truth is substituted. Deterministic theme and tactical
//! analysis (cached by position) is then combined with the grounded
//! placement into a single prompt for the final explanation.
//!
//! The entry point is [`ExplanationAgent::explain`]; [`server`] exposes it
//! over HTTP.

pub mod analysis;
pub mod cache;
pub mod explain;
pub mod extraction;
pub mod llms;
pub mod position;
pub mod retry;
pub mod server;
pub mod utilities;
pub mod validation;

pub use analysis::{AnalysisService, PatternSet, ThemeSet};
pub use cache::{CacheLayer, FileCache, InMemoryCache};
pub use explain::{ExplanationAgent, ExplanationRequest, ExplanationResult, MoveClassification};
pub use extraction::{ExtractionResult, PositionExtractionAgent};
pub use llms::{AnthropicCompletion, GenerativeModel, LlmError};
pub use position::Position;
pub use retry::{Resolution, RetryController, RetryStats};
pub use utilities::{ExplainError, PipelineConfig};
pub use validation::{PositionValidator, ValidationVerdict};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
