//! Position extraction: asking the model what it sees.
//!
//! The agent frames the authoritative FEN as context, asks for a per-square
//! inventory in JSON, and parses whatever comes back into an
//! [`ExtractionResult`]. Correction hints from a failed validation are
//! appended on retries.

pub mod agent;
pub mod claim;
pub mod parser;
pub mod prompts;

pub use agent::{PositionExtractionAgent, PositionExtractor};
pub use claim::{ExtractionResult, PieceClaim, Provenance};
pub use parser::parse_extraction;
