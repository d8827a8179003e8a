//! Grounded move explanation.
//!
//! [`ExplanationAgent::explain`] resolves grounding through the retry
//! controller, gathers themes and motifs through the analysis service, and
//! makes a single generation call over a prompt built from that data.

pub mod agent;
pub mod prompt;
pub mod request;

pub use agent::{ExplanationAgent, DEFAULT_GENERATION_RETRIES};
pub use request::{ensure_grounded, ExplanationRequest, ExplanationResult, MoveClassification};
