//! The position extraction agent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::claim::ExtractionResult;
use super::parser::parse_extraction;
use super::prompts::{extraction_prompt, extraction_schema, EXTRACTION_SYSTEM_PROMPT};
use crate::llms::base_llm::{complete_with_timeout, CompletionRequest, GenerativeModel, LlmError};
use crate::position::Position;
use crate::validation::Discrepancy;

/// Anything that can produce an [`ExtractionResult`] for a position.
///
/// `Err` is reserved for transport failures; unusable content comes back as
/// a malformed (zero-confidence) result.
#[async_trait]
pub trait PositionExtractor: Send + Sync + fmt::Debug {
    async fn extract(
        &self,
        position: &Position,
        feedback: &[Discrepancy],
    ) -> Result<ExtractionResult, LlmError>;
}

/// Asks a generative model what it sees in a position.
#[derive(Debug, Clone)]
pub struct PositionExtractionAgent {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl PositionExtractionAgent {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            max_tokens: 1024,
            temperature: Some(0.0),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    /// The request sent for `position`, with correction hints from `feedback`.
    pub fn build_request(&self, position: &Position, feedback: &[Discrepancy]) -> CompletionRequest {
        CompletionRequest::new(extraction_prompt(position, feedback))
            .with_system(EXTRACTION_SYSTEM_PROMPT)
            .with_schema(extraction_schema())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

#[async_trait]
impl PositionExtractor for PositionExtractionAgent {
    async fn extract(
        &self,
        position: &Position,
        feedback: &[Discrepancy],
    ) -> Result<ExtractionResult, LlmError> {
        log::debug!(
            "Extracting position {} (feedback items: {})",
            position.identity(),
            feedback.len()
        );
        let request = self.build_request(position, feedback);
        let completion = complete_with_timeout(self.model.as_ref(), request, self.timeout).await?;

        match completion.into_json() {
            Ok(value) => Ok(parse_extraction(&value)),
            Err(reason) => {
                log::warn!("Extraction response was not parseable: {}", reason);
                Ok(ExtractionResult::malformed(reason))
            }
        }
    }
}
