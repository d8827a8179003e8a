//! The generative-model capability.
//!
//! Every non-deterministic, high-latency edge of the pipeline goes through
//! [`GenerativeModel::complete`]: prompt in, text or structured value out, or
//! an [`LlmError`]. Nothing else in the crate talks to a model directly, so the
//! validator and analysers stay testable without a network.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// A single completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The user prompt.
    pub prompt: String,
    /// Optional system instruction.
    pub system: Option<String>,
    /// JSON schema the response should follow. When set, providers return
    /// [`Completion::Structured`] if the output parses as JSON.
    pub response_schema: Option<Value>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// What a model returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Completion {
    /// Free text.
    Text(String),
    /// A JSON value produced against a response schema.
    Structured(Value),
}

impl Completion {
    /// Text form of the completion; structured values are rendered as JSON.
    pub fn into_text(self) -> String {
        match self {
            Completion::Text(text) => text,
            Completion::Structured(value) => value.to_string(),
        }
    }

    /// JSON form of the completion, extracting embedded JSON from text.
    pub fn into_json(self) -> Result<Value, String> {
        match self {
            Completion::Structured(value) => Ok(value),
            Completion::Text(text) => validate_structured_output(&text),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Transport-level failures of a model call.
///
/// All variants count as transport failures for retry purposes; content that
/// arrives but cannot be used is not an `LlmError`.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Model call timed out after {seconds}s")]
    Timeout { seconds: f64 },

    #[error("Model service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Rate limited by model service")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unreadable model response: {message}")]
    InvalidBody { message: String },

    #[error("{provider} API key not set")]
    MissingApiKey { provider: String },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A generative model service.
///
/// Implementations must be safe to share across concurrent requests and make
/// no determinism promise: two identical requests may return different text.
#[async_trait]
pub trait GenerativeModel: Send + Sync + fmt::Debug {
    /// Model identifier, used in logs.
    fn model(&self) -> &str;

    /// Provider name, used in logs.
    fn provider(&self) -> &str {
        "custom"
    }

    /// Issue one completion call.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

// ---------------------------------------------------------------------------
// Call helpers
// ---------------------------------------------------------------------------

/// Generate a unique call ID for log correlation.
pub fn generate_call_id() -> String {
    Uuid::new_v4().to_string()
}

/// Call `model` with a hard timeout. An elapsed timeout becomes
/// [`LlmError::Timeout`], so callers see one error type for every
/// transport failure.
pub async fn complete_with_timeout(
    model: &dyn GenerativeModel,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<Completion, LlmError> {
    let call_id = generate_call_id();
    emit_call_started_event(model.model(), &request, &call_id);

    let outcome = match tokio::time::timeout(timeout, model.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            seconds: timeout.as_secs_f64(),
        }),
    };

    match &outcome {
        Ok(_) => emit_call_completed_event(model.model(), &call_id),
        Err(e) => emit_call_failed_event(model.model(), &e.to_string(), &call_id),
    }
    outcome
}

static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON object regex is valid"));

/// Parse structured output from a model response.
///
/// Tries the whole response as JSON first, then falls back to the outermost
/// `{...}` span (models like to wrap JSON in prose or code fences).
pub fn validate_structured_output(response: &str) -> Result<Value, String> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(val) = serde_json::from_str::<Value>(trimmed) {
            return Ok(val);
        }
    }

    if let Some(m) = JSON_OBJECT_RE.find(response) {
        if let Ok(val) = serde_json::from_str::<Value>(m.as_str()) {
            return Ok(val);
        }
    }

    Err("No JSON found in response".to_string())
}

fn emit_call_started_event(model: &str, request: &CompletionRequest, call_id: &str) {
    log::debug!(
        "LLM call started: model={}, call_id={}, prompt_len={}, structured={}",
        model,
        call_id,
        request.prompt.len(),
        request.response_schema.is_some()
    );
}

fn emit_call_completed_event(model: &str, call_id: &str) {
    log::debug!("LLM call completed: model={}, call_id={}", model, call_id);
}

fn emit_call_failed_event(model: &str, error: &str, call_id: &str) {
    log::warn!(
        "LLM call failed: model={}, error={}, call_id={}",
        model,
        error,
        call_id
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
