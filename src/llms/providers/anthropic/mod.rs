//! Anthropic Messages API provider.
//!
//! Single-shot calls over `reqwest`: retry policy belongs to the pipeline
//! (extraction budget, final-generation retry), so this client maps every
//! failure to an [`LlmError`] and returns immediately.
//!
//! Structured output is requested by appending the response schema to the
//! system instruction and parsing the first JSON object in the reply.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::llms::base_llm::{
    validate_structured_output, Completion, CompletionRequest, GenerativeModel, LlmError,
};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicCompletion {
    /// Model name, e.g. "claude-sonnet-4-20250514".
    pub model: String,
    /// API key; falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,
    /// Custom base URL (proxies, test servers).
    pub base_url: Option<String>,
    /// Default max tokens when the request does not set one.
    pub max_tokens: u32,
    /// Default temperature when the request does not set one.
    pub temperature: Option<f64>,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicCompletion {
    /// Create a client for `model`.
    ///
    /// `timeout` bounds the HTTP exchange itself; the pipeline applies its
    /// own per-call timeout on top.
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unavailable {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            model: model.into(),
            api_key,
            base_url,
            max_tokens: 1024,
            temperature: None,
            timeout,
            client,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Get the API base URL.
    pub fn api_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Build the request body for the Messages API.
    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        });

        let mut system_parts: Vec<String> = Vec::new();
        if let Some(system) = &request.system {
            system_parts.push(system.clone());
        }
        if let Some(schema) = &request.response_schema {
            system_parts.push(format!(
                "Respond with a single JSON object matching this JSON schema and nothing else:\n{}",
                schema
            ));
        }
        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }

        if let Some(temp) = request.temperature.or(self.temperature) {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }

    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                seconds: self.timeout.as_secs_f64(),
            }
        } else {
            LlmError::Unavailable {
                message: e.to_string(),
            }
        }
    }

    /// Turn a Messages API response into a [`Completion`].
    ///
    /// Text blocks are concatenated; other block types are ignored.
    fn parse_response(
        &self,
        response: &Value,
        structured: bool,
    ) -> Result<Completion, LlmError> {
        let content = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LlmError::InvalidBody {
                message: "no content array in Anthropic response".to_string(),
            })?;

        let text: String = content
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();

        if structured {
            if let Ok(value) = validate_structured_output(&text) {
                return Ok(Completion::Structured(value));
            }
            log::debug!("Structured output requested but reply was not JSON; returning text");
        }
        Ok(Completion::Text(text))
    }
}


#[async_trait]
impl GenerativeModel for AnthropicCompletion {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| LlmError::MissingApiKey {
            provider: "Anthropic".to_string(),
        })?;

        let body = self.build_request_body(&request);
        let endpoint = format!("{}/v1/messages", self.api_base_url());

        let response = self
            .client
            .post(&endpoint)
            .header("content-type", "application/json")
            .header("x-api-key", api_key.as_str())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        let response_text = response.text().await.map_err(|e| self.transport_error(e))?;

        // Includes 529, Anthropic's "overloaded".
        if status.is_server_error() {
            return Err(LlmError::Unavailable {
                message: format!("Anthropic API server error: {}", status),
            });
        }

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: response_text.chars().take(500).collect(),
            });
        }

        let response_json: Value =
            serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidBody {
                message: format!("failed to parse Anthropic response: {}", e),
            })?;

        if response_json.get("type").and_then(|t| t.as_str()) == Some("error") {
            let err_msg = response_json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown Anthropic API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: err_msg.to_string(),
            });
        }

        if let Some(usage) = response_json.get("usage") {
            log::debug!(
                "Anthropic token usage: input={}, output={}",
                usage.get("input_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("output_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
            );
        }

        self.parse_response(&response_json, request.response_schema.is_some())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
