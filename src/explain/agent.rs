//! The explanation agent: grounding, analysis, then one generation call.

use std::sync::Arc;
use std::time::Duration;

use crate::analysis::AnalysisService;
use crate::cache::CacheLayer;
use crate::extraction::PositionExtractionAgent;
use crate::llms::base_llm::{complete_with_timeout, CompletionRequest, GenerativeModel, LlmError};
use crate::retry::RetryController;
use crate::utilities::config::PipelineConfig;
use crate::utilities::errors::ExplainError;
use crate::validation::PositionValidator;

use super::request::{ensure_grounded, ExplanationRequest, ExplanationResult};
use super::prompt::{explanation_prompt, EXPLANATION_SYSTEM_PROMPT};

/// Retries of the final generation call after a transport failure.
pub const DEFAULT_GENERATION_RETRIES: u32 = 1;

/// Top-level orchestrator. Shareable across concurrent requests.
#[derive(Debug, Clone)]
pub struct ExplanationAgent {
    grounding: RetryController,
    analysis: Arc<AnalysisService>,
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
    generation_retries: u32,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl ExplanationAgent {
    pub fn new(
        grounding: RetryController,
        analysis: Arc<AnalysisService>,
        model: Arc<dyn GenerativeModel>,
        timeout: Duration,
    ) -> Self {
        Self {
            grounding,
            analysis,
            model,
            timeout,
            generation_retries: DEFAULT_GENERATION_RETRIES,
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Wire the whole pipeline from configuration around one model and cache.
    pub fn from_config(
        config: &PipelineConfig,
        model: Arc<dyn GenerativeModel>,
        cache: Arc<dyn CacheLayer>,
    ) -> Self {
        let extractor = PositionExtractionAgent::new(model.clone(), config.timeout())
            .with_max_tokens(config.max_tokens);
        let mut grounding = RetryController::new(
            Arc::new(extractor),
            PositionValidator::new(config.acceptance_threshold),
        )
        .with_max_attempts(config.max_attempts);
        if config.memoize_extractions {
            grounding = grounding.with_memo(cache.clone(), config.cache_ttl());
        }
        let analysis = AnalysisService::new(cache).with_ttl(config.cache_ttl());

        Self::new(grounding, Arc::new(analysis), model, config.timeout())
            .with_generation_retries(config.generation_retries)
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
    }

    pub fn with_generation_retries(mut self, retries: u32) -> Self {
        self.generation_retries = retries;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn analysis(&self) -> &AnalysisService {
        &self.analysis
    }

    /// Explain `request`.
    ///
    /// Grounding always completes before analysis, and analysis before the
    /// prompt is composed. Only a failed final generation reaches the caller.
    pub async fn explain(&self, request: &ExplanationRequest) -> Result<ExplanationResult, ExplainError> {
        let position = &request.position;
        log::info!(
            "Explaining {} in {}",
            request.played_move,
            position.identity()
        );

        let resolution = self.grounding.resolve(position).await;
        ensure_grounded(&resolution)?;
        let themes = self.analysis.themes(position).await;
        let patterns = self.analysis.patterns(position).await;

        let prompt = explanation_prompt(request, &resolution, &themes, &patterns);
        let completion_request = CompletionRequest::new(prompt)
            .with_system(EXPLANATION_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        let text = self.generate(completion_request).await?;

        ExplanationResult::new(text.trim(), resolution, themes, patterns)
    }

    async fn generate(&self, request: CompletionRequest) -> Result<String, ExplainError> {
        let attempts = self.generation_retries + 1;
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=attempts {
            match complete_with_timeout(self.model.as_ref(), request.clone(), self.timeout).await {
                Ok(completion) => return Ok(completion.into_text()),
                Err(e) => {
                    log::warn!(
                        "Explanation generation attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(ExplainError::Generation {
            attempts,
            source: last_error.unwrap_or(LlmError::Unavailable {
                message: "no generation attempt was made".to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::explain::request::MoveClassification;
    use crate::llms::base_llm::Completion;
    use crate::llms::testing::ScriptedModel;
    use crate::position::{Position, Side};
    use serde_json::json;

    const EXPLANATION: &str = "The knight forks king and rook.";

    /// A reply that reads `position` perfectly.
    fn correct_claim(position: &Position) -> serde_json::Value {
        let mut white = serde_json::Map::new();
        let mut black = serde_json::Map::new();
        for (square, piece) in position.placement() {
            let map = match piece.side {
                Side::White => &mut white,
                Side::Black => &mut black,
            };
            map.insert(square.to_string(), json!(piece.kind.as_str()));
        }
        json!({
            "white": white,
            "black": black,
            "side_to_move": position.side_to_move().as_str(),
        })
    }

    /// Answers extraction calls from `extraction` and explanation calls from `explanation`.
    fn routed_model(
        extraction: impl Fn() -> Result<Completion, LlmError> + Send + Sync + 'static,
        explanation: impl Fn() -> Result<Completion, LlmError> + Send + Sync + 'static,
    ) -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::responding(move |request| {
            if request.response_schema.is_some() {
                extraction()
            } else {
                explanation()
            }
        }))
    }

    fn agent(model: Arc<ScriptedModel>) -> ExplanationAgent {
        let extractor = PositionExtractionAgent::new(model.clone(), Duration::from_secs(1));
        let grounding = RetryController::new(Arc::new(extractor), PositionValidator::default());
        let analysis = Arc::new(AnalysisService::new(Arc::new(InMemoryCache::new())));
        ExplanationAgent::new(grounding, analysis, model, Duration::from_secs(1))
    }

    fn fork_request() -> ExplanationRequest {
        let position = Position::from_fen("r3k3/2N5/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        ExplanationRequest::new(position, "Nc7+", MoveClassification::Best)
    }

    #[tokio::test]
    async fn test_explain_grounded_on_model_reading() {
        let request = fork_request();
        let claim = correct_claim(&request.position);
        let model = routed_model(
            move || Ok(Completion::Structured(claim.clone())),
            || Ok(Completion::Text(format!("  {}  ", EXPLANATION))),
        );
        let result = agent(model.clone()).explain(&request).await.unwrap();

        assert_eq!(result.text(), EXPLANATION);
        assert!(result.verdict().is_valid);
        assert!(!result.is_fallback());
        assert_eq!(result.stats().extraction_calls, 1);
        assert_eq!(model.calls(), 2);

        let prompts = model.prompts();
        assert!(prompts[1].contains("fork for white"));
    }

    #[tokio::test]
    async fn test_explain_falls_back_after_bad_readings() {
        let request = fork_request();
        let model = routed_model(
            || Ok(Completion::Structured(json!({"white": {"a1": "queen"}, "black": {}}))),
            || Ok(Completion::Text(EXPLANATION.to_string())),
        );
        let result = agent(model.clone()).explain(&request).await.unwrap();

        assert!(result.is_fallback());
        assert!(result.verdict().is_valid);
        assert_eq!(result.verdict().confidence_score, 1.0);
        assert_eq!(result.stats().extraction_calls, 3);
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn test_generation_retried_once_then_succeeds() {
        let request = fork_request();
        let claim = correct_claim(&request.position);
        let explanations = Arc::new(parking_lot::Mutex::new(vec![
            Ok(Completion::Text(EXPLANATION.to_string())),
            Err(LlmError::Unavailable {
                message: "overloaded".to_string(),
            }),
        ]));
        let model = routed_model(move || Ok(Completion::Structured(claim.clone())), move || {
            explanations.lock().pop().unwrap_or(Err(LlmError::Unavailable {
                message: "exhausted".to_string(),
            }))
        });
        let result = agent(model.clone()).explain(&request).await.unwrap();
        assert_eq!(result.text(), EXPLANATION);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_generation_failure_is_surfaced() {
        let request = fork_request();
        let claim = correct_claim(&request.position);
        let model = routed_model(
            move || Ok(Completion::Structured(claim.clone())),
            || Err(LlmError::RateLimited {
                retry_after_secs: None,
            }),
        );
        let err = agent(model.clone()).explain(&request).await.unwrap_err();
        match err {
            ExplainError::Generation { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(source, LlmError::RateLimited { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        // One extraction plus two generation attempts.
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_analysis_cached_across_requests() {
        let request = fork_request();
        let claim = correct_claim(&request.position);
        let model = routed_model(
            move || Ok(Completion::Structured(claim.clone())),
            || Ok(Completion::Text(EXPLANATION.to_string())),
        );
        let agent = agent(model);
        agent.explain(&request).await.unwrap();
        agent.explain(&request).await.unwrap();
        assert_eq!(agent.analysis().theme_computations(), 1);
        assert_eq!(agent.analysis().pattern_computations(), 1);
    }

    #[tokio::test]
    async fn test_timeout_on_generation_counts_as_transport_failure() {
        let request = fork_request();
        let model = Arc::new(
            ScriptedModel::responding(|_| Ok(Completion::Text(EXPLANATION.to_string())))
                .with_delay(Duration::from_millis(200)),
        );
        let extractor = PositionExtractionAgent::new(model.clone(), Duration::from_millis(20));
        let grounding = RetryController::new(Arc::new(extractor), PositionValidator::default());
        let analysis = Arc::new(AnalysisService::new(Arc::new(InMemoryCache::new())));
        let agent = ExplanationAgent::new(grounding, analysis, model, Duration::from_millis(20));

        let err = agent.explain(&request).await.unwrap_err();
        assert!(matches!(
            err,
            ExplainError::Generation {
                source: LlmError::Timeout { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_from_config_honours_budget_and_retries() {
        let request = fork_request();
        let model = routed_model(
            || Ok(Completion::Structured(json!({"white": {}, "black": {}}))),
            || Err(LlmError::Unavailable {
                message: "down".to_string(),
            }),
        );
        let config = PipelineConfig {
            max_attempts: 2,
            generation_retries: 0,
            ..PipelineConfig::default()
        };
        let agent = ExplanationAgent::from_config(&config, model.clone(), Arc::new(InMemoryCache::new()));

        let err = agent.explain(&request).await.unwrap_err();
        assert!(matches!(err, ExplainError::Generation { attempts: 1, .. }));
        // Two extraction calls, one generation call.
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_agent() {
        let request = fork_request();
        let claim = correct_claim(&request.position);
        let model = routed_model(
            move || Ok(Completion::Structured(claim.clone())),
            || Ok(Completion::Text(EXPLANATION.to_string())),
        );
        let agent = agent(model);

        let results = futures::future::join_all((0..4).map(|_| agent.explain(&request))).await;
        assert_eq!(results.len(), 4);
        for result in results {
            let result = result.unwrap();
            assert!(result.verdict().is_valid);
            assert_eq!(result.text(), EXPLANATION);
        }
        assert!(agent.analysis().theme_computations() >= 1);
    }
}
