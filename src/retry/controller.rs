//! The grounding retry controller.
//!
//! Drives extraction and validation as an explicit state machine:
//!
//! ```text
//! Attempting --extract--> Validating --valid--> Succeeded
//!     ^                       |
//!     +------- invalid -------+--budget spent--> FallbackCorrected
//! ```
//!
//! Every extraction call counts against the budget, whether it returns a
//! claim or fails in transport. When the budget is spent the controller
//! substitutes the authoritative position, so `resolve` always ends with a
//! valid verdict after at most `max_attempts` model calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{cache_key, read_through, write_through, CacheLayer};
use crate::extraction::{ExtractionResult, PositionExtractor, Provenance};
use crate::llms::LlmError;
use crate::position::Position;
use crate::validation::{Discrepancy, PositionValidator, ValidationVerdict};

/// Default extraction budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const EXTRACTION_NAMESPACE: &str = "extraction:v1";

/// Counters describing how one resolution went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStats {
    /// Model calls made, successful or not.
    pub extraction_calls: u32,
    /// Retries caused by an invalid verdict.
    pub validation_retries: u32,
    /// Calls that failed in transport (including timeouts).
    pub transport_failures: u32,
    /// Calls whose reply could not be parsed into a claim.
    pub malformed_responses: u32,
    /// Whether a memoized extraction was reused.
    pub memo_hit: bool,
}

/// A grounded extraction and the verdict that accepted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub extraction: ExtractionResult,
    pub verdict: ValidationVerdict,
    pub stats: RetryStats,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.extraction.is_fallback()
    }
}

/// What one extraction call produced.
#[derive(Debug)]
pub enum AttemptOutcome {
    Extracted(ExtractionResult),
    TransportFailed(LlmError),
}

/// The states of one resolution.
#[derive(Debug)]
pub enum ResolveState {
    /// Ready to call the extractor. `attempt` calls have been made so far.
    Attempting {
        attempt: u32,
        feedback: Vec<Discrepancy>,
    },
    /// Call number `attempt` has returned.
    Validating {
        attempt: u32,
        feedback: Vec<Discrepancy>,
        outcome: AttemptOutcome,
    },
    Succeeded {
        extraction: ExtractionResult,
        verdict: ValidationVerdict,
    },
    FallbackCorrected,
}

impl ResolveState {
    pub fn initial() -> Self {
        ResolveState::Attempting {
            attempt: 0,
            feedback: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolveState::Succeeded { .. } | ResolveState::FallbackCorrected
        )
    }
}

/// Bounded extract-validate-retry loop with a fallback to ground truth.
#[derive(Clone)]
pub struct RetryController {
    extractor: Arc<dyn PositionExtractor>,
    validator: PositionValidator,
    max_attempts: u32,
    memo: Option<Arc<dyn CacheLayer>>,
    memo_ttl: Option<Duration>,
}

impl fmt::Debug for RetryController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryController")
            .field("extractor", &self.extractor)
            .field("validator", &self.validator)
            .field("max_attempts", &self.max_attempts)
            .field("memoized", &self.memo.is_some())
            .finish()
    }
}

impl RetryController {
    pub fn new(extractor: Arc<dyn PositionExtractor>, validator: PositionValidator) -> Self {
        Self {
            extractor,
            validator,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            memo: None,
            memo_ttl: None,
        }
    }

    /// Set the extraction budget. Zero means fall back without calling the model.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Memoize accepted model-derived extractions in `cache`.
    pub fn with_memo(mut self, cache: Arc<dyn CacheLayer>, ttl: Option<Duration>) -> Self {
        self.memo = Some(cache);
        self.memo_ttl = ttl;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn validator(&self) -> &PositionValidator {
        &self.validator
    }

    /// Resolve grounding for `position`.
    pub async fn resolve(&self, position: &Position) -> Resolution {
        let mut stats = RetryStats::default();

        if let Some(resolution) = self.recall(position).await {
            return resolution;
        }

        let mut state = ResolveState::initial();
        while !state.is_terminal() {
            state = self.step(state, position, &mut stats).await;
        }

        match state {
            ResolveState::Succeeded {
                extraction,
                verdict,
            } => {
                log::info!(
                    "Grounding accepted for {} after {} call(s) (confidence {:.2})",
                    position.identity(),
                    stats.extraction_calls,
                    verdict.confidence_score
                );
                self.remember(position, &extraction).await;
                Resolution {
                    extraction,
                    verdict,
                    stats,
                }
            }
            _ => {
                log::warn!(
                    "Extraction budget of {} spent for {}; substituting ground truth",
                    self.max_attempts,
                    position.identity()
                );
                Resolution {
                    extraction: ExtractionResult::fallback_corrected(position),
                    verdict: ValidationVerdict::grounded(),
                    stats,
                }
            }
        }
    }

    /// Advance the machine by one transition.
    pub async fn step(
        &self,
        state: ResolveState,
        position: &Position,
        stats: &mut RetryStats,
    ) -> ResolveState {
        match state {
            ResolveState::Attempting { attempt, .. } if attempt >= self.max_attempts => {
                ResolveState::FallbackCorrected
            }
            ResolveState::Attempting { attempt, feedback } => {
                stats.extraction_calls += 1;
                let outcome = match self.extractor.extract(position, &feedback).await {
                    Ok(extraction) => AttemptOutcome::Extracted(extraction),
                    Err(e) => AttemptOutcome::TransportFailed(e),
                };
                ResolveState::Validating {
                    attempt: attempt + 1,
                    feedback,
                    outcome,
                }
            }
            ResolveState::Validating {
                attempt,
                feedback,
                outcome,
            } => self.on_outcome(attempt, feedback, outcome, position, stats),
            terminal => terminal,
        }
    }

    fn on_outcome(
        &self,
        attempt: u32,
        feedback: Vec<Discrepancy>,
        outcome: AttemptOutcome,
        position: &Position,
        stats: &mut RetryStats,
    ) -> ResolveState {
        let next_feedback = match outcome {
            AttemptOutcome::TransportFailed(e) => {
                stats.transport_failures += 1;
                log::warn!(
                    "Extraction attempt {}/{} failed in transport: {}",
                    attempt,
                    self.max_attempts,
                    e
                );
                feedback
            }
            AttemptOutcome::Extracted(extraction) => {
                if !extraction.is_well_formed() {
                    stats.malformed_responses += 1;
                }
                let verdict = self.validator.validate(&extraction, position);
                if verdict.is_valid {
                    return ResolveState::Succeeded {
                        extraction,
                        verdict,
                    };
                }
                log::debug!(
                    "Extraction attempt {}/{} rejected: confidence {:.2}, {} discrepancies",
                    attempt,
                    self.max_attempts,
                    verdict.confidence_score,
                    verdict.discrepancies.len()
                );
                if attempt < self.max_attempts {
                    stats.validation_retries += 1;
                }
                verdict.discrepancies
            }
        };

        if attempt < self.max_attempts {
            ResolveState::Attempting {
                attempt,
                feedback: next_feedback,
            }
        } else {
            ResolveState::FallbackCorrected
        }
    }

    /// A memoized extraction that still validates, if any.
    async fn recall(&self, position: &Position) -> Option<Resolution> {
        let cache = self.memo.as_deref()?;
        let key = cache_key(EXTRACTION_NAMESPACE, position.identity());
        let extraction: ExtractionResult = read_through(cache, &key).await?;
        let verdict = self.validator.validate(&extraction, position);
        if !verdict.is_valid {
            log::debug!("Ignoring memoized extraction for {}: no longer valid", position.identity());
            return None;
        }
        log::debug!("Reusing memoized extraction for {}", position.identity());
        Some(Resolution {
            extraction,
            verdict,
            stats: RetryStats {
                memo_hit: true,
                ..RetryStats::default()
            },
        })
    }

    async fn remember(&self, position: &Position, extraction: &ExtractionResult) {
        let Some(cache) = self.memo.as_deref() else {
            return;
        };
        if extraction.provenance != Provenance::ModelDerived {
            return;
        }
        let key = cache_key(EXTRACTION_NAMESPACE, position.identity());
        write_through(cache, &key, extraction, self.memo_ttl).await;
    }
}
