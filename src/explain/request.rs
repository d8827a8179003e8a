//! Explanation requests, results and move classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::{PatternSet, ThemeSet};
use crate::extraction::ExtractionResult;
use crate::position::Position;
use crate::retry::{Resolution, RetryStats};
use crate::utilities::errors::ExplainError;
use crate::validation::ValidationVerdict;

/// An explanation may only rest on a validated reading or on ground truth.
pub fn ensure_grounded(resolution: &Resolution) -> Result<(), ExplainError> {
    let Resolution {
        extraction,
        verdict,
        ..
    } = resolution;
    if !verdict.is_valid && !extraction.is_fallback() {
        return Err(ExplainError::Ungrounded {
            detail: format!(
                "verdict invalid (confidence {:.2}) for a {:?} extraction",
                verdict.confidence_score, extraction.provenance
            ),
        });
    }
    Ok(())
}

/// How good the played move was, as judged by the engine upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveClassification {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
    Book,
    Forced,
}

impl MoveClassification {
    /// Classify by centipawn loss against the best move. Negative losses
    /// count as zero.
    pub fn from_cp_loss(cp_loss: i32) -> Self {
        match cp_loss.max(0) {
            0..=10 => MoveClassification::Best,
            11..=25 => MoveClassification::Excellent,
            26..=50 => MoveClassification::Good,
            51..=100 => MoveClassification::Inaccuracy,
            101..=200 => MoveClassification::Mistake,
            _ => MoveClassification::Blunder,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoveClassification::Best => "best",
            MoveClassification::Excellent => "excellent",
            MoveClassification::Good => "good",
            MoveClassification::Inaccuracy => "inaccuracy",
            MoveClassification::Mistake => "mistake",
            MoveClassification::Blunder => "blunder",
            MoveClassification::Book => "book",
            MoveClassification::Forced => "forced",
        }
    }
}

impl fmt::Display for MoveClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One move to explain, with the engine's verdict on it.
///
/// `position` is the position in which `played_move` was made.
#[derive(Debug, Clone)]
pub struct ExplanationRequest {
    pub position: Position,
    pub played_move: String,
    pub best_move: Option<String>,
    pub classification: MoveClassification,
    /// Evaluation change caused by the move, in centipawns from the mover's view.
    pub evaluation_delta: Option<i32>,
    pub principal_variation: Vec<String>,
}

impl ExplanationRequest {
    pub fn new(
        position: Position,
        played_move: impl Into<String>,
        classification: MoveClassification,
    ) -> Self {
        Self {
            position,
            played_move: played_move.into(),
            best_move: None,
            classification,
            evaluation_delta: None,
            principal_variation: Vec::new(),
        }
    }

    pub fn with_best_move(mut self, best_move: impl Into<String>) -> Self {
        self.best_move = Some(best_move.into());
        self
    }

    pub fn with_evaluation_delta(mut self, delta: i32) -> Self {
        self.evaluation_delta = Some(delta);
        self
    }

    pub fn with_principal_variation<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principal_variation = moves.into_iter().map(Into::into).collect();
        self
    }
}

/// An explanation together with everything that grounded it.
///
/// Only [`ExplanationResult::new`] builds one, and it refuses an extraction
/// that was neither accepted by validation nor replaced by ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationResult {
    text: String,
    extraction: ExtractionResult,
    verdict: ValidationVerdict,
    themes: ThemeSet,
    patterns: PatternSet,
    stats: RetryStats,
}

impl ExplanationResult {
    pub fn new(
        text: impl Into<String>,
        resolution: Resolution,
        themes: ThemeSet,
        patterns: PatternSet,
    ) -> Result<Self, ExplainError> {
        ensure_grounded(&resolution)?;
        let Resolution {
            extraction,
            verdict,
            stats,
        } = resolution;
        Ok(Self {
            text: text.into(),
            extraction,
            verdict,
            themes,
            patterns,
            stats,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn extraction(&self) -> &ExtractionResult {
        &self.extraction
    }

    pub fn verdict(&self) -> &ValidationVerdict {
        &self.verdict
    }

    pub fn themes(&self) -> &ThemeSet {
        &self.themes
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn stats(&self) -> &RetryStats {
        &self.stats
    }

    /// Whether ground truth was substituted for the model's reading.
    pub fn is_fallback(&self) -> bool {
        self.extraction.is_fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, detect};
    use crate::extraction::Provenance;

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(MoveClassification::from_cp_loss(-30), MoveClassification::Best);
        assert_eq!(MoveClassification::from_cp_loss(10), MoveClassification::Best);
        assert_eq!(MoveClassification::from_cp_loss(11), MoveClassification::Excellent);
        assert_eq!(MoveClassification::from_cp_loss(50), MoveClassification::Good);
        assert_eq!(MoveClassification::from_cp_loss(100), MoveClassification::Inaccuracy);
        assert_eq!(MoveClassification::from_cp_loss(200), MoveClassification::Mistake);
        assert_eq!(MoveClassification::from_cp_loss(201), MoveClassification::Blunder);
    }

    #[test]
    fn test_classification_serde_names() {
        let json = serde_json::to_string(&MoveClassification::Inaccuracy).unwrap();
        assert_eq!(json, "\"inaccuracy\"");
        let parsed: MoveClassification = serde_json::from_str("\"book\"").unwrap();
        assert_eq!(parsed, MoveClassification::Book);
    }

    #[test]
    fn test_request_builders() {
        let request = ExplanationRequest::new(Position::starting(), "e4", MoveClassification::Book)
            .with_best_move("e4")
            .with_evaluation_delta(0)
            .with_principal_variation(["e4", "e5", "Nf3"]);
        assert_eq!(request.best_move.as_deref(), Some("e4"));
        assert_eq!(request.principal_variation.len(), 3);
    }

    fn resolution(extraction: ExtractionResult, verdict: ValidationVerdict) -> Resolution {
        Resolution {
            extraction,
            verdict,
            stats: RetryStats::default(),
        }
    }

    #[test]
    fn test_result_refuses_ungrounded_extraction() {
        let position = Position::starting();
        let extraction = ExtractionResult::from_position(&position, Provenance::ModelDerived);
        let err = ExplanationResult::new(
            "text",
            resolution(extraction, ValidationVerdict::malformed("bad")),
            analyze(&position),
            detect(&position),
        )
        .unwrap_err();
        assert!(matches!(err, ExplainError::Ungrounded { .. }));
    }

    #[test]
    fn test_ensure_grounded() {
        let position = Position::starting();
        let misread = resolution(
            ExtractionResult::from_position(&position, Provenance::ModelDerived),
            ValidationVerdict::malformed("bad"),
        );
        assert!(matches!(
            ensure_grounded(&misread),
            Err(ExplainError::Ungrounded { .. })
        ));

        let corrected = resolution(
            ExtractionResult::fallback_corrected(&position),
            ValidationVerdict::grounded(),
        );
        assert!(ensure_grounded(&corrected).is_ok());
    }

    #[test]
    fn test_result_accepts_valid_or_fallback() {
        let position = Position::starting();
        let valid = ExplanationResult::new(
            "text",
            resolution(
                ExtractionResult::from_position(&position, Provenance::ModelDerived),
                ValidationVerdict::grounded(),
            ),
            analyze(&position),
            detect(&position),
        )
        .unwrap();
        assert!(!valid.is_fallback());

        let fallback = ExplanationResult::new(
            "text",
            resolution(
                ExtractionResult::fallback_corrected(&position),
                ValidationVerdict::grounded(),
            ),
            analyze(&position),
            detect(&position),
        )
        .unwrap();
        assert!(fallback.is_fallback());
        assert_eq!(fallback.text(), "text");
    }

    #[test]
    fn test_result_serializes() {
        let position = Position::starting();
        let result = ExplanationResult::new(
            "A central pawn move.",
            resolution(
                ExtractionResult::fallback_corrected(&position),
                ValidationVerdict::grounded(),
            ),
            analyze(&position),
            detect(&position),
        )
        .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["text"], "A central pawn move.");
        assert_eq!(json["extraction"]["provenance"], "fallback_corrected");
        assert_eq!(json["verdict"]["is_valid"], true);
        assert_eq!(json["themes"]["mobility"]["white"], 20);
    }
}
