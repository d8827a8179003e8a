//! Validation verdicts and the discrepancies they carry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::BoardPiece;

/// Why a square disagrees with the truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Truth has a piece the claim omits.
    MissingPiece,
    /// Claim and truth disagree on kind or colour.
    WrongPiece,
    /// Claim puts a piece on an empty square.
    PhantomPiece,
    /// Both colour maps claim the same square.
    ConflictingClaim,
    /// The claimed square name is not a board square.
    InvalidSquare,
    /// The claim as a whole is unusable.
    Malformed,
}

/// One disagreement between a claim and the truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Square name; empty for whole-claim malformations.
    pub square: String,
    pub expected: Option<BoardPiece>,
    pub claimed: Option<BoardPiece>,
    pub kind: DiscrepancyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Discrepancy {
    pub fn new(
        square: impl Into<String>,
        expected: Option<BoardPiece>,
        claimed: Option<BoardPiece>,
        kind: DiscrepancyKind,
    ) -> Self {
        Self {
            square: square.into(),
            expected,
            claimed,
            kind,
            detail: None,
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            square: String::new(),
            expected: None,
            claimed: None,
            kind: DiscrepancyKind::Malformed,
            detail: Some(detail.into()),
        }
    }

    /// Whether a king sits on either side of this disagreement.
    pub fn involves_king(&self) -> bool {
        self.expected.is_some_and(|p| p.is_king()) || self.claimed.is_some_and(|p| p.is_king())
    }

    /// Instruction fed back to the model on the next attempt.
    pub fn correction_hint(&self) -> String {
        match (self.kind, self.expected, self.claimed) {
            (DiscrepancyKind::MissingPiece, Some(expected), _) => format!(
                "You previously left {} empty, but a piece stands there; re-examine that square (it is a {}).",
                self.square, expected
            ),
            (DiscrepancyKind::WrongPiece, Some(expected), Some(claimed)) => format!(
                "You previously placed a {} on {}, but that square holds a {}; re-examine it.",
                claimed, self.square, expected
            ),
            (DiscrepancyKind::PhantomPiece, _, Some(claimed)) => format!(
                "You previously placed a {} on {}, but that square is empty; re-examine it.",
                claimed, self.square
            ),
            (DiscrepancyKind::ConflictingClaim, _, _) => format!(
                "You previously listed {} for both White and Black; each square holds at most one piece.",
                self.square
            ),
            (DiscrepancyKind::InvalidSquare, _, _) => format!(
                "You previously used '{}', which is not a board square; use names a1 through h8.",
                self.square
            ),
            _ => format!(
                "Your previous answer could not be used ({}); answer with the exact JSON format requested.",
                self.detail.as_deref().unwrap_or("malformed response")
            ),
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |p: Option<BoardPiece>| p.map_or_else(|| "empty".to_string(), |p| p.to_string());
        write!(
            f,
            "{:?} at '{}': expected {}, claimed {}",
            self.kind,
            self.square,
            show(self.expected),
            show(self.claimed)
        )
    }
}

/// The outcome of validating one extraction. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    /// Matching squares over occupied truth squares, in [0, 1].
    pub confidence_score: f64,
    /// Ordered by square (a1, b1, ..., h8); unparseable squares and
    /// malformations come last.
    pub discrepancies: Vec<Discrepancy>,
    /// Whether the claimed side to move agrees with the truth, when one was claimed.
    pub side_to_move_matches: Option<bool>,
}

impl ValidationVerdict {
    /// The verdict paired with ground truth substituted by the pipeline.
    pub fn grounded() -> Self {
        Self {
            is_valid: true,
            confidence_score: 1.0,
            discrepancies: Vec::new(),
            side_to_move_matches: Some(true),
        }
    }

    /// Zero-confidence verdict for an unusable claim.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            confidence_score: 0.0,
            discrepancies: vec![Discrepancy::malformed(detail)],
            side_to_move_matches: None,
        }
    }

    /// Whether any discrepancy involves a king.
    pub fn has_king_discrepancy(&self) -> bool {
        self.discrepancies.iter().any(Discrepancy::involves_king)
    }
}
