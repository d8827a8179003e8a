//! What a model claims to see on the board.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::position::{BoardPiece, PieceKind, Position, Side};

/// Where an [`ExtractionResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Parsed from a generative model response.
    ModelDerived,
    /// Substituted from the authoritative position after the retry budget ran out.
    FallbackCorrected,
}

/// Square → piece kind for one side, as asserted by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceClaim {
    pub side: Side,
    /// Keys are square names as claimed (lowercased, not yet validated).
    pub pieces: BTreeMap<String, PieceKind>,
}

impl PieceClaim {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            pieces: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, square: impl Into<String>, kind: PieceKind) {
        self.pieces.insert(square.into().trim().to_ascii_lowercase(), kind);
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

/// A structured claim about a position: both sides' pieces and who is to move.
///
/// A missing colour map marks the claim as malformed; the validator scores it
/// zero rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub white: Option<PieceClaim>,
    pub black: Option<PieceClaim>,
    pub side_to_move: Option<Side>,
    pub provenance: Provenance,
    /// Parser notes: unknown piece names, dropped entries, why parsing failed.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    /// A model-derived claim.
    pub fn model_derived(white: PieceClaim, black: PieceClaim, side_to_move: Option<Side>) -> Self {
        Self {
            white: Some(white),
            black: Some(black),
            side_to_move,
            provenance: Provenance::ModelDerived,
            warnings: Vec::new(),
        }
    }

    /// A model response that could not be parsed into claims.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            white: None,
            black: None,
            side_to_move: None,
            provenance: Provenance::ModelDerived,
            warnings: vec![reason.into()],
        }
    }

    /// An exact transcription of `position`.
    pub fn from_position(position: &Position, provenance: Provenance) -> Self {
        let mut white = PieceClaim::new(Side::White);
        let mut black = PieceClaim::new(Side::Black);
        for (square, piece) in position.placement() {
            let claim = match piece.side {
                Side::White => &mut white,
                Side::Black => &mut black,
            };
            claim.insert(square.to_string(), piece.kind);
        }
        Self {
            white: Some(white),
            black: Some(black),
            side_to_move: Some(position.side_to_move()),
            provenance,
            warnings: Vec::new(),
        }
    }

    /// Ground truth substituted after exhausted retries.
    pub fn fallback_corrected(position: &Position) -> Self {
        Self::from_position(position, Provenance::FallbackCorrected)
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::FallbackCorrected
    }

    /// Whether both colour maps are present.
    pub fn is_well_formed(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    /// All claimed pieces, white first, in square-name order within a side.
    pub fn claimed_pieces(&self) -> Vec<(String, BoardPiece)> {
        [&self.white, &self.black]
            .into_iter()
            .flatten()
            .flat_map(|claim| {
                claim
                    .pieces
                    .iter()
                    .map(move |(square, &kind)| (square.clone(), BoardPiece::new(kind, claim.side)))
            })
            .collect()
    }
}
