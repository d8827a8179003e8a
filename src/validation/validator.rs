//! Deterministic comparison of an extraction against the authoritative position.

use std::collections::{BTreeMap, BTreeSet};

use chess::Square;

use super::verdict::{Discrepancy, DiscrepancyKind, ValidationVerdict};
use crate::extraction::ExtractionResult;
use crate::position::{parse_square, BoardPiece, Position};

/// Default minimum confidence for a claim to be accepted.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.9;

/// Compares extraction claims with ground truth.
///
/// Pure: the same extraction and position always produce the same verdict.
#[derive(Debug, Clone, Copy)]
pub struct PositionValidator {
    acceptance_threshold: f64,
}

impl Default for PositionValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTANCE_THRESHOLD)
    }
}

impl PositionValidator {
    /// Create a validator. The threshold is clamped into [0, 1].
    pub fn new(acceptance_threshold: f64) -> Self {
        Self {
            acceptance_threshold: acceptance_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn acceptance_threshold(&self) -> f64 {
        self.acceptance_threshold
    }

    /// Validate `extraction` against `truth`.
    ///
    /// `confidence_score` is matching squares over occupied truth squares.
    /// The claim is valid when the score reaches the threshold and no
    /// discrepancy involves a king; a misplaced king is always disqualifying.
    pub fn validate(&self, extraction: &ExtractionResult, truth: &Position) -> ValidationVerdict {
        if !extraction.is_well_formed() {
            let missing: Vec<&str> = [("white", &extraction.white), ("black", &extraction.black)]
                .iter()
                .filter(|(_, claim)| claim.is_none())
                .map(|(name, _)| *name)
                .collect();
            let mut detail = format!("missing {} piece map", missing.join(" and "));
            if let Some(reason) = extraction.warnings.first() {
                detail.push_str(": ");
                detail.push_str(reason);
            }
            log::debug!("Extraction malformed: {}", detail);
            return ValidationVerdict::malformed(detail);
        }

        let mut discrepancies: Vec<Discrepancy> = Vec::new();
        let mut claims: BTreeMap<usize, (Square, BoardPiece)> = BTreeMap::new();
        let mut conflicted: BTreeSet<usize> = BTreeSet::new();

        for (name, piece) in extraction.claimed_pieces() {
            match parse_square(&name) {
                Ok(square) => {
                    let idx = square.to_index();
                    match claims.get(&idx) {
                        Some((_, existing)) if *existing != piece => {
                            conflicted.insert(idx);
                        }
                        Some(_) => {}
                        None => {
                            claims.insert(idx, (square, piece));
                        }
                    }
                }
                Err(_) => discrepancies.push(Discrepancy::new(
                    name,
                    None,
                    Some(piece),
                    DiscrepancyKind::InvalidSquare,
                )),
            }
        }

        let placement = truth.placement();
        let total = placement.len();
        let mut matches = 0usize;

        for (square, expected) in &placement {
            let idx = square.to_index();
            let claimed = claims.get(&idx).map(|(_, piece)| *piece);
            if conflicted.contains(&idx) {
                discrepancies.push(Discrepancy::new(
                    square.to_string(),
                    Some(*expected),
                    claimed,
                    DiscrepancyKind::ConflictingClaim,
                ));
                continue;
            }
            match claimed {
                Some(piece) if piece == *expected => matches += 1,
                Some(piece) => discrepancies.push(Discrepancy::new(
                    square.to_string(),
                    Some(*expected),
                    Some(piece),
                    DiscrepancyKind::WrongPiece,
                )),
                None => discrepancies.push(Discrepancy::new(
                    square.to_string(),
                    Some(*expected),
                    None,
                    DiscrepancyKind::MissingPiece,
                )),
            }
        }

        for (idx, (square, piece)) in &claims {
            if truth.occupant_of(*square).is_some() {
                continue;
            }
            let kind = if conflicted.contains(idx) {
                DiscrepancyKind::ConflictingClaim
            } else {
                DiscrepancyKind::PhantomPiece
            };
            discrepancies.push(Discrepancy::new(square.to_string(), None, Some(*piece), kind));
        }

        discrepancies.sort_by_key(|d| {
            parse_square(&d.square)
                .map(|sq| sq.to_index())
                .unwrap_or(usize::MAX)
        });

        let confidence_score = if total == 0 {
            0.0
        } else {
            matches as f64 / total as f64
        };
        let king_problem = discrepancies.iter().any(Discrepancy::involves_king);
        let is_valid = confidence_score >= self.acceptance_threshold && !king_problem;

        log::debug!(
            "Validated extraction: matches={}/{}, discrepancies={}, king_problem={}, valid={}",
            matches,
            total,
            discrepancies.len(),
            king_problem,
            is_valid
        );

        ValidationVerdict {
            is_valid,
            confidence_score,
            discrepancies,
            side_to_move_matches: extraction
                .side_to_move
                .map(|side| side == truth.side_to_move()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{PieceClaim, Provenance};
    use crate::position::{PieceKind, Side, STARTING_FEN};

    fn correct_claim(pos: &Position) -> ExtractionResult {
        ExtractionResult::from_position(pos, Provenance::ModelDerived)
    }

    fn move_piece(extraction: &mut ExtractionResult, side: Side, from: &str, to: &str) {
        let claim = match side {
            Side::White => extraction.white.as_mut().unwrap(),
            Side::Black => extraction.black.as_mut().unwrap(),
        };
        let kind = claim.pieces.remove(from).unwrap();
        claim.insert(to, kind);
    }

    #[test]
    fn test_full_correct_claim_on_starting_position() {
        let pos = Position::from_fen(STARTING_FEN).unwrap();
        let verdict = PositionValidator::default().validate(&correct_claim(&pos), &pos);
        assert!(verdict.is_valid);
        assert_eq!(verdict.confidence_score, 1.0);
        assert!(verdict.discrepancies.is_empty());
        assert_eq!(verdict.side_to_move_matches, Some(true));
    }

    #[test]
    fn test_misplaced_white_king_is_invalid_despite_high_score() {
        let pos = Position::starting();
        let mut extraction = correct_claim(&pos);
        move_piece(&mut extraction, Side::White, "e1", "e3");

        let verdict = PositionValidator::default().validate(&extraction, &pos);
        assert!(verdict.confidence_score >= 0.9);
        assert!(!verdict.is_valid);
        assert!(verdict.has_king_discrepancy());
        // Missing king on e1 (index 4) is ordered before the phantom on e3.
        assert_eq!(verdict.discrepancies.len(), 2);
        assert_eq!(verdict.discrepancies[0].square, "e1");
        assert_eq!(verdict.discrepancies[0].kind, DiscrepancyKind::MissingPiece);
        assert_eq!(verdict.discrepancies[1].square, "e3");
        assert_eq!(verdict.discrepancies[1].kind, DiscrepancyKind::PhantomPiece);
    }

    #[test]
    fn test_threshold_boundary() {
        let pos = Position::starting();
        // Drop three pawns: 29/32 = 0.906 passes, four pawns: 28/32 = 0.875 fails.
        let mut extraction = correct_claim(&pos);
        for sq in ["a2", "b2", "c2"] {
            extraction.white.as_mut().unwrap().pieces.remove(sq);
        }
        assert!(PositionValidator::default().validate(&extraction, &pos).is_valid);

        extraction.white.as_mut().unwrap().pieces.remove("d2");
        let verdict = PositionValidator::default().validate(&extraction, &pos);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.confidence_score, 28.0 / 32.0);
        assert_eq!(verdict.discrepancies.len(), 4);
    }

    #[test]
    fn test_confidence_is_monotonic_in_matching_squares() {
        let pos = Position::starting();
        let validator = PositionValidator::default();
        let truth = correct_claim(&pos);
        let mut partial = ExtractionResult::model_derived(
            PieceClaim::new(Side::White),
            PieceClaim::new(Side::Black),
            Some(Side::White),
        );

        let mut previous = validator.validate(&partial, &pos).confidence_score;
        assert_eq!(previous, 0.0);
        for (square, piece) in truth.claimed_pieces() {
            let claim = match piece.side {
                Side::White => partial.white.as_mut().unwrap(),
                Side::Black => partial.black.as_mut().unwrap(),
            };
            claim.insert(square, piece.kind);
            let score = validator.validate(&partial, &pos).confidence_score;
            assert!(score > previous);
            previous = score;
        }
        assert_eq!(previous, 1.0);

        // A wrong extra square never raises the score.
        partial.white.as_mut().unwrap().insert("e4", PieceKind::Queen);
        assert!(validator.validate(&partial, &pos).confidence_score <= previous);
    }

    #[test]
    fn test_malformed_extraction_scores_zero() {
        let pos = Position::starting();
        let mut extraction = correct_claim(&pos);
        extraction.black = None;
        let verdict = PositionValidator::default().validate(&extraction, &pos);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.confidence_score, 0.0);
        assert_eq!(verdict.discrepancies.len(), 1);
        assert_eq!(verdict.discrepancies[0].kind, DiscrepancyKind::Malformed);
        assert!(verdict.discrepancies[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("black"));

        let verdict = PositionValidator::default()
            .validate(&ExtractionResult::malformed("no JSON found"), &pos);
        assert!(verdict.discrepancies[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("no JSON found"));
    }

    #[test]
    fn test_wrong_kind_conflict_and_invalid_square() {
        let pos = Position::starting();
        let mut extraction = correct_claim(&pos);
        extraction.white.as_mut().unwrap().insert("g1", PieceKind::Bishop);
        extraction.black.as_mut().unwrap().insert("a1", PieceKind::Rook);
        extraction.black.as_mut().unwrap().insert("z9", PieceKind::Pawn);

        let verdict = PositionValidator::default().validate(&extraction, &pos);
        let kinds: Vec<(String, DiscrepancyKind)> = verdict
            .discrepancies
            .iter()
            .map(|d| (d.square.clone(), d.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a1".to_string(), DiscrepancyKind::ConflictingClaim),
                ("g1".to_string(), DiscrepancyKind::WrongPiece),
                ("z9".to_string(), DiscrepancyKind::InvalidSquare),
            ]
        );
        assert_eq!(verdict.confidence_score, 30.0 / 32.0);
        assert!(verdict.is_valid);
    }

    #[test]
    fn test_side_to_move_mismatch_is_reported_not_disqualifying() {
        let pos = Position::starting();
        let mut extraction = correct_claim(&pos);
        extraction.side_to_move = Some(Side::Black);
        let verdict = PositionValidator::default().validate(&extraction, &pos);
        assert!(verdict.is_valid);
        assert_eq!(verdict.side_to_move_matches, Some(false));
    }

    #[test]
    fn test_custom_threshold() {
        let pos = Position::starting();
        let mut extraction = correct_claim(&pos);
        extraction.white.as_mut().unwrap().pieces.remove("a2");
        assert!(!PositionValidator::new(1.0).validate(&extraction, &pos).is_valid);
        assert!(PositionValidator::new(0.5).validate(&extraction, &pos).is_valid);
        assert_eq!(PositionValidator::new(1.7).acceptance_threshold(), 1.0);
    }
}
