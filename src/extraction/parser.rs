//! Parsing model output into an [`ExtractionResult`].
//!
//! Accepted shapes for each colour:
//!
//! ```text
//! "white": {"e1": "king", "d1": "Q", ...}
//! "white": [{"square": "e1", "piece": "king"}, ...]
//! ```
//!
//! Anything that does not fit is either a warning (one bad entry) or a
//! malformed result (no usable colour map). Parsing never fails.

use serde_json::Value;

use super::claim::{ExtractionResult, PieceClaim, Provenance};
use crate::position::{PieceKind, Side};

/// Parse a structured model response.
pub fn parse_extraction(value: &Value) -> ExtractionResult {
    let root = match value.as_object() {
        Some(root) => root,
        None => return ExtractionResult::malformed("response is not a JSON object"),
    };

    let mut warnings = Vec::new();
    let white = root
        .get("white")
        .and_then(|v| parse_side(Side::White, v, &mut warnings));
    let black = root
        .get("black")
        .and_then(|v| parse_side(Side::Black, v, &mut warnings));
    let side_to_move = root
        .get("side_to_move")
        .and_then(|v| v.as_str())
        .and_then(Side::parse);

    if white.is_none() || black.is_none() {
        warnings.insert(0, "response lacks a usable white or black piece map".to_string());
    }

    ExtractionResult {
        white,
        black,
        side_to_move,
        provenance: Provenance::ModelDerived,
        warnings,
    }
}

fn parse_side(side: Side, value: &Value, warnings: &mut Vec<String>) -> Option<PieceClaim> {
    let mut claim = PieceClaim::new(side);
    match value {
        Value::Object(entries) => {
            for (square, piece) in entries {
                add_entry(&mut claim, square, piece.as_str(), warnings);
            }
        }
        Value::Array(items) => {
            for item in items {
                let square = item.get("square").and_then(|v| v.as_str());
                let piece = item.get("piece").and_then(|v| v.as_str());
                match square {
                    Some(square) => add_entry(&mut claim, square, piece, warnings),
                    None => warnings.push(format!("{} entry without a square: {}", side, item)),
                }
            }
        }
        other => {
            warnings.push(format!("{} pieces are not a map or list: {}", side, other));
            return None;
        }
    }
    Some(claim)
}

fn add_entry(claim: &mut PieceClaim, square: &str, piece: Option<&str>, warnings: &mut Vec<String>) {
    match piece.and_then(PieceKind::parse) {
        Some(kind) => claim.insert(square, kind),
        None => warnings.push(format!(
            "unrecognized {} piece on {}: {}",
            claim.side,
            square,
            piece.unwrap_or("<not a string>")
        )),
    }
}
