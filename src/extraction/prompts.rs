//! Prompt text for the extraction call.

use serde_json::{json, Value};

use crate::position::Position;
use crate::validation::Discrepancy;

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a meticulous chess position reader. \
You read a position and report exactly which piece stands on which square. \
You never guess: every square you list must follow from the position you were given.";

/// JSON schema for the extraction response.
pub fn extraction_schema() -> Value {
    let piece = json!({
        "type": "string",
        "enum": ["pawn", "knight", "bishop", "rook", "queen", "king"]
    });
    json!({
        "type": "object",
        "properties": {
            "white": {
                "type": "object",
                "description": "Square name (a1-h8) to piece kind for every white piece",
                "additionalProperties": piece.clone()
            },
            "black": {
                "type": "object",
                "description": "Square name (a1-h8) to piece kind for every black piece",
                "additionalProperties": piece
            },
            "side_to_move": {
                "type": "string",
                "enum": ["white", "black"]
            }
        },
        "required": ["white", "black", "side_to_move"]
    })
}

/// Build the user prompt, with a correction block when `feedback` is non-empty.
pub fn extraction_prompt(position: &Position, feedback: &[Discrepancy]) -> String {
    let mut prompt = format!(
        "Position (FEN): {}\n\n\
         Describe this position square by square. For each side, list every piece \
         and the square it stands on, and state which side is to move.",
        position.fen()
    );

    if !feedback.is_empty() {
        prompt.push_str("\n\nYour previous answer for this position contained errors:\n");
        for discrepancy in feedback {
            prompt.push_str("- ");
            prompt.push_str(&discrepancy.correction_hint());
            prompt.push('\n');
        }
        prompt.push_str("Re-examine the position and answer again in full.");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{BoardPiece, PieceKind, Side};
    use crate::validation::DiscrepancyKind;

    #[test]
    fn test_prompt_without_feedback() {
        let prompt = extraction_prompt(&Position::starting(), &[]);
        assert!(prompt.contains("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"));
        assert!(!prompt.contains("previous answer"));
    }

    #[test]
    fn test_prompt_enumerates_feedback() {
        let feedback = vec![Discrepancy::new(
            "e1",
            Some(BoardPiece::new(PieceKind::King, Side::White)),
            None,
            DiscrepancyKind::MissingPiece,
        )];
        let prompt = extraction_prompt(&Position::starting(), &feedback);
        assert!(prompt.contains("previous answer"));
        assert!(prompt.contains("left e1 empty"));
    }

    #[test]
    fn test_schema_requires_both_colors() {
        let schema = extraction_schema();
        assert_eq!(schema["required"], json!(["white", "black", "side_to_move"]));
    }
}
