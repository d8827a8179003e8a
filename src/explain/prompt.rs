//! Prompt composition for the final explanation call.
//!
//! The prompt is built only from grounded data: the authoritative placement,
//! the computed themes and motifs, and the move metadata supplied by the
//! caller.

use std::fmt::Write;

use crate::analysis::{PatternSet, ThemeSet};
use crate::position::{Position, Side};
use crate::retry::Resolution;

use super::request::ExplanationRequest;

pub const EXPLANATION_SYSTEM_PROMPT: &str = "You are a chess coach explaining a single move. \
Base every statement on the verified position and analysis you are given. \
Do not mention pieces or squares that are not listed.";

/// Compose the explanation prompt.
pub fn explanation_prompt(
    request: &ExplanationRequest,
    resolution: &Resolution,
    themes: &ThemeSet,
    patterns: &PatternSet,
) -> String {
    let position = &request.position;
    let mut prompt = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(prompt, "Position (FEN): {}", position.fen());
    let _ = writeln!(prompt, "Side to move: {}", position.side_to_move());
    prompt.push('\n');

    push_placement(&mut prompt, position);
    push_corrections(&mut prompt, resolution);
    push_move(&mut prompt, request);
    push_themes(&mut prompt, themes);
    push_patterns(&mut prompt, patterns);

    prompt.push_str(
        "\nExplain in a few sentences why the played move is classified this way, \
         using only the facts above.",
    );
    prompt
}

fn push_placement(prompt: &mut String, position: &Position) {
    prompt.push_str("Verified piece placement:\n");
    for side in Side::BOTH {
        let pieces: Vec<String> = position
            .placement()
            .into_iter()
            .filter(|(_, piece)| piece.side == side)
            .map(|(square, piece)| format!("{} {}", piece.kind, square))
            .collect();
        let _ = writeln!(prompt, "- {}: {}", side, pieces.join(", "));
    }
}

/// Residual disagreements between the model's reading and the board. Empty
/// for a perfect reading; for a fallback the board itself was substituted.
fn push_corrections(prompt: &mut String, resolution: &Resolution) {
    if resolution.verdict.discrepancies.is_empty() {
        return;
    }
    prompt.push_str("\nCorrections to an earlier reading (the placement above is authoritative):\n");
    for discrepancy in &resolution.verdict.discrepancies {
        let _ = writeln!(prompt, "- {}", discrepancy);
    }
}

fn push_move(prompt: &mut String, request: &ExplanationRequest) {
    prompt.push('\n');
    let _ = writeln!(
        prompt,
        "Played move: {} ({})",
        request.played_move, request.classification
    );
    if let Some(best) = &request.best_move {
        let _ = writeln!(prompt, "Engine best move: {}", best);
    }
    if let Some(delta) = request.evaluation_delta {
        let _ = writeln!(prompt, "Evaluation change: {:+} centipawns", delta);
    }
    if !request.principal_variation.is_empty() {
        let _ = writeln!(
            prompt,
            "Principal variation: {}",
            request.principal_variation.join(" ")
        );
    }
}

fn push_themes(prompt: &mut String, themes: &ThemeSet) {
    prompt.push_str("\nPositional themes:\n");
    let _ = writeln!(
        prompt,
        "- material balance: {:+} centipawns (positive favours white)",
        themes.material
    );
    let _ = writeln!(
        prompt,
        "- mobility: white {}, black {}",
        themes.mobility.white, themes.mobility.black
    );
    let _ = writeln!(
        prompt,
        "- space: white {}, black {}",
        themes.space.white, themes.space.black
    );
    let _ = writeln!(
        prompt,
        "- king safety: white {}, black {}",
        themes.king_safety.white, themes.king_safety.black
    );
}

fn push_patterns(prompt: &mut String, patterns: &PatternSet) {
    prompt.push_str("\nTactical motifs:\n");
    if patterns.is_empty() {
        prompt.push_str("- none\n");
        return;
    }
    for motif in patterns.iter() {
        let _ = writeln!(prompt, "- {}", motif);
    }
}
