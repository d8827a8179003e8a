//! Piece and side vocabulary shared by claims, verdicts and analysis output.
//!
//! These mirror `chess::Piece` / `chess::Color` but are serde-friendly so they
//! can travel through the cache layer and the HTTP surface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Both sides, white first.
    pub const BOTH: [Side; 2] = [Side::White, Side::Black];

    /// The opposing side.
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Parse "white"/"black"/"w"/"b" in any case.
    pub fn parse(text: &str) -> Option<Side> {
        match text.trim().to_ascii_lowercase().as_str() {
            "white" | "w" => Some(Side::White),
            "black" | "b" => Some(Side::Black),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<chess::Color> for Side {
    fn from(color: chess::Color) -> Self {
        match color {
            chess::Color::White => Side::White,
            chess::Color::Black => Side::Black,
        }
    }
}

impl From<Side> for chess::Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => chess::Color::White,
            Side::Black => chess::Color::Black,
        }
    }
}

/// Kind of chess piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Material value in centipawns. The king has no material value.
    pub fn value(self) -> i32 {
        match self {
            PieceKind::Pawn => 100,
            PieceKind::Knight => 300,
            PieceKind::Bishop => 300,
            PieceKind::Rook => 500,
            PieceKind::Queen => 900,
            PieceKind::King => 0,
        }
    }

    /// Value used when comparing attackers and targets in tactics, where the
    /// king must rank above everything.
    pub fn exchange_value(self) -> i32 {
        match self {
            PieceKind::King => 10_000,
            other => other.value(),
        }
    }

    /// Parse a piece name ("knight") or letter ("N", "n").
    pub fn parse(text: &str) -> Option<PieceKind> {
        let lowered = text.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "p" | "pawn" => Some(PieceKind::Pawn),
            "n" | "knight" => Some(PieceKind::Knight),
            "b" | "bishop" => Some(PieceKind::Bishop),
            "r" | "rook" => Some(PieceKind::Rook),
            "q" | "queen" => Some(PieceKind::Queen),
            "k" | "king" => Some(PieceKind::King),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<chess::Piece> for PieceKind {
    fn from(piece: chess::Piece) -> Self {
        match piece {
            chess::Piece::Pawn => PieceKind::Pawn,
            chess::Piece::Knight => PieceKind::Knight,
            chess::Piece::Bishop => PieceKind::Bishop,
            chess::Piece::Rook => PieceKind::Rook,
            chess::Piece::Queen => PieceKind::Queen,
            chess::Piece::King => PieceKind::King,
        }
    }
}

/// A piece of a given side, as it stands (or is claimed to stand) on a square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoardPiece {
    pub kind: PieceKind,
    pub side: Side,
}

impl BoardPiece {
    pub fn new(kind: PieceKind, side: Side) -> Self {
        Self { kind, side }
    }

    pub fn is_king(&self) -> bool {
        self.kind == PieceKind::King
    }
}

impl fmt::Display for BoardPiece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.side, self.kind)
    }
}
