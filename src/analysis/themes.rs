//! Positional themes: material, mobility, space and king safety.
//!
//! Every metric is a pure function of the position.

use chess::{get_file, get_king_moves, get_rank, BitBoard, Board, Color, File, MoveGen, Piece, Rank, Square, EMPTY};
use serde::{Deserialize, Serialize};

use crate::position::attacks::{attacked_squares, attacks_from, distance, pseudo_mobility};
use crate::position::{Position, Side};

/// A value per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub white: T,
    pub black: T,
}

impl<T: Copy> SidePair<T> {
    pub fn get(&self, side: Side) -> T {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            white: f(Side::White),
            black: f(Side::Black),
        }
    }
}

/// Positional metrics for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSet {
    /// White material minus black material, in centipawns.
    pub material: i32,
    /// Legal move count per side.
    pub mobility: SidePair<u32>,
    /// Squares in the opponent's half attacked or occupied, per side.
    pub space: SidePair<u32>,
    /// Higher is safer.
    pub king_safety: SidePair<i32>,
}

const SHIELD_PAWN_BONUS: i32 = 10;
const OPEN_FILE_PENALTY: i32 = 15;

/// Compute the [`ThemeSet`] of `position`.
pub fn analyze(position: &Position) -> ThemeSet {
    let board = position.board();
    ThemeSet {
        material: position.material(Side::White) - position.material(Side::Black),
        mobility: SidePair::from_fn(|side| mobility(position, side)),
        space: SidePair::from_fn(|side| space(board, side.into())),
        king_safety: SidePair::from_fn(|side| king_safety(board, side.into())),
    }
}

/// Legal moves for `side` as if it were to move; pseudo-legal destinations
/// when the side cannot be given the move.
fn mobility(position: &Position, side: Side) -> u32 {
    match position.board_for(side) {
        Some(board) => MoveGen::new_legal(&board).len() as u32,
        None => pseudo_mobility(position.board(), side.into()),
    }
}

fn opponent_half(color: Color) -> BitBoard {
    let ranks = match color {
        Color::White => 4..8,
        Color::Black => 0..4,
    };
    ranks.fold(EMPTY, |acc, r| acc | get_rank(Rank::from_index(r)))
}

fn space(board: &Board, color: Color) -> u32 {
    let controlled = attacked_squares(board, color) | *board.color_combined(color);
    (controlled & opponent_half(color)).popcnt()
}

fn attacker_weight(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 1,
        Piece::Knight | Piece::Bishop => 2,
        Piece::Rook => 3,
        Piece::Queen => 5,
        Piece::King => 0,
    }
}

/// Shield pawns, open files near the king, and enemy pieces bearing on the
/// king zone (heavier and closer attackers cost more).
fn king_safety(board: &Board, color: Color) -> i32 {
    let king = board.king_square(color);
    let own_pawns = *board.pieces(Piece::Pawn) & *board.color_combined(color);
    let king_file = king.get_file().to_index() as i32;
    let king_rank = king.get_rank().to_index() as i32;
    let forward = if color == Color::White { 1 } else { -1 };

    let mut score = 0;

    for df in -1..=1 {
        let file = king_file + df;
        if !(0..8).contains(&file) {
            continue;
        }
        for step in 1..=2 {
            let rank = king_rank + forward * step;
            if !(0..8).contains(&rank) {
                continue;
            }
            let sq = Square::make_square(Rank::from_index(rank as usize), File::from_index(file as usize));
            if own_pawns & BitBoard::from_square(sq) != EMPTY {
                score += SHIELD_PAWN_BONUS;
            }
        }
        if own_pawns & get_file(File::from_index(file as usize)) == EMPTY {
            score -= OPEN_FILE_PENALTY;
        }
    }

    let zone = get_king_moves(king) | BitBoard::from_square(king);
    for sq in *board.color_combined(!color) {
        let piece = match board.piece_on(sq) {
            Some(piece) => piece,
            None => continue,
        };
        let weight = attacker_weight(piece);
        if weight == 0 || attacks_from(board, sq) & zone == EMPTY {
            continue;
        }
        score -= weight * (8 - distance(sq, king) as i32);
    }

    score
}
