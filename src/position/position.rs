//! The authoritative position and its ground-truth queries.

use std::fmt;
use std::str::FromStr;

use chess::{Board, ChessMove, MoveGen, Square, ALL_SQUARES};

use super::piece::{BoardPiece, PieceKind, Side};
use crate::utilities::errors::PositionError;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// An immutable, validated chess position.
///
/// The identity is the first four FEN fields (placement, side to move,
/// castling rights, en-passant square); move clocks are not part of it.
#[derive(Clone)]
pub struct Position {
    board: Board,
    identity: String,
}

impl Position {
    /// Parse a position from FEN.
    ///
    /// The placement field is checked before the board parser sees it: the
    /// parser cannot cope with a missing king or a short board.
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let invalid = |reason: String| PositionError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let placement = fen.split_whitespace().next().unwrap_or_default();
        check_placement(placement).map_err(invalid)?;
        let board = Board::from_str(fen.trim()).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::from_board(board))
    }

    /// Wrap an already-legal board.
    pub fn from_board(board: Board) -> Self {
        let full = board.to_string();
        let identity = full.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
        Self { board, identity }
    }

    /// The standard starting position.
    pub fn starting() -> Self {
        Self::from_board(Board::default())
    }

    /// The position after playing `mv`. The move is assumed legal.
    pub fn after(&self, mv: ChessMove) -> Self {
        Self::from_board(self.board.make_move_new(mv))
    }

    /// Canonical identity used as the cache key.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Full FEN, including move clocks.
    pub fn fen(&self) -> String {
        self.board.to_string()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Side {
        self.board.side_to_move().into()
    }

    pub fn is_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    /// What stands on `square`, if anything.
    pub fn occupant_of(&self, square: Square) -> Option<BoardPiece> {
        let kind = self.board.piece_on(square)?;
        let color = self.board.color_on(square)?;
        Some(BoardPiece::new(kind.into(), color.into()))
    }

    /// Every occupied square in a1, b1, ..., h8 order.
    pub fn placement(&self) -> Vec<(Square, BoardPiece)> {
        ALL_SQUARES
            .iter()
            .filter_map(|&sq| self.occupant_of(sq).map(|piece| (sq, piece)))
            .collect()
    }

    /// Number of occupied squares.
    pub fn occupied_count(&self) -> usize {
        self.board.combined().popcnt() as usize
    }

    /// The board with `side` to move: the position itself, or its null-move
    /// twin. `None` when `side` cannot be given the move because its opponent
    /// is in check.
    pub fn board_for(&self, side: Side) -> Option<Board> {
        if self.side_to_move() == side {
            Some(self.board)
        } else {
            self.board.null_move()
        }
    }

    /// Legal moves for `side`, as if it were that side's turn.
    ///
    /// Empty when `side` cannot be given the move (see [`Position::board_for`]).
    pub fn legal_moves(&self, side: Side) -> Vec<ChessMove> {
        match self.board_for(side) {
            Some(board) => MoveGen::new_legal(&board).collect(),
            None => Vec::new(),
        }
    }

    /// Count of pieces of `kind` belonging to `side`.
    pub fn count(&self, kind: PieceKind, side: Side) -> u32 {
        let piece = to_chess_piece(kind);
        let color: chess::Color = side.into();
        (*self.board.pieces(piece) & *self.board.color_combined(color)).popcnt()
    }

    /// Sum of material values for `side`, in centipawns.
    pub fn material(&self, side: Side) -> i32 {
        [
            PieceKind::Pawn,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
        ]
        .iter()
        .map(|&kind| kind.value() * self.count(kind, side) as i32)
        .sum()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Position").field(&self.fen()).finish()
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Position {}

/// Eight ranks of eight squares each, and exactly one king per side.
fn check_placement(placement: &str) -> Result<(), String> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(format!("expected 8 ranks, found {}", ranks.len()));
    }
    let (mut white_kings, mut black_kings) = (0, 0);
    for (i, rank) in ranks.iter().enumerate() {
        let mut files = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => files += c.to_digit(10).unwrap_or(0),
                'K' => {
                    white_kings += 1;
                    files += 1;
                }
                'k' => {
                    black_kings += 1;
                    files += 1;
                }
                'P' | 'N' | 'B' | 'R' | 'Q' | 'p' | 'n' | 'b' | 'r' | 'q' => files += 1,
                other => return Err(format!("unexpected '{}' in rank {}", other, 8 - i)),
            }
        }
        if files != 8 {
            return Err(format!("rank {} covers {} files", 8 - i, files));
        }
    }
    if white_kings != 1 || black_kings != 1 {
        return Err(format!(
            "expected one king per side, found {} white and {} black",
            white_kings, black_kings
        ));
    }
    Ok(())
}

/// Parse an algebraic square name such as "e4".
pub fn parse_square(name: &str) -> Result<Square, PositionError> {
    let trimmed = name.trim().to_ascii_lowercase();
    if trimmed.len() != 2 {
        return Err(PositionError::InvalidSquare(name.to_string()));
    }
    Square::from_str(&trimmed).map_err(|_| PositionError::InvalidSquare(name.to_string()))
}

pub(crate) fn to_chess_piece(kind: PieceKind) -> chess::Piece {
    match kind {
        PieceKind::Pawn => chess::Piece::Pawn,
        PieceKind::Knight => chess::Piece::Knight,
        PieceKind::Bishop => chess::Piece::Bishop,
        PieceKind::Rook => chess::Piece::Rook,
        PieceKind::Queen => chess::Piece::Queen,
        PieceKind::King => chess::Piece::King,
    }
}
