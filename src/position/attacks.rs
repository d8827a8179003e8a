//! Attack maps over a `chess::Board`.
//!
//! Everything here uses the board's real occupancy, so sliders stop at the
//! first piece they hit. Shared by theme analysis and the tactical detector.

use chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves, BitBoard,
    Board, Color, Piece, Square, EMPTY,
};

use super::piece::PieceKind;

/// Pieces of `color` that attack `square`.
pub fn attackers_of(board: &Board, square: Square, color: Color) -> BitBoard {
    let occupied = *board.combined();
    let own = *board.color_combined(color);
    let queens = *board.pieces(Piece::Queen);
    let diagonal = (*board.pieces(Piece::Bishop) | queens) & own;
    let straight = (*board.pieces(Piece::Rook) | queens) & own;

    let mut attackers = EMPTY;
    attackers |= get_knight_moves(square) & *board.pieces(Piece::Knight) & own;
    attackers |= get_king_moves(square) & *board.pieces(Piece::King) & own;
    attackers |= get_bishop_moves(square, occupied) & diagonal;
    attackers |= get_rook_moves(square, occupied) & straight;
    // A pawn of `color` attacks `square` from where an enemy pawn on `square` would capture.
    attackers |= get_pawn_attacks(square, !color, *board.pieces(Piece::Pawn) & own);
    attackers
}

/// Squares attacked by the piece standing on `square` (empty board if none).
pub fn attacks_from(board: &Board, square: Square) -> BitBoard {
    let (piece, color) = match (board.piece_on(square), board.color_on(square)) {
        (Some(piece), Some(color)) => (piece, color),
        _ => return EMPTY,
    };
    let occupied = *board.combined();
    match piece {
        Piece::Pawn => get_pawn_attacks(square, color, !EMPTY),
        Piece::Knight => get_knight_moves(square),
        Piece::Bishop => get_bishop_moves(square, occupied),
        Piece::Rook => get_rook_moves(square, occupied),
        Piece::Queen => get_bishop_moves(square, occupied) | get_rook_moves(square, occupied),
        Piece::King => get_king_moves(square),
    }
}

/// Every square attacked by at least one piece of `color`.
pub fn attacked_squares(board: &Board, color: Color) -> BitBoard {
    let mut attacked = EMPTY;
    for square in *board.color_combined(color) {
        attacked |= attacks_from(board, square);
    }
    attacked
}

/// The cheapest piece among `attackers`, by exchange value.
pub fn least_valuable(board: &Board, attackers: BitBoard) -> Option<PieceKind> {
    attackers
        .filter_map(|sq| board.piece_on(sq).map(PieceKind::from))
        .min_by_key(|kind| kind.exchange_value())
}

/// Pseudo-legal destination count for `color`: attacked squares not holding
/// an own piece plus pawn pushes. Used when the side cannot be given the move.
pub fn pseudo_mobility(board: &Board, color: Color) -> u32 {
    let own = *board.color_combined(color);
    let occupied = *board.combined();
    let mut count = 0;
    for square in own {
        match board.piece_on(square) {
            Some(Piece::Pawn) => {
                let captures = get_pawn_attacks(square, color, *board.color_combined(!color));
                count += captures.popcnt();
                if let Some(push) = pawn_push(square, color) {
                    if occupied & BitBoard::from_square(push) == EMPTY {
                        count += 1;
                    }
                }
            }
            Some(_) => count += (attacks_from(board, square) & !own).popcnt(),
            None => {}
        }
    }
    count
}

fn pawn_push(square: Square, color: Color) -> Option<Square> {
    match color {
        Color::White => square.up(),
        Color::Black => square.down(),
    }
}

/// Chebyshev (king-move) distance between two squares.
pub fn distance(a: Square, b: Square) -> u32 {
    let dr = (a.get_rank().to_index() as i32 - b.get_rank().to_index() as i32).unsigned_abs();
    let df = (a.get_file().to_index() as i32 - b.get_file().to_index() as i32).unsigned_abs();
    dr.max(df)
}
