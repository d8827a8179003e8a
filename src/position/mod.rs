//! Ground-truth position model.
//!
//! A thin adapter over the `chess` crate: it answers "what stands on this
//! square" and "which moves are legal for this side", which is everything the
//! validator and the deterministic analysers need from the rules of chess.

pub mod attacks;
pub mod piece;
#[allow(clippy::module_inception)]
pub mod position;

pub use piece::{BoardPiece, PieceKind, Side};
pub use position::{parse_square, Position, STARTING_FEN};
