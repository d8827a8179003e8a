//! Tactical motif detection.
//!
//! Each motif has its own rule. Line motifs (pins, skewers) read the ray
//! geometry; forks, hanging pieces and discovered attacks only count captures
//! the attacking side could legally make. Rules are independent, so one
//! square can take part in several motifs at once. Every motif records the
//! side it benefits.

use std::collections::BTreeSet;
use std::fmt;

use chess::{BitBoard, Board, ChessMove, Color, File, MoveGen, Piece, Rank, Square, EMPTY};
use serde::{Deserialize, Serialize};

use crate::position::attacks::{attackers_of, attacks_from, least_valuable};
use crate::position::{BoardPiece, PieceKind, Position, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifKind {
    Check,
    Pin,
    Skewer,
    Fork,
    HangingPiece,
    DiscoveredAttack,
}

impl MotifKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MotifKind::Check => "check",
            MotifKind::Pin => "pin",
            MotifKind::Skewer => "skewer",
            MotifKind::Fork => "fork",
            MotifKind::HangingPiece => "hanging piece",
            MotifKind::DiscoveredAttack => "discovered attack",
        }
    }
}

impl fmt::Display for MotifKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected motif.
///
/// `squares` and `pieces` are parallel: the piece standing on each square.
/// The first square is the motif's principal piece (the pinner, the forking
/// piece, the hanging piece, the checked king).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TacticalMotif {
    pub kind: MotifKind,
    /// The side the motif favours.
    pub side: Side,
    pub squares: Vec<String>,
    pub pieces: Vec<BoardPiece>,
}

impl fmt::Display for TacticalMotif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}:", self.kind, self.side)?;
        for (square, piece) in self.squares.iter().zip(&self.pieces) {
            write!(f, " {} {}", piece, square)?;
        }
        Ok(())
    }
}

/// An unordered collection of motifs. Iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    motifs: BTreeSet<TacticalMotif>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, motif: TacticalMotif) -> bool {
        self.motifs.insert(motif)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TacticalMotif> {
        self.motifs.iter()
    }

    pub fn len(&self) -> usize {
        self.motifs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motifs.is_empty()
    }

    pub fn of_kind(&self, kind: MotifKind) -> impl Iterator<Item = &TacticalMotif> {
        self.motifs.iter().filter(move |m| m.kind == kind)
    }

    pub fn contains_kind(&self, kind: MotifKind) -> bool {
        self.of_kind(kind).next().is_some()
    }
}

/// Detect every motif present in `position`.
pub fn detect(position: &Position) -> PatternSet {
    let mut set = PatternSet::new();
    detect_check(position, &mut set);
    for side in Side::BOTH {
        detect_pins_and_skewers(position, side, &mut set);
        detect_forks(position, side, &mut set);
        detect_hanging(position, side, &mut set);
        detect_discovered_attacks(position, side, &mut set);
    }
    set
}

// ----------------------------------------------------------------------------
// Geometry
// ----------------------------------------------------------------------------

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
];

fn directions(piece: Piece) -> &'static [(i8, i8)] {
    match piece {
        Piece::Bishop => &DIAGONALS,
        Piece::Rook => &ORTHOGONALS,
        Piece::Queen => &ALL_DIRECTIONS,
        _ => &[],
    }
}

fn offset(square: Square, (df, dr): (i8, i8)) -> Option<Square> {
    let file = square.get_file().to_index() as i8 + df;
    let rank = square.get_rank().to_index() as i8 + dr;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(Square::make_square(
            Rank::from_index(rank as usize),
            File::from_index(file as usize),
        ))
    } else {
        None
    }
}

/// The first two occupied squares along a ray, with every square walked up
/// to and including the second.
struct RayScan {
    first: Square,
    second: Square,
    walked: Vec<Square>,
}

fn scan(board: &Board, from: Square, direction: (i8, i8)) -> Option<RayScan> {
    let occupied = *board.combined();
    let mut hits = Vec::with_capacity(2);
    let mut walked = Vec::new();
    let mut current = from;
    while let Some(next) = offset(current, direction) {
        walked.push(next);
        if occupied & BitBoard::from_square(next) != EMPTY {
            hits.push(next);
            if hits.len() == 2 {
                return Some(RayScan {
                    first: hits[0],
                    second: hits[1],
                    walked,
                });
            }
        }
        current = next;
    }
    None
}

fn sliders(board: &Board, color: Color) -> impl Iterator<Item = (Square, Piece)> + '_ {
    let own = *board.color_combined(color);
    let sliding = *board.pieces(Piece::Bishop) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    (own & sliding).filter_map(move |sq| board.piece_on(sq).map(|piece| (sq, piece)))
}

fn exchange_value(board: &Board, square: Square) -> i32 {
    board
        .piece_on(square)
        .map(|piece| PieceKind::from(piece).exchange_value())
        .unwrap_or(0)
}

/// Where a side's pieces can actually go.
///
/// Legal moves when the side can be given the move. When it cannot (its
/// opponent is already in check), raw attack maps stand in.
enum Reach {
    Legal(Vec<ChessMove>),
    Attacks,
}

impl Reach {
    fn of(position: &Position, side: Side) -> Self {
        match position.board_for(side) {
            Some(board) => Reach::Legal(MoveGen::new_legal(&board).collect()),
            None => Reach::Attacks,
        }
    }

    /// Squares the piece on `from` can move or capture to.
    fn targets_from(&self, board: &Board, from: Square) -> BitBoard {
        match self {
            Reach::Legal(moves) => moves
                .iter()
                .filter(|mv| mv.get_source() == from)
                .fold(EMPTY, |acc, mv| acc | BitBoard::from_square(mv.get_dest())),
            Reach::Attacks => attacks_from(board, from),
        }
    }

    fn reaches(&self, board: &Board, from: Square, to: Square) -> bool {
        self.targets_from(board, from) & BitBoard::from_square(to) != EMPTY
    }
}

fn is_undefended(board: &Board, square: Square, owner: Color) -> bool {
    attackers_of(board, square, owner) == EMPTY
}

fn motif(position: &Position, kind: MotifKind, side: Side, squares: Vec<Square>) -> TacticalMotif {
    let (squares, pieces): (Vec<String>, Vec<BoardPiece>) = squares
        .into_iter()
        .filter_map(|sq| position.occupant_of(sq).map(|piece| (sq.to_string(), piece)))
        .unzip();
    TacticalMotif {
        kind,
        side,
        squares,
        pieces,
    }
}

// ----------------------------------------------------------------------------
// Rules
// ----------------------------------------------------------------------------

/// The side to move is in check.
fn detect_check(position: &Position, set: &mut PatternSet) {
    let board = position.board();
    let checkers = *board.checkers();
    if checkers == EMPTY {
        return;
    }
    let checked = position.side_to_move();
    let mut squares = vec![board.king_square(checked.into())];
    squares.extend(checkers);
    set.insert(motif(position, MotifKind::Check, checked.opponent(), squares));
}

/// A `side` slider lined up on two enemy pieces. Rear worth more than front
/// (and a king, queen or rook) is a pin; front worth more is a skewer.
fn detect_pins_and_skewers(position: &Position, side: Side, set: &mut PatternSet) {
    let board = position.board();
    let color: Color = side.into();
    let enemy = *board.color_combined(!color);

    for (slider, piece) in sliders(board, color) {
        for &direction in directions(piece) {
            let Some(ray) = scan(board, slider, direction) else {
                continue;
            };
            let both_enemy = enemy & BitBoard::from_square(ray.first) != EMPTY
                && enemy & BitBoard::from_square(ray.second) != EMPTY;
            if !both_enemy {
                continue;
            }
            let front = exchange_value(board, ray.first);
            let rear = exchange_value(board, ray.second);
            let rear_is_major = matches!(
                board.piece_on(ray.second),
                Some(Piece::King | Piece::Queen | Piece::Rook)
            );
            let kind = if rear_is_major && rear > front {
                MotifKind::Pin
            } else if front > rear {
                MotifKind::Skewer
            } else {
                continue;
            };
            set.insert(motif(position, kind, side, vec![slider, ray.first, ray.second]));
        }
    }
}

/// A `side` piece able to capture on two or more targets that are each the
/// king, worth more than the attacker, or an undefended non-pawn piece.
fn detect_forks(position: &Position, side: Side, set: &mut PatternSet) {
    let board = position.board();
    let color: Color = side.into();
    let enemy = *board.color_combined(!color);
    let reach = Reach::of(position, side);

    for attacker in *board.color_combined(color) {
        let attacker_value = exchange_value(board, attacker);
        let targets: Vec<Square> = (reach.targets_from(board, attacker) & enemy)
            .filter(|&target| match board.piece_on(target) {
                Some(Piece::King) => true,
                Some(Piece::Pawn) => exchange_value(board, target) > attacker_value,
                Some(_) => {
                    exchange_value(board, target) > attacker_value
                        || is_undefended(board, target, !color)
                }
                None => false,
            })
            .collect();
        if targets.len() >= 2 {
            let mut squares = vec![attacker];
            squares.extend(targets);
            set.insert(motif(position, MotifKind::Fork, side, squares));
        }
    }
}

/// A non-king `side` piece that an enemy piece can legally capture, where the
/// cheapest such capturer is worth less or nothing defends it. The motif
/// favours the attacker.
fn detect_hanging(position: &Position, side: Side, set: &mut PatternSet) {
    let board = position.board();
    let color: Color = side.into();
    let reach = Reach::of(position, side.opponent());

    for square in *board.color_combined(color) {
        if board.piece_on(square) == Some(Piece::King) {
            continue;
        }
        let attackers = attackers_of(board, square, !color)
            .filter(|&attacker| reach.reaches(board, attacker, square))
            .fold(EMPTY, |acc, attacker| acc | BitBoard::from_square(attacker));
        if attackers == EMPTY {
            continue;
        }
        let undefended = is_undefended(board, square, color);
        let cheaper_attacker = least_valuable(board, attackers)
            .is_some_and(|kind| kind.exchange_value() < exchange_value(board, square));
        if undefended || cheaper_attacker {
            let mut squares = vec![square];
            squares.extend(attackers);
            set.insert(motif(position, MotifKind::HangingPiece, side.opponent(), squares));
        }
    }
}

/// A `side` slider aimed through exactly one friendly blocker at a valuable
/// enemy piece, where the blocker has a legal move off the line.
fn detect_discovered_attacks(position: &Position, side: Side, set: &mut PatternSet) {
    let board = position.board();
    let color: Color = side.into();
    let own = *board.color_combined(color);
    let enemy = *board.color_combined(!color);
    let moves = position.legal_moves(side);
    if moves.is_empty() {
        return;
    }

    for (slider, piece) in sliders(board, color) {
        for &direction in directions(piece) {
            let Some(ray) = scan(board, slider, direction) else {
                continue;
            };
            let (blocker, target) = (ray.first, ray.second);
            if own & BitBoard::from_square(blocker) == EMPTY
                || enemy & BitBoard::from_square(target) == EMPTY
            {
                continue;
            }
            let valuable = matches!(
                board.piece_on(target),
                Some(Piece::King | Piece::Queen | Piece::Rook)
            ) || is_undefended(board, target, !color);
            if !valuable {
                continue;
            }
            let leaves_line = moves
                .iter()
                .any(|mv| mv.get_source() == blocker && !ray.walked.contains(&mv.get_dest()));
            if leaves_line {
                set.insert(motif(
                    position,
                    MotifKind::DiscoveredAttack,
                    side,
                    vec![slider, blocker, target],
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::parse_square;

    fn squares(motif: &TacticalMotif) -> Vec<&str> {
        motif.squares.iter().map(String::as_str).collect()
    }

    fn only(set: &PatternSet, kind: MotifKind) -> Vec<&TacticalMotif> {
        set.of_kind(kind).collect()
    }

    #[test]
    fn test_starting_position_has_no_motifs() {
        assert!(detect(&Position::starting()).is_empty());
    }

    #[test]
    fn test_absolute_pin() {
        // Bb5 pins Nc6 to the king on e8.
        let pos = Position::from_fen("4k3/8/2n5/1B6/8/8/8/4K3 w - - 0 1").unwrap();
        let set = detect(&pos);
        let pins = only(&set, MotifKind::Pin);
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].side, Side::White);
        assert_eq!(squares(pins[0]), vec!["b5", "c6", "e8"]);
        assert_eq!(pins[0].pieces[2], BoardPiece::new(PieceKind::King, Side::Black));
    }

    #[test]
    fn test_skewer_with_check() {
        // Bb3 checks the king on d5; the rook on f7 sits behind it.
        let pos = Position::from_fen("8/5r2/8/3k4/8/1B6/8/6K1 b - - 0 1").unwrap();
        let set = detect(&pos);

        let skewers = only(&set, MotifKind::Skewer);
        assert_eq!(skewers.len(), 1);
        assert_eq!(squares(skewers[0]), vec!["b3", "d5", "f7"]);
        assert_eq!(skewers[0].side, Side::White);

        let checks = only(&set, MotifKind::Check);
        assert_eq!(checks.len(), 1);
        assert_eq!(squares(checks[0]), vec!["d5", "b3"]);
        assert_eq!(checks[0].side, Side::White);
    }

    #[test]
    fn test_knight_fork_on_king_and_rook() {
        let pos = Position::from_fen("r3k3/2N5/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        let set = detect(&pos);
        let forks = only(&set, MotifKind::Fork);
        assert_eq!(forks.len(), 1);
        assert_eq!(squares(forks[0]), vec!["c7", "a8", "e8"]);
        assert_eq!(forks[0].side, Side::White);
        assert!(set.contains_kind(MotifKind::Check));
    }

    #[test]
    fn test_piece_attacked_by_cheaper_piece_is_hanging() {
        // Rd2 attacks the queen on d5; the rook itself is defended by the king.
        let pos = Position::from_fen("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1").unwrap();
        let set = detect(&pos);
        let hanging = only(&set, MotifKind::HangingPiece);
        assert_eq!(hanging.len(), 1);
        assert_eq!(squares(hanging[0])[0], "d5");
        assert_eq!(hanging[0].side, Side::White);
    }

    #[test]
    fn test_undefended_piece_is_hanging() {
        // Bd2 attacks the lone knight on a5.
        let pos = Position::from_fen("4k3/8/8/n7/8/8/3B4/4K3 w - - 0 1").unwrap();
        let set = detect(&pos);
        let hanging = only(&set, MotifKind::HangingPiece);
        assert_eq!(hanging.len(), 1);
        assert_eq!(squares(hanging[0]), vec!["a5", "d2"]);
    }

    #[test]
    fn test_pinned_piece_neither_forks_nor_wins_material() {
        // Ne4 eyes both rooks but is pinned to its king by Re8.
        let pos = Position::from_fen("k3r3/8/3r1r2/8/4N3/8/8/4K3 w - - 0 1").unwrap();
        let knight = parse_square("e4").unwrap();
        assert!(pos
            .legal_moves(Side::White)
            .iter()
            .all(|mv| mv.get_source() != knight));

        let set = detect(&pos);
        assert!(!set.contains_kind(MotifKind::Fork));
        assert!(set
            .of_kind(MotifKind::HangingPiece)
            .all(|m| m.side == Side::Black));
        let pins = only(&set, MotifKind::Pin);
        assert_eq!(pins.len(), 1);
        assert_eq!(squares(pins[0]), vec!["e8", "e4", "e1"]);
    }

    #[test]
    fn test_fork_on_king_uses_attack_maps_when_opponent_in_check() {
        // Black is in check, so white cannot be handed the move; the knight
        // still forks king and rook through its attack map.
        let pos = Position::from_fen("r3k3/2N5/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert!(pos.board_for(Side::White).is_none());
        assert!(detect(&pos).contains_kind(MotifKind::Fork));
    }

    #[test]
    fn test_discovered_attack_on_queen() {
        // Moving the e4 knight uncovers Re1 against the queen on e7.
        let pos = Position::from_fen("4k3/4q3/8/8/4N3/8/8/K3R3 w - - 0 1").unwrap();
        let set = detect(&pos);
        let discovered = only(&set, MotifKind::DiscoveredAttack);
        assert_eq!(discovered.len(), 1);
        assert_eq!(squares(discovered[0]), vec!["e1", "e4", "e7"]);
        assert_eq!(discovered[0].side, Side::White);
    }

    #[test]
    fn test_blocked_pawn_does_not_discover() {
        // The e4 pawn cannot leave the file: e5 is occupied and nothing to capture.
        let pos = Position::from_fen("4k3/4q3/8/4p3/4P3/8/8/K3R3 w - - 0 1").unwrap();
        let set = detect(&pos);
        assert!(!set.contains_kind(MotifKind::DiscoveredAttack));
    }

    #[test]
    fn test_detect_is_deterministic() {
        let pos = Position::from_fen(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
        )
        .unwrap();
        assert_eq!(detect(&pos), detect(&pos));
    }

    #[test]
    fn test_motif_display() {
        let pos = Position::from_fen("4k3/8/2n5/1B6/8/8/8/4K3 w - - 0 1").unwrap();
        let set = detect(&pos);
        let pin = set.of_kind(MotifKind::Pin).next().unwrap();
        assert_eq!(
            pin.to_string(),
            "pin for white: white bishop b5 black knight c6 black king e8"
        );
    }
}
