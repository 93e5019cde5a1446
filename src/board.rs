/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{bail, Result};
use shakmaty::{
    fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Move, MoveList,
    Piece, Position, Rank, Role, Square,
};

use crate::{ControllerError, MoveDests};

/// FEN of the standard chess starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// The authoritative state of one chess game.
///
/// Wraps the rules oracle's position together with the move stack, which is
/// what makes single-ply undo, the 75-move rule, and repetition detection
/// possible. The position is only ever changed through [`Board::push`] and
/// [`Board::pop`]; loading a new position means replacing the whole [`Board`].
#[derive(Debug, Clone)]
pub struct Board {
    /// The current position, as known to the rules oracle.
    position: Chess,

    /// Every position that led here, paired with the move that left it.
    stack: Vec<(Chess, Move)>,
}

impl Board {
    /// Constructs a [`Board`] at the standard starting position.
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
            stack: Vec::new(),
        }
    }

    /// Constructs a [`Board`] from a FEN string, with an empty move stack.
    ///
    /// Fails with [`ControllerError::MalformedPosition`] if the string cannot
    /// be parsed into a legal position.
    pub fn from_fen(fen: &str) -> Result<Self> {
        let parsed = match fen.trim().parse::<Fen>() {
            Ok(parsed) => parsed,
            Err(err) => bail!(ControllerError::MalformedPosition(format!("{fen:?}: {err}"))),
        };

        let position = match parsed.into_position::<Chess>(CastlingMode::Standard) {
            Ok(position) => position,
            Err(err) => bail!(ControllerError::MalformedPosition(format!("{fen:?}: {err}"))),
        };

        Ok(Self {
            position,
            stack: Vec::new(),
        })
    }

    /// Serializes the current position to a FEN string.
    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// The side to move.
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Returns `true` if the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    /// Returns `true` if the game has ended for any reason in
    /// [`Termination`].
    pub fn is_game_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// The result of the game, if it has ended.
    ///
    /// Beyond the oracle's own predicates this covers the two terminations
    /// that need the move stack: the 75-move rule and fivefold repetition.
    pub fn outcome(&self) -> Option<Outcome> {
        let termination = if self.position.is_checkmate() {
            Termination::Checkmate
        } else if self.position.is_insufficient_material() {
            Termination::InsufficientMaterial
        } else if self.position.is_stalemate() {
            Termination::Stalemate
        } else if self.position.halfmoves() >= 150 {
            Termination::SeventyFiveMoves
        } else if self.repetition_count() >= 5 {
            Termination::FivefoldRepetition
        } else {
            return None;
        };

        let winner = match termination {
            Termination::Checkmate => Some(!self.position.turn()),
            _ => None,
        };

        Some(Outcome { winner, termination })
    }

    /// All legal moves in the current position.
    pub fn legal_moves(&self) -> MoveList {
        self.position.legal_moves()
    }

    /// All legal moves starting from `from`.
    pub fn legal_moves_from(&self, from: Square) -> Vec<Move> {
        self.position
            .legal_moves()
            .iter()
            .filter(|mv| endpoints(mv).0 == from)
            .cloned()
            .collect()
    }

    /// Legal destinations grouped by origin square, in the shape a display
    /// layer consumes as its interaction affordances.
    ///
    /// Empty when the game is over.
    pub fn dests(&self) -> MoveDests {
        let mut dests = MoveDests::new();
        if self.is_game_over() {
            return dests;
        }

        for mv in &self.position.legal_moves() {
            let (from, to) = endpoints(mv);
            let targets = dests.entry(from).or_default();
            // Promotions enumerate one move per piece choice; one entry is enough
            if !targets.contains(&to) {
                targets.push(to);
            }
        }

        dests
    }

    /// Applies `mv` to the position and records it on the move stack.
    ///
    /// Fails with [`ControllerError::IllegalMove`] and leaves the position
    /// untouched if the rules oracle does not list `mv` as legal.
    pub fn push(&mut self, mv: &Move) -> Result<()> {
        if !self.position.legal_moves().contains(mv) {
            bail!(ControllerError::IllegalMove(format!(
                "{} is not legal in this position",
                mv.to_uci(CastlingMode::Standard)
            )));
        }

        let previous = self.position.clone();
        self.position.play_unchecked(mv);
        self.stack.push((previous, mv.clone()));
        Ok(())
    }

    /// Removes the most recent ply, restoring the position that preceded it.
    ///
    /// Returns the removed move, or `None` if the stack is empty.
    pub fn pop(&mut self) -> Option<Move> {
        let (previous, mv) = self.stack.pop()?;
        self.position = previous;
        Some(mv)
    }

    /// Number of plies on the move stack.
    pub fn plies(&self) -> usize {
        self.stack.len()
    }

    /// The piece on `square`, if any.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(square)
    }

    /// The piece type on `square`, ignoring color.
    pub fn role_at(&self, square: Square) -> Option<Role> {
        self.position.board().role_at(square)
    }

    /// Returns `true` if a move from `from` to `to` would be a pawn reaching
    /// a back rank, i.e. the display layer must ask for a promotion piece
    /// before the move can be finalized.
    pub fn is_promotion_candidate(&self, from: Square, to: Square) -> bool {
        self.role_at(from) == Some(Role::Pawn)
            && matches!(to.rank(), Rank::First | Rank::Eighth)
    }

    /// Resolves two squares and an optional promotion piece against the
    /// legal-move list.
    ///
    /// Castling is matched from the king's drag: origin is the king square
    /// and destination is either the king's castled square or the rook.
    pub fn find_move(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
        for mv in &self.position.legal_moves() {
            let matched = match mv {
                Move::Castle { king, rook } => {
                    promotion.is_none() && *king == from && {
                        let (_, king_to) = endpoints(mv);
                        king_to == to || *rook == to
                    }
                }
                _ => {
                    let (mv_from, mv_to) = endpoints(mv);
                    mv_from == from && mv_to == to && mv.promotion() == promotion
                }
            };

            if matched {
                return Some(mv.clone());
            }
        }

        None
    }

    /// Parses a move in UCI notation (e.g. `e2e4`, `a7a8q`) against the
    /// current position.
    ///
    /// Both unparsable strings and legal-looking moves the oracle rejects
    /// fail with [`ControllerError::IllegalMove`].
    pub fn parse_uci(&self, uci: &str) -> Result<Move> {
        let Ok(parsed) = uci.parse::<UciMove>() else {
            bail!(ControllerError::IllegalMove(format!(
                "cannot parse {uci:?} as a UCI move"
            )));
        };

        match parsed.to_move(&self.position) {
            Ok(mv) => Ok(mv),
            Err(_) => bail!(ControllerError::IllegalMove(format!(
                "{uci} is not legal in this position"
            ))),
        }
    }

    /// Parses a move in standard algebraic notation (e.g. `Nf3`) against the
    /// current position.
    pub fn parse_san(&self, san: &str) -> Result<Move> {
        let Ok(parsed) = san.parse::<San>() else {
            bail!(ControllerError::IllegalMove(format!(
                "cannot parse {san:?} as a SAN move"
            )));
        };

        match parsed.to_move(&self.position) {
            Ok(mv) => Ok(mv),
            Err(_) => bail!(ControllerError::IllegalMove(format!(
                "{san} is not legal in this position"
            ))),
        }
    }

    /// Direct access to the oracle's position.
    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// How many times the current position has occurred, counting itself.
    ///
    /// Positions compare by placement, side to move, castling rights, and
    /// en-passant square; the clocks are excluded.
    fn repetition_count(&self) -> usize {
        let key = repetition_key(&self.position);
        1 + self
            .stack
            .iter()
            .filter(|(position, _)| repetition_key(position) == key)
            .count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// The origin and destination of a move as a display layer sees them.
///
/// Castling is reported as the king's two-square hop, matching both UCI
/// notation and what a user drags on screen.
pub(crate) fn endpoints(mv: &Move) -> (Square, Square) {
    match mv.to_uci(CastlingMode::Standard) {
        UciMove::Normal { from, to, .. } => (from, to),
        // Put and Null never arise from legal standard-chess moves
        _ => (mv.to(), mv.to()),
    }
}

fn repetition_key(position: &Chess) -> String {
    let fen = Fen::from_position(position.clone(), EnPassantMode::Legal).to_string();
    fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
}

pub(crate) fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// The terminal result of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// The winning side, or `None` for a draw.
    pub winner: Option<Color>,

    /// Why the game ended.
    pub termination: Termination,
}

impl Outcome {
    /// The conventional result string: `1-0`, `0-1`, or `1/2-1/2`.
    pub fn result(&self) -> &'static str {
        match self.winner {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None => "1/2-1/2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.result(), self.termination)
    }
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    SeventyFiveMoves,
    FivefoldRepetition,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checkmate => "checkmate",
            Self::Stalemate => "stalemate",
            Self::InsufficientMaterial => "insufficient material",
            Self::SeventyFiveMoves => "the seventyfive-move rule",
            Self::FivefoldRepetition => "fivefold repetition",
        };
        write!(f, "{name}")
    }
}
