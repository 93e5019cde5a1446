/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use shakmaty::{Color, Square};

use crate::color_name;

/// Interaction affordances: every square the user may pick a piece up from,
/// mapped to the squares that piece may be dropped on.
pub type MoveDests = HashMap<Square, Vec<Square>>;

/// A partial state update for a display sink.
///
/// Fields left at their defaults are "no change", so call sites update just
/// the properties they own:
///
/// ```ignore
/// sink.set(ViewUpdate {
///     check: Some(true),
///     ..Default::default()
/// });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ViewUpdate {
    /// Replace the displayed position wholesale.
    pub fen: Option<String>,

    /// Which side is shown at the bottom of the board.
    pub orientation: Option<Color>,

    /// Whose turn it is, for the sink's turn indicator.
    pub turn: Option<Color>,

    /// Whether to raise the check highlight.
    pub check: Option<bool>,

    /// Which squares the user may interact with. An empty map disables all
    /// piece interaction.
    pub dests: Option<MoveDests>,

    /// Drop the last-move highlight.
    pub clear_last_move: bool,

    /// Drop any in-progress piece selection.
    pub clear_selection: bool,

    /// Whether the sink should animate this update.
    pub animate: Option<bool>,
}

/// A mutable visual representation of one chess position.
///
/// The controller pushes state in; the only information flowing back out is
/// the user's move attempt, which the embedding UI forwards to
/// [`Controller::user_move`](crate::Controller::user_move) from whatever
/// drag/click event its widget raises.
pub trait DisplaySink {
    /// Applies a bulk partial state update.
    fn set(&mut self, update: ViewUpdate);

    /// Moves whatever sits on `from` to `to`, animating the hop.
    ///
    /// This is the cheap path for simple moves; updates that change more
    /// squares than the two endpoints (en passant, promotion) arrive as a
    /// full position replacement through [`DisplaySink::set`] instead.
    fn animate_move(&mut self, from: Square, to: Square);
}

/// A sink that ignores everything. Useful for headless use of the
/// controller, and as the default before a real display is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn set(&mut self, _update: ViewUpdate) {}

    fn animate_move(&mut self, _from: Square, _to: Square) {}
}

/// A terminal renderer backing the demo binary.
///
/// The sink half is handed to the controller; the [`ViewHandle`] half stays
/// with the owner, which decides when to draw.
#[derive(Debug)]
pub struct TextDisplay {
    model: Arc<Mutex<ViewModel>>,
}

impl TextDisplay {
    /// Creates the sink and its rendering handle.
    pub fn new() -> (Self, ViewHandle) {
        let model = Arc::new(Mutex::new(ViewModel::default()));
        let handle = ViewHandle {
            model: Arc::clone(&model),
        };
        (Self { model }, handle)
    }
}

impl DisplaySink for TextDisplay {
    fn set(&mut self, update: ViewUpdate) {
        let Ok(mut model) = self.model.lock() else {
            return;
        };

        if let Some(fen) = update.fen {
            model.load_placement(&fen);
        }
        if let Some(orientation) = update.orientation {
            model.orientation = orientation;
        }
        if let Some(turn) = update.turn {
            model.turn = turn;
        }
        if let Some(check) = update.check {
            model.check = check;
        }
        if let Some(dests) = update.dests {
            model.dests = dests;
        }
        if update.clear_last_move {
            model.last_move = None;
        }
    }

    fn animate_move(&mut self, from: Square, to: Square) {
        let Ok(mut model) = self.model.lock() else {
            return;
        };
        model.apply_move(from, to);
        model.last_move = Some((from, to));
    }
}

/// The owner-facing half of a [`TextDisplay`].
#[derive(Debug, Clone)]
pub struct ViewHandle {
    model: Arc<Mutex<ViewModel>>,
}

impl ViewHandle {
    /// Draws the current view to stdout.
    pub fn render(&self) {
        let Ok(model) = self.model.lock() else {
            return;
        };
        model.render();
    }
}

/// What the terminal display knows about the position it is showing.
///
/// Deliberately dumber than the controller: it has no rules knowledge and
/// only mirrors what it was told, which is exactly the contract a graphical
/// board widget would have.
#[derive(Debug)]
struct ViewModel {
    /// Piece letters by `[rank][file]`, rank 0 being rank 1.
    grid: [[Option<char>; 8]; 8],
    orientation: Color,
    turn: Color,
    check: bool,
    last_move: Option<(Square, Square)>,
    dests: MoveDests,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            grid: [[None; 8]; 8],
            orientation: Color::White,
            turn: Color::White,
            check: false,
            last_move: None,
            dests: MoveDests::new(),
        }
    }
}

impl ViewModel {
    /// Rebuilds the grid from the placement field of `fen`.
    fn load_placement(&mut self, fen: &str) {
        let mut grid = [[None; 8]; 8];

        if let Some(placement) = fen.split(' ').next() {
            for (row, rank) in placement.split('/').take(8).enumerate() {
                let mut file = 0usize;
                for c in rank.chars() {
                    if let Some(skip) = c.to_digit(10) {
                        file += skip as usize;
                    } else if file < 8 {
                        grid[7 - row][file] = Some(c);
                        file += 1;
                    }
                }
            }
        }

        self.grid = grid;
    }

    /// Applies a two-square hop to the grid.
    fn apply_move(&mut self, from: Square, to: Square) {
        let piece = self.take(from);
        self.put(to, piece);

        // A king hopping two files is castling; carry the rook along
        if matches!(piece, Some('K') | Some('k'))
            && (from.file() as i32 - to.file() as i32).abs() == 2
        {
            let (rook_from, rook_to) = if to.file() > from.file() {
                (Square::from_coords(shakmaty::File::H, from.rank()),
                 Square::from_coords(shakmaty::File::F, from.rank()))
            } else {
                (Square::from_coords(shakmaty::File::A, from.rank()),
                 Square::from_coords(shakmaty::File::D, from.rank()))
            };
            let rook = self.take(rook_from);
            self.put(rook_to, rook);
        }
    }

    fn take(&mut self, square: Square) -> Option<char> {
        self.grid[square.rank() as usize][square.file() as usize].take()
    }

    fn put(&mut self, square: Square, piece: Option<char>) {
        self.grid[square.rank() as usize][square.file() as usize] = piece;
    }

    fn render(&self) {
        let ranks: Vec<usize> = match self.orientation {
            Color::White => (0..8).rev().collect(),
            Color::Black => (0..8).collect(),
        };
        let files: Vec<usize> = match self.orientation {
            Color::White => (0..8).collect(),
            Color::Black => (0..8).rev().collect(),
        };

        println!();
        for &rank in &ranks {
            print!("{} ", rank + 1);
            for &file in &files {
                match self.grid[rank][file] {
                    Some(piece) => print!("{} ", glyph(piece)),
                    None => print!(". "),
                }
            }
            println!();
        }

        print!("  ");
        for &file in &files {
            print!("{} ", (b'a' + file as u8) as char);
        }
        println!();

        let check = if self.check { " (check)" } else { "" };
        let last = match self.last_move {
            Some((from, to)) => format!(", last move {from}{to}"),
            None => String::new(),
        };
        println!("{} to move{check}{last}", color_name(self.turn));

        if self.dests.is_empty() {
            println!("no pieces to move");
        } else {
            println!("{} piece(s) can move", self.dests.len());
        }
    }
}

fn glyph(piece: char) -> char {
    match piece {
        'K' => '♔',
        'Q' => '♕',
        'R' => '♖',
        'B' => '♗',
        'N' => '♘',
        'P' => '♙',
        'k' => '♚',
        'q' => '♛',
        'r' => '♜',
        'b' => '♝',
        'n' => '♞',
        'p' => '♟',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::STARTING_FEN;

    #[test]
    fn placement_parses_the_starting_position() {
        let mut model = ViewModel::default();
        model.load_placement(STARTING_FEN);

        assert_eq!(model.grid[0][4], Some('K')); // e1
        assert_eq!(model.grid[7][4], Some('k')); // e8
        assert_eq!(model.grid[1][0], Some('P')); // a2
        assert_eq!(model.grid[4][4], None); // e5
    }

    #[test]
    fn animate_applies_the_hop() {
        let mut model = ViewModel::default();
        model.load_placement(STARTING_FEN);
        model.apply_move("e2".parse().unwrap(), "e4".parse().unwrap());

        assert_eq!(model.grid[1][4], None);
        assert_eq!(model.grid[3][4], Some('P'));
    }

    #[test]
    fn castling_hop_carries_the_rook() {
        let mut model = ViewModel::default();
        model.load_placement("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        model.apply_move("e1".parse().unwrap(), "g1".parse().unwrap());

        assert_eq!(model.grid[0][6], Some('K')); // g1
        assert_eq!(model.grid[0][5], Some('R')); // f1
        assert_eq!(model.grid[0][7], None); // h1
    }
}
