/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use clap::{builder::PossibleValue, Parser, ValueEnum};

use crate::EngineColor;

/// Startup options for the demo binary.
#[derive(Debug, Parser)]
#[command(about, version)]
pub struct Cli {
    /// Initial position as a FEN string. Defaults to the starting position.
    #[arg(short, long)]
    pub fen: Option<String>,

    /// Which side the built-in engine plays.
    #[arg(short, long, value_enum, default_value = "black")]
    pub engine: EngineColor,
}

/// A command entered at the REPL prompt.
#[derive(Debug, Clone, Parser)]
#[command(
    multicall = true,
    about,
    rename_all = "lower",
    override_usage("<COMMAND>")
)]
pub enum ReplCommand {
    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Print the FEN string for the current position.
    Fen,

    /// Apply a move given in UCI notation (e.g. `move e2e4`, `move a7a8q`).
    #[command(alias = "m")]
    Move { mv: String },

    /// Apply a move given in standard algebraic notation (e.g. `san Nf3`).
    San { mv: String },

    /// Simulate dragging a piece between two squares, as a board UI would.
    ///
    /// A pawn reaching the last rank prompts for the promotion piece.
    Drag { from: String, to: String },

    /// Show all legal moves, or only those from a specific square.
    Moves { square: Option<String> },

    /// Load a position from a FEN string.
    Load { fen: Vec<String> },

    /// Reset the board to the starting position.
    New,

    /// Undo the most recent move.
    Undo,

    /// Flip the board orientation.
    Flip,

    /// Ask the engine to play a move for the current position now.
    Go,

    /// Quit.
    #[command(aliases = ["quit", "q"])]
    Exit,
}

impl FromStr for ReplCommand {
    type Err = clap::Error;

    /// Attempt to parse a [`ReplCommand`] from a line of input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse_from(s.split_ascii_whitespace())
    }
}

impl ValueEnum for EngineColor {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::White, Self::Black, Self::Both, Self::None]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        let name = match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Both => "both",
            Self::None => "none",
        };
        Some(PossibleValue::new(name))
    }
}
