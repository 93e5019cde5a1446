/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Authoritative game state; wraps the rules oracle and its move stack.
mod board;

/// Startup arguments and REPL commands for the demo binary.
mod cli;

/// The game controller, mediating between board, display, and engine.
mod controller;

/// The display-sink interface and the bundled implementations.
mod display;

/// The move-engine interface and its cancellation plumbing.
mod engine;

/// The failure taxonomy surfaced by controller operations.
mod error;

/// Material scoring used by the built-in engine.
mod eval;

/// The built-in single-ply engine.
mod search;

pub use board::*;
pub use cli::*;
pub use controller::*;
pub use display::*;
pub use engine::*;
pub use error::*;
use eval::*;
pub use search::*;
