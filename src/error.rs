/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use thiserror::Error;

/// The failure classes a [`Controller`](crate::Controller) operation can report.
///
/// Operations return [`anyhow::Result`], so callers that only want to print a
/// failure can treat it opaquely; callers that need to branch on the class
/// recover it with [`anyhow::Error::downcast_ref`]:
///
/// ```ignore
/// if let Err(err) = controller.push_uci("e2e4") {
///     match err.downcast_ref::<ControllerError>() {
///         Some(ControllerError::GameOver) => { /* ignore */ }
///         _ => return Err(err),
///     }
/// }
/// ```
///
/// A rejected operation never leaves partial state behind: the board and the
/// display sink are exactly as they were before the call.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A move-producing operation was called before `init` completed.
    #[error("move attempted before initialisation finished")]
    Uninitialized,

    /// A programmatic move was attempted after the game ended.
    #[error("invalid move: game is over")]
    GameOver,

    /// The rules oracle rejected the move, or a move string failed to parse.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// A display-layer square name was the null-square sentinel or unparsable.
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    /// A position transcript could not be parsed into a legal position.
    #[error("malformed position: {0}")]
    MalformedPosition(String),

    /// An engine operation was requested but no engine binding exists.
    #[error("no engine configured")]
    NoEngine,
}
