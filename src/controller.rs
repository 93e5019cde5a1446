/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use anyhow::{bail, Result};
use shakmaty::{Color, Move, Role, Square};

use crate::{
    endpoints, Board, ControllerError, DisplaySink, EngineReply, MoveDests, MoveEngine,
    NullDisplay, Outcome, SearchTicket, StopSignal, ViewUpdate,
};

/// A read-only picture of the controller, handed to the state-change
/// callback after every committed transition.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub fen: String,
    pub turn: Color,
    pub check: bool,
    pub game_over: bool,
    pub orientation: Color,
    /// Plies on the move stack.
    pub plies: usize,
}

/// The callback fan-out. Events are dispatched after a transition commits,
/// never interleaved with it.
struct Callbacks {
    /// Fired whenever the game state (not just visuals) changed.
    state_change: Box<dyn FnMut(&Snapshot)>,

    /// Fired after every applied move.
    moved: Box<dyn FnMut(&Move)>,

    /// Fired when a transition ends the game.
    game_over: Box<dyn FnMut(&Outcome)>,

    /// Consulted when a user move needs a promotion piece. May block on the
    /// owner's UI; the controller holds no search and accepts no other move
    /// while it does.
    promotion: Box<dyn FnMut(Square) -> Role>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            state_change: Box::new(|_| {}),
            moved: Box::new(|_| {}),
            game_over: Box::new(|_| {}),
            promotion: Box::new(|_| Role::Queen),
        }
    }
}

/// Assembles a [`Controller`].
///
/// Everything is optional: the default is a headless controller at the
/// starting position with no engine, queen promotion, and no observers.
#[derive(Default)]
pub struct ControllerBuilder {
    board: Board,
    display: Option<Box<dyn DisplaySink>>,
    engine: Option<Box<dyn MoveEngine>>,
    orientation: Option<Color>,
    callbacks: Callbacks,
}

impl ControllerBuilder {
    /// Starts from `board` instead of the standard starting position.
    pub fn board(mut self, board: Board) -> Self {
        self.board = board;
        self
    }

    /// Attaches the display sink the controller keeps synchronized.
    pub fn display(mut self, display: impl DisplaySink + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    /// Binds the automated opponent. At most one engine; the binding and its
    /// color assignment are fixed for the controller's lifetime.
    pub fn engine(mut self, engine: impl MoveEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Which side is displayed at the bottom of the board.
    pub fn orientation(mut self, orientation: Color) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Observer for committed state changes.
    pub fn on_state_change(mut self, f: impl FnMut(&Snapshot) + 'static) -> Self {
        self.callbacks.state_change = Box::new(f);
        self
    }

    /// Observer for applied moves.
    pub fn on_move(mut self, f: impl FnMut(&Move) + 'static) -> Self {
        self.callbacks.moved = Box::new(f);
        self
    }

    /// Observer for game termination.
    pub fn on_game_over(mut self, f: impl FnMut(&Outcome) + 'static) -> Self {
        self.callbacks.game_over = Box::new(f);
        self
    }

    /// Supplier of the promotion piece for user moves reaching a back rank.
    /// Without an override, every promotion is to a queen.
    pub fn on_promotion(mut self, f: impl FnMut(Square) -> Role + 'static) -> Self {
        self.callbacks.promotion = Box::new(f);
        self
    }

    /// Builds the controller and pushes the initial position to the display.
    ///
    /// The controller is not usable for moves until [`Controller::init`]
    /// has run.
    pub fn build(self) -> Controller {
        let orientation = self.orientation.unwrap_or(Color::White);
        let mut display = self.display.unwrap_or_else(|| Box::new(NullDisplay));

        display.set(ViewUpdate {
            fen: Some(self.board.fen()),
            orientation: Some(orientation),
            ..Default::default()
        });

        let (reply_tx, reply_rx) = channel();

        Controller {
            board: self.board,
            display,
            engine: self.engine,
            orientation,
            callbacks: self.callbacks,
            initialized: false,
            game_over: false,
            pending_stop: None,
            active_search: None,
            last_token: 0,
            reply_tx,
            reply_rx,
        }
    }
}

/// The board-state synchronization controller.
///
/// Owns the authoritative [`Board`] and keeps three collaborators consistent
/// with it: a [`DisplaySink`] it pushes projections to, programmatic callers
/// issuing moves, and an optional [`MoveEngine`] opponent whose replies are
/// pumped through [`Controller::poll_engine`] / [`Controller::await_engine`].
///
/// Not reentrant: exactly one move-application sequence may be in flight at
/// a time, enforced by `&mut self` and by convention for the callbacks.
pub struct Controller {
    board: Board,
    display: Box<dyn DisplaySink>,
    engine: Option<Box<dyn MoveEngine>>,
    orientation: Color,
    callbacks: Callbacks,

    /// True once startup sequencing has completed; never reset.
    initialized: bool,

    /// Recomputed from the board after every move, load, or undo.
    game_over: bool,

    /// Confirmation of the most recent cancellation, if it has not yet been
    /// threaded into a new search request.
    pending_stop: Option<StopSignal>,

    /// Token of the engine request whose reply is still wanted.
    active_search: Option<u64>,
    last_token: u64,

    reply_tx: Sender<EngineReply>,
    reply_rx: Receiver<EngineReply>,
}

impl Controller {
    /// Starts assembling a controller; see [`ControllerBuilder`].
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    /// Runs the startup sequencing. Must complete before any move is
    /// accepted; calling it again is a no-op.
    ///
    /// With an engine bound this starts the engine, synchronizes the display
    /// to the current position, and, when the engine moves first, requests
    /// the opening engine turn before the session counts as initialized.
    pub fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        if let Some(engine) = self.engine.as_mut() {
            engine.init()?;
        }

        self.refresh_game_over();
        self.sync_display(true);
        self.emit_state();

        if !self.game_over && self.engine_plays() {
            self.play_engine_move()?;
        }

        self.initialized = true;
        Ok(())
    }

    /// Replaces the authoritative position wholesale.
    ///
    /// Any outstanding engine search is cancelled first, and a follow-up
    /// engine turn (if the new position puts the automated opponent on the
    /// move) is deferred until that cancellation has confirmed.
    pub fn set_board(&mut self, board: Board, animate: bool) -> Result<()> {
        self.cancel_outstanding();
        self.board = board;
        self.refresh_game_over();
        self.sync_display(animate);
        self.emit_state();

        if self.initialized && !self.game_over && self.engine_plays() {
            self.play_engine_move()?;
        }

        Ok(())
    }

    /// Replaces the position from a FEN string.
    ///
    /// Fails with [`ControllerError::MalformedPosition`] and changes nothing
    /// if the string does not parse.
    pub fn set_fen(&mut self, fen: &str) -> Result<()> {
        self.set_board(Board::from_fen(fen)?, true)
    }

    /// Resets to the standard starting position.
    pub fn reset(&mut self) -> Result<()> {
        self.set_fen(crate::STARTING_FEN)
    }

    /// Applies a move attempted on the display: the user dragged a piece
    /// from `orig` to `dest`.
    ///
    /// Square names arrive verbatim from the display layer; the reserved
    /// null-square name `a0` (and anything else unparsable) is rejected with
    /// [`ControllerError::InvalidSquare`]. A pawn reaching a back rank
    /// suspends on the promotion callback before the move is finalized.
    /// Returns the applied move.
    pub fn user_move(&mut self, orig: &str, dest: &str) -> Result<Move> {
        self.ensure_initialized()?;

        let from = parse_square(orig)?;
        let to = parse_square(dest)?;

        // Fire-and-forget: the move must not wait on the engine winding down
        self.cancel_outstanding();

        let promotion = if self.board.is_promotion_candidate(from, to) {
            Some((self.callbacks.promotion)(to))
        } else {
            None
        };

        let Some(mv) = self.board.find_move(from, to, promotion) else {
            bail!(ControllerError::IllegalMove(format!(
                "{orig}{dest} is not legal in this position"
            )));
        };

        // The display already shows the user's drag; no animation command
        self.board.push(&mv)?;
        self.post_move_admin(&mv)?;
        Ok(mv)
    }

    /// Applies `mv` programmatically.
    ///
    /// Unlike the user path this rejects outright once the game is over, and
    /// expects any promotion piece to already be present on the move.
    pub fn push(&mut self, mv: Move) -> Result<()> {
        self.ensure_initialized()?;
        if self.game_over {
            bail!(ControllerError::GameOver);
        }

        self.cancel_outstanding();
        self.board.push(&mv)?;

        // Cheap two-square animation; full reloads only where post-move
        // admin decides they are needed
        let (from, to) = endpoints(&mv);
        self.display.animate_move(from, to);
        self.display.set(ViewUpdate {
            turn: Some(self.board.turn()),
            ..Default::default()
        });

        self.post_move_admin(&mv)
    }

    /// Applies a move given in UCI notation, as engines produce it.
    pub fn push_uci(&mut self, uci: &str) -> Result<Move> {
        self.ensure_initialized()?;
        if self.game_over {
            bail!(ControllerError::GameOver);
        }
        let mv = self.board.parse_uci(uci)?;
        self.push(mv.clone())?;
        Ok(mv)
    }

    /// Applies a move given in standard algebraic notation.
    pub fn push_san(&mut self, san: &str) -> Result<Move> {
        self.ensure_initialized()?;
        if self.game_over {
            bail!(ControllerError::GameOver);
        }
        let mv = self.board.parse_san(san)?;
        self.push(mv.clone())?;
        Ok(mv)
    }

    /// Requests a move from the bound engine for the current position.
    ///
    /// Fails with [`ControllerError::NoEngine`] without a binding. The
    /// request inherits any pending cancellation confirmation, so the engine
    /// never searches while a prior search is winding down. The reply is
    /// collected by [`Controller::poll_engine`] or
    /// [`Controller::await_engine`] and fed through the programmatic move
    /// path, legality checks included.
    pub fn play_engine_move(&mut self) -> Result<()> {
        if self.engine.is_none() {
            bail!(ControllerError::NoEngine);
        }

        let fen = self.board.fen();
        let after = self.pending_stop.take().unwrap_or_default();
        self.last_token += 1;
        let token = self.last_token;
        let ticket = SearchTicket::new(token, after, self.reply_tx.clone());

        let engine = self.engine.as_mut().expect("engine presence checked above");
        engine.request_move(&fen, ticket)?;
        self.active_search = Some(token);
        Ok(())
    }

    /// Applies the engine's reply if one has arrived; never blocks.
    ///
    /// Returns the applied move, or `None` if no search is outstanding or
    /// the reply is still pending. Replies from cancelled or superseded
    /// searches are discarded silently.
    pub fn poll_engine(&mut self) -> Result<Option<Move>> {
        while self.active_search.is_some() {
            match self.reply_rx.try_recv() {
                Ok(reply) => {
                    if let Some(mv) = self.handle_reply(reply)? {
                        return Ok(Some(mv));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Blocks until the outstanding search answers, and applies the reply.
    ///
    /// Returns `None` immediately when no search is outstanding. This is
    /// the single suspension point an owner without an event loop needs:
    /// after any operation that put the automated opponent on the move, call
    /// this to let the engine's move land.
    pub fn await_engine(&mut self) -> Result<Option<Move>> {
        while self.active_search.is_some() {
            let Ok(reply) = self.reply_rx.recv() else {
                return Ok(None);
            };
            if let Some(mv) = self.handle_reply(reply)? {
                return Ok(Some(mv));
            }
        }
        Ok(None)
    }

    /// Undoes the most recent ply.
    ///
    /// Returns the removed move, or `None` when there is nothing to undo.
    /// Either way the game-over state is recomputed from the resulting
    /// position (a position loaded from a terminal FEN stays terminal), the
    /// display gets a full refresh, and only the state-change callback
    /// fires. Deliberately does not start an engine turn, even when the
    /// automated opponent is now to move.
    pub fn pop(&mut self) -> Option<Move> {
        let mv = self.board.pop();
        self.game_over = self.board.is_game_over();
        self.sync_display(true);
        self.emit_state();
        mv
    }

    /// Flips which side is displayed at the bottom. Pure projection; the
    /// position is untouched.
    pub fn toggle_orientation(&mut self) {
        self.orientation = !self.orientation;
        self.display.set(ViewUpdate {
            orientation: Some(self.orientation),
            ..Default::default()
        });
        self.emit_state();
    }

    /// The current orientation.
    pub fn orientation(&self) -> Color {
        self.orientation
    }

    /// The authoritative game state.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// FEN of the current position.
    pub fn fen(&self) -> String {
        self.board.fen()
    }

    /// The side to move.
    pub fn turn(&self) -> Color {
        self.board.turn()
    }

    /// Whether the game has ended.
    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Whether startup sequencing has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether an engine reply is still outstanding.
    pub fn is_searching(&self) -> bool {
        self.active_search.is_some()
    }

    /// The current [`Snapshot`], as the state-change callback sees it.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            fen: self.board.fen(),
            turn: self.board.turn(),
            check: self.board.is_check(),
            game_over: self.game_over,
            orientation: self.orientation,
            plies: self.board.plies(),
        }
    }

    /// Shared tail of both move paths: reconcile the display, dispatch
    /// events, and hand the turn to the engine if it is due.
    fn post_move_admin(&mut self, mv: &Move) -> Result<()> {
        let engine_turn = self.engine_plays();

        // These two change more squares than the two endpoints, so the
        // animation alone under-reports; reload the whole position
        if mv.is_en_passant() || mv.promotion().is_some() {
            self.display.set(ViewUpdate {
                fen: Some(self.board.fen()),
                ..Default::default()
            });
        }

        if self.board.is_check() {
            self.display.set(ViewUpdate {
                check: Some(true),
                ..Default::default()
            });
        }

        (self.callbacks.moved)(mv);
        self.refresh_game_over();

        if engine_turn {
            // No human-movable squares while the automated opponent thinks
            self.display.set(ViewUpdate {
                dests: Some(MoveDests::new()),
                ..Default::default()
            });
        } else {
            self.display.set(ViewUpdate {
                turn: Some(self.board.turn()),
                dests: Some(self.board.dests()),
                ..Default::default()
            });
        }

        self.emit_state();

        if !self.game_over && engine_turn {
            self.play_engine_move()?;
        }

        Ok(())
    }

    /// Applies one engine reply, dropping it if its token is stale.
    fn handle_reply(&mut self, reply: EngineReply) -> Result<Option<Move>> {
        match self.active_search {
            Some(token) if token == reply.token => {
                self.active_search = None;
                // Engine failures are not masked, and a malformed suggestion
                // must fail the same legality check as any other move
                let uci = reply.mv?;
                let mv = self.push_uci(&uci)?;
                Ok(Some(mv))
            }
            _ => Ok(None),
        }
    }

    /// Requests cancellation of any outstanding search without blocking,
    /// keeping the confirmation signal for the next request to defer on.
    fn cancel_outstanding(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            if engine.is_searching() {
                self.pending_stop = Some(engine.stop());
            }
        }
        self.active_search = None;
    }

    /// Recomputes `game_over`, firing the game-over callback on the
    /// transition into a terminal position.
    fn refresh_game_over(&mut self) {
        let was_over = self.game_over;
        self.game_over = self.board.is_game_over();

        if self.game_over && !was_over {
            if let Some(outcome) = self.board.outcome() {
                (self.callbacks.game_over)(&outcome);
            }
        }
    }

    /// Pushes a full projection of the current position to the display.
    fn sync_display(&mut self, animate: bool) {
        let engine_turn = self.engine_plays();
        let dests = if engine_turn {
            MoveDests::new()
        } else {
            self.board.dests()
        };

        self.display.set(ViewUpdate {
            fen: Some(self.board.fen()),
            turn: Some(self.board.turn()),
            check: Some(self.board.is_check()),
            dests: Some(dests),
            clear_last_move: true,
            clear_selection: true,
            animate: Some(animate),
            ..Default::default()
        });
    }

    fn emit_state(&mut self) {
        let snapshot = self.snapshot();
        (self.callbacks.state_change)(&snapshot);
    }

    /// Whether the automated opponent moves in the current position.
    fn engine_plays(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|engine| engine.color().plays(self.board.turn()))
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            bail!(ControllerError::Uninitialized);
        }
        Ok(())
    }
}

/// Parses a display-layer square name, rejecting the null-square sentinel.
fn parse_square(name: &str) -> Result<Square> {
    // `a0` is the display layer's reserved null square; it parses nowhere
    // but gets called out explicitly because it is a documented sentinel
    if name == "a0" {
        bail!(ControllerError::InvalidSquare(name.to_string()));
    }

    match name.parse::<Square>() {
        Ok(square) => Ok(square),
        Err(_) => bail!(ControllerError::InvalidSquare(name.to_string())),
    }
}
