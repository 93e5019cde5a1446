/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::mpsc::{Receiver, Sender};

use anyhow::Result;
use shakmaty::Color;

/// Which side an engine has been assigned to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineColor {
    White,
    Black,
    /// The engine answers every position; useful for self-play.
    Both,
    /// The engine is attached but never moves on its own.
    None,
}

impl EngineColor {
    /// Returns `true` if an engine with this assignment is the one to move
    /// when it is `turn`'s turn.
    pub fn plays(self, turn: Color) -> bool {
        match self {
            Self::White => turn == Color::White,
            Self::Black => turn == Color::Black,
            Self::Both => true,
            Self::None => false,
        }
    }
}

/// Confirmation that a cancelled search has wound down.
///
/// Returned by [`MoveEngine::stop`]. The requester is not blocked; whoever
/// needs the engine idle next calls [`StopSignal::wait`], which returns
/// immediately if there was nothing to stop.
#[derive(Debug, Default)]
pub struct StopSignal(Option<Receiver<()>>);

impl StopSignal {
    /// A signal that is already resolved: no search was running.
    pub fn ready() -> Self {
        Self(None)
    }

    /// A signal that resolves once the receiver's sender fires or drops,
    /// i.e. once the search thread has exited.
    pub fn pending(confirm: Receiver<()>) -> Self {
        Self(Some(confirm))
    }

    /// Blocks until the stopped search has confirmed its exit.
    ///
    /// A dropped sender counts as confirmation: a search thread that died
    /// without reporting is certainly not searching anymore.
    pub fn wait(self) {
        if let Some(confirm) = self.0 {
            let _ = confirm.recv();
        }
    }
}

/// A reply from an engine, tagged with the request it answers.
///
/// Constructed only through [`SearchTicket::deliver`]; the controller drops
/// replies whose token no longer matches the outstanding request.
#[derive(Debug)]
pub struct EngineReply {
    pub(crate) token: u64,
    pub(crate) mv: Result<String>,
}

/// A single outstanding engine computation.
///
/// The controller hands one ticket to the engine per request. It carries the
/// request's generation token, the reply channel, and the stop confirmation
/// of any search that was cancelled just before this one; the engine must
/// let that signal resolve before it reads the position.
#[derive(Debug)]
pub struct SearchTicket {
    token: u64,
    after: Option<StopSignal>,
    reply: Sender<EngineReply>,
}

impl SearchTicket {
    pub(crate) fn new(token: u64, after: StopSignal, reply: Sender<EngineReply>) -> Self {
        Self {
            token,
            after: Some(after),
            reply,
        }
    }

    /// Blocks until any previously cancelled search has wound down.
    ///
    /// Call this on the search thread, before searching. Returns immediately
    /// when no cancellation was pending.
    pub fn wait_until_clear(&mut self) {
        if let Some(signal) = self.after.take() {
            signal.wait();
        }
    }

    /// Delivers the search result, consuming the ticket.
    ///
    /// `mv` is the chosen move in UCI notation, or the error that ended the
    /// search. Every ticket must eventually be delivered; a request that
    /// never answers leaves a blocking [`Controller::await_engine`] waiting
    /// forever.
    ///
    /// [`Controller::await_engine`]: crate::Controller::await_engine
    pub fn deliver(self, mv: Result<String>) {
        let _ = self.reply.send(EngineReply {
            token: self.token,
            mv,
        });
    }
}

/// An asynchronous source of moves for one side of the game.
///
/// Implementations run their search off-thread and deliver through the
/// [`SearchTicket`]; all trait methods are expected to return quickly.
pub trait MoveEngine {
    /// Prepares the engine for use. Called once, before any request.
    fn init(&mut self) -> Result<()>;

    /// Starts a search for the best move in `fen`.
    ///
    /// The implementation must honor the ticket's deferral signal before
    /// reading the position, and must deliver the ticket exactly once, even
    /// on failure. Fails if an un-cancelled search is already running.
    fn request_move(&mut self, fen: &str, ticket: SearchTicket) -> Result<()>;

    /// Asks the engine to abandon the current search.
    ///
    /// Idempotent and safe to call when nothing is searching. The returned
    /// signal resolves once the engine has actually stopped.
    fn stop(&mut self) -> StopSignal;

    /// Returns `true` while an un-cancelled search is running.
    fn is_searching(&self) -> bool;

    /// The side this engine was assigned at construction.
    fn color(&self) -> EngineColor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::thread;
    use std::time::Duration;

    #[test]
    fn plays_resolves_assignment_against_turn() {
        assert!(EngineColor::White.plays(Color::White));
        assert!(!EngineColor::White.plays(Color::Black));
        assert!(EngineColor::Black.plays(Color::Black));
        assert!(!EngineColor::Black.plays(Color::White));
        assert!(EngineColor::Both.plays(Color::White));
        assert!(EngineColor::Both.plays(Color::Black));
        assert!(!EngineColor::None.plays(Color::White));
        assert!(!EngineColor::None.plays(Color::Black));
    }

    #[test]
    fn ready_signal_resolves_immediately() {
        StopSignal::ready().wait();
    }

    #[test]
    fn pending_signal_resolves_on_confirmation_or_drop() {
        let (tx, rx) = channel();
        let signal = StopSignal::pending(rx);
        tx.send(()).unwrap();
        signal.wait();

        let (tx, rx) = channel();
        let signal = StopSignal::pending(rx);
        drop(tx);
        signal.wait();
    }

    #[test]
    fn ticket_defers_until_the_signal_resolves() {
        let (confirm_tx, confirm_rx) = channel();
        let (reply_tx, reply_rx) = channel();
        let mut ticket = SearchTicket::new(7, StopSignal::pending(confirm_rx), reply_tx);

        let cleared = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&cleared);
        let worker = thread::spawn(move || {
            ticket.wait_until_clear();
            seen.store(true, Ordering::Relaxed);
            ticket.deliver(Ok(String::from("e2e4")));
        });

        // The worker must still be parked on the signal
        thread::sleep(Duration::from_millis(20));
        assert!(!cleared.load(Ordering::Relaxed));

        confirm_tx.send(()).unwrap();
        worker.join().unwrap();
        assert!(cleared.load(Ordering::Relaxed));

        let reply = reply_rx.recv().unwrap();
        assert_eq!(reply.token, 7);
        assert_eq!(reply.mv.unwrap(), "e2e4");
    }
}
