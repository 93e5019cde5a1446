/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver},
        Arc,
    },
    thread,
};

use anyhow::{bail, Context, Result};
use rand::Rng;
use shakmaty::{fen::Fen, CastlingMode, Chess, Move, Position};

use crate::{material, EngineColor, MoveEngine, SearchTicket, StopSignal};

/// Score awarded to a move that checkmates; dwarfs any material swing.
const MATE_SCORE: i32 = 1_000_000;

/// The built-in engine: a single-ply material search with random
/// tie-breaking.
///
/// It exists to give the demo binary an opponent and to exercise the
/// [`MoveEngine`] contract end to end; playing strength is beside the point.
/// Each request spawns a search thread that honors the ticket's deferral
/// signal, polls the stop flag between moves, and always delivers.
#[derive(Debug)]
pub struct GreedyEngine {
    color: EngineColor,

    /// The search in flight, if any.
    slot: Option<SearchSlot>,
}

/// Shared state of one spawned search.
#[derive(Debug)]
struct SearchSlot {
    /// Set to ask the search to bail out early.
    stop: Arc<AtomicBool>,

    /// Cleared by the search thread just before it delivers.
    running: Arc<AtomicBool>,

    /// Fires when the search thread exits; consumed by [`MoveEngine::stop`].
    confirm: Option<Receiver<()>>,
}

impl GreedyEngine {
    /// Constructs an engine that will play for `color`.
    pub fn new(color: EngineColor) -> Self {
        Self { color, slot: None }
    }
}

impl MoveEngine for GreedyEngine {
    fn init(&mut self) -> Result<()> {
        // Nothing to warm up; the engine is stateless between requests
        Ok(())
    }

    fn request_move(&mut self, fen: &str, mut ticket: SearchTicket) -> Result<()> {
        if self.is_searching() {
            bail!("a search is already running");
        }

        let position = fen
            .parse::<Fen>()
            .context("engine received an unparsable position")?
            .into_position::<Chess>(CastlingMode::Standard)
            .context("engine received an illegal position")?;

        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (confirm_tx, confirm_rx) = channel();

        let thread_stop = Arc::clone(&stop);
        let thread_running = Arc::clone(&running);
        thread::spawn(move || {
            ticket.wait_until_clear();
            let choice = pick_move(&position, &thread_stop);
            thread_running.store(false, Ordering::Relaxed);
            ticket.deliver(choice);
            let _ = confirm_tx.send(());
        });

        self.slot = Some(SearchSlot {
            stop,
            running,
            confirm: Some(confirm_rx),
        });

        Ok(())
    }

    fn stop(&mut self) -> StopSignal {
        match self.slot.as_mut() {
            Some(slot) if slot.running.load(Ordering::Relaxed) => {
                slot.stop.store(true, Ordering::Relaxed);
                match slot.confirm.take() {
                    Some(confirm) => StopSignal::pending(confirm),
                    // Already stopped once; nothing further to confirm
                    None => StopSignal::ready(),
                }
            }
            _ => StopSignal::ready(),
        }
    }

    fn is_searching(&self) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|slot| slot.running.load(Ordering::Relaxed) && !slot.stop.load(Ordering::Relaxed))
    }

    fn color(&self) -> EngineColor {
        self.color
    }
}

/// Picks the move with the best one-ply material outcome.
///
/// Checks the stop flag between candidates and returns the best seen so far
/// when asked to bail.
fn pick_move(position: &Chess, stop: &AtomicBool) -> Result<String> {
    let legal = position.legal_moves();
    if legal.is_empty() {
        bail!("no legal moves in the requested position");
    }

    let mut rng = rand::thread_rng();
    let mut best: Option<(i32, Move)> = None;

    for mv in &legal {
        // Evaluate at least one candidate so a stopped search still answers
        if best.is_some() && stop.load(Ordering::Relaxed) {
            break;
        }

        let mut after = position.clone();
        after.play_unchecked(mv);

        let score = if after.is_checkmate() {
            MATE_SCORE
        } else {
            // `material` scores for the opponent after our move, so negate;
            // the jitter breaks ties between equivalent moves
            -material(&after) + rng.gen_range(0..10)
        };

        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((score, mv.clone()));
        }
    }

    let (_, mv) = best.expect("legal move list was non-empty");
    Ok(mv.to_uci(CastlingMode::Standard).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn request(engine: &mut GreedyEngine, fen: &str) -> Result<String> {
        let (tx, rx) = channel();
        let ticket = SearchTicket::new(1, StopSignal::ready(), tx);
        engine.request_move(fen, ticket)?;
        rx.recv().unwrap().mv
    }

    #[test]
    fn returns_a_legal_move_for_the_start_position() {
        let mut engine = GreedyEngine::new(EngineColor::White);
        let uci = request(
            &mut engine,
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        )
        .unwrap();

        let board = crate::Board::new();
        assert!(board.parse_uci(&uci).is_ok());
    }

    #[test]
    fn prefers_mate_in_one() {
        let mut engine = GreedyEngine::new(EngineColor::White);
        let uci = request(&mut engine, "6k1/8/6K1/8/8/8/8/7R w - - 0 1").unwrap();
        assert_eq!(uci, "h1h8");
    }

    #[test]
    fn fails_cleanly_on_a_dead_position() {
        let mut engine = GreedyEngine::new(EngineColor::White);
        // Fool's mate: white has no legal moves
        let result = request(
            &mut engine,
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        );
        assert!(result.is_err());
    }

    #[test]
    fn stop_is_idempotent_when_idle() {
        let mut engine = GreedyEngine::new(EngineColor::Black);
        engine.stop().wait();
        engine.stop().wait();
        assert!(!engine.is_searching());
    }
}
