/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::io::{self, BufRead, Write};

use anyhow::Result;
use arbiter::{
    Board, Cli, Controller, EngineColor, GreedyEngine, ReplCommand, TextDisplay, ViewHandle,
};
use clap::Parser;
use shakmaty::{CastlingMode, Role};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} encountered an error: {e}", env!("CARGO_PKG_NAME"));
    }
}

fn run(cli: Cli) -> Result<()> {
    let board = match &cli.fen {
        Some(fen) => Board::from_fen(fen)?,
        None => Board::new(),
    };

    let (display, view) = TextDisplay::new();

    let mut builder = Controller::builder()
        .board(board)
        .display(display)
        .on_move(|mv| println!("played: {}", mv.to_uci(CastlingMode::Standard)))
        .on_game_over(|outcome| println!("game over: {outcome}"))
        .on_promotion(prompt_promotion);

    if cli.engine != EngineColor::None {
        builder = builder.engine(GreedyEngine::new(cli.engine));
    }

    let mut controller = builder.build();
    controller.init()?;
    pump(&mut controller)?;
    view.render();

    repl(&mut controller, &view)
}

/// Reads commands until EOF or `exit`.
fn repl(controller: &mut Controller, view: &ViewHandle) -> Result<()> {
    let stdin = io::stdin();
    let mut buffer = String::with_capacity(256);

    loop {
        print!("> ");
        io::stdout().flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            return Ok(());
        }

        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }

        let command = match line.parse::<ReplCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        // Keep running, even on error
        match execute(controller, view, command) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

/// Executes a single command, returning `false` when it is time to quit.
fn execute(controller: &mut Controller, view: &ViewHandle, command: ReplCommand) -> Result<bool> {
    match command {
        ReplCommand::Display => view.render(),

        ReplCommand::Fen => println!("{}", controller.fen()),

        ReplCommand::Move { mv } => {
            controller.push_uci(&mv)?;
            pump(controller)?;
            view.render();
        }

        ReplCommand::San { mv } => {
            controller.push_san(&mv)?;
            pump(controller)?;
            view.render();
        }

        ReplCommand::Drag { from, to } => {
            controller.user_move(&from, &to)?;
            pump(controller)?;
            view.render();
        }

        ReplCommand::Moves { square } => {
            let moves = match square {
                Some(name) => controller.board().legal_moves_from(name.parse()?),
                None => controller.board().legal_moves().iter().cloned().collect(),
            };

            let moves_string = if moves.is_empty() {
                String::from("(none)")
            } else {
                moves
                    .into_iter()
                    .map(|mv| mv.to_uci(CastlingMode::Standard).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!("{moves_string}");
        }

        ReplCommand::Load { fen } => {
            controller.set_fen(&fen.join(" "))?;
            pump(controller)?;
            view.render();
        }

        ReplCommand::New => {
            controller.reset()?;
            pump(controller)?;
            view.render();
        }

        ReplCommand::Undo => {
            if controller.pop().is_none() {
                println!("nothing to undo");
            }
            view.render();
        }

        ReplCommand::Flip => {
            controller.toggle_orientation();
            view.render();
        }

        ReplCommand::Go => {
            controller.play_engine_move()?;
            pump(controller)?;
            view.render();
        }

        ReplCommand::Exit => return Ok(false),
    }

    Ok(true)
}

/// Collects engine replies until no search is outstanding.
///
/// With an engine playing both sides this plays the game out to the end.
fn pump(controller: &mut Controller) -> Result<()> {
    while let Some(mv) = controller.await_engine()? {
        println!("engine: {}", mv.to_uci(CastlingMode::Standard));
    }
    Ok(())
}

/// Asks on stdin which piece a pawn should promote to.
fn prompt_promotion(square: shakmaty::Square) -> Role {
    println!("pawn promotes on {square}: [q]ueen, [r]ook, [b]ishop, k[n]ight?");

    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return Role::Queen;
    }

    match line.trim() {
        "r" => Role::Rook,
        "b" => Role::Bishop,
        "n" => Role::Knight,
        _ => Role::Queen,
    }
}
