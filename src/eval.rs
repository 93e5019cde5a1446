/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use shakmaty::{Chess, Position, Role, Square};

/// Value of a piece, in centipawns.
pub(crate) const fn value_of(role: Role) -> i32 {
    match role {
        Role::Pawn => 100,
        Role::Knight => 320,
        Role::Bishop => 330,
        Role::Rook => 500,
        Role::Queen => 900,
        // A king can't be traded, so it has no material value
        Role::King => 0,
    }
}

/// Material balance of `position` from the side-to-move's perspective.
///
/// A positive number means the side to move is ahead on material.
pub(crate) fn material(position: &Chess) -> i32 {
    let us = position.turn();
    let mut balance = 0;

    for square in Square::ALL {
        if let Some(piece) = position.board().piece_at(square) {
            if piece.color == us {
                balance += value_of(piece.role);
            } else {
                balance -= value_of(piece.role);
            }
        }
    }

    balance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Board;

    #[test]
    fn starting_position_is_balanced() {
        assert_eq!(material(Board::new().position()), 0);
    }

    #[test]
    fn material_is_relative_to_the_side_to_move() {
        // White is up a queen; black to move
        let board = Board::from_fen("4k3/8/8/8/8/8/8/Q3K3 b - - 0 1").unwrap();
        assert_eq!(material(board.position()), -value_of(Role::Queen));
    }
}
