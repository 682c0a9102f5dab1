/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{generate_legal, Position};

/// Counts the leaf nodes of the legal move tree at the given depth.
///
/// Perft is the standard tool for validating a move generator: the counts
/// from well-known positions are published and must match exactly.
pub fn perft(pos: &mut Position, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_legal(pos);

    // A depth-1 frame would count each child as 1; skip the recursion.
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for mv in moves {
        let undo = pos.do_move(mv);
        nodes += perft(pos, depth - 1);
        pos.undo_move(mv, &undo);
    }

    nodes
}

/// Like [`perft`], but prints the subtotal under each root move.
///
/// The per-move breakdown is the fastest way to localize a generator bug by
/// diffing against a known-good engine.
pub fn splitperft(pos: &mut Position, depth: usize) -> u64 {
    let mut total = 0;

    for mv in generate_legal(pos) {
        let undo = pos.do_move(mv);
        let nodes = if depth > 1 { perft(pos, depth - 1) } else { 1 };
        pos.undo_move(mv, &undo);

        println!("{mv}: {nodes}");
        total += nodes;
    }

    println!("\n{total}");
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_STARTPOS;

    #[test]
    fn test_perft_zero_and_one() {
        let mut pos = Position::from_fen(FEN_STARTPOS);
        assert_eq!(perft(&mut pos, 0), 1);
        assert_eq!(perft(&mut pos, 1), 20);
    }
}
