/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Attack queries: attackers-to-square, square-attacked, in-check.
mod attacks;

/// Pseudo-legal and legal move generation.
mod movegen;

/// Packed 32-bit move encoding.
mod moves;

/// Leaf-counting for move generator validation.
mod perft;

/// Colors, piece kinds, and the packed piece encoding.
mod piece;

/// Position state and make/unmake with incremental hashing.
mod position;

/// Pseudo-random number generation for hash keys.
mod prng;

/// Squares on a chessboard.
mod square;

/// Zobrist hashing.
mod zobrist;

pub use attacks::*;
pub use movegen::*;
pub use moves::*;
pub use perft::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use zobrist::*;
