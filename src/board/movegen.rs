/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{
    in_check, is_square_attacked, move_flags, Move, MoveList, PieceKind, Position, Square,
    DIAGONAL_DIRS, ORTHOGONAL_DIRS,
};

/// Appends a move if the destination is not occupied by a friendly piece,
/// setting the capture flag automatically for occupied destinations.
#[inline(always)]
fn push_move(pos: &Position, moves: &mut MoveList, from: Square, to: Square, flags: u8, promo: u8) {
    let dst = pos.board[to];
    if dst.is_color(pos.side) {
        return;
    }

    let flags = if dst.is_some() {
        flags | move_flags::CAPTURE
    } else {
        flags
    };

    moves.push(Move::new(from, to, flags, promo));
}

/// Appends all four promotions of a pawn move.
#[inline(always)]
fn push_promotions(pos: &Position, moves: &mut MoveList, from: Square, to: Square) {
    for promo in 1..=4 {
        push_move(pos, moves, from, to, move_flags::PROMOTION, promo);
    }
}

fn generate_pawn_moves(pos: &Position, moves: &mut MoveList, from: Square) {
    let us = pos.side;
    let push = us.pawn_push();
    let promo_rank = if us.is_white() { 6 } else { 1 };

    if let Some(one) = from.offset(push) {
        if pos.board[one].is_none() {
            if from.rank() == promo_rank {
                push_promotions(pos, moves, from, one);
            } else {
                push_move(pos, moves, from, one, 0, 0);
            }

            if from.rank() == us.pawn_rank() {
                if let Some(two) = one.offset(push) {
                    if pos.board[two].is_none() {
                        push_move(pos, moves, from, two, 0, 0);
                    }
                }
            }
        }
    }

    // Diagonal captures, guarding against file wraps.
    for side_step in [-1i8, 1] {
        if (from.file() == 0 && side_step < 0) || (from.file() == 7 && side_step > 0) {
            continue;
        }
        let Some(to) = from.offset(push + side_step) else {
            continue;
        };

        if pos.board[to].is_enemy_of(us) {
            if from.rank() == promo_rank {
                push_promotions(pos, moves, from, to);
            } else {
                push_move(pos, moves, from, to, 0, 0);
            }
        } else if Some(to) == pos.ep_square {
            moves.push(Move::new(from, to, move_flags::EN_PASSANT, 0));
        }
    }
}

fn generate_leaper_moves(
    pos: &Position,
    moves: &mut MoveList,
    from: Square,
    steps: &[(i8, i8)],
) {
    let f = from.file() as i8;
    let r = from.rank() as i8;

    for &(df, dr) in steps {
        let (nf, nr) = (f + df, r + dr);
        if (0..8).contains(&nf) && (0..8).contains(&nr) {
            push_move(pos, moves, from, Square::new(nf as u8, nr as u8), 0, 0);
        }
    }
}

fn generate_slider_moves(
    pos: &Position,
    moves: &mut MoveList,
    from: Square,
    dirs: &[(i8, i8)],
) {
    let f = from.file() as i8;
    let r = from.rank() as i8;

    for &(df, dr) in dirs {
        let (mut nf, mut nr) = (f + df, r + dr);
        while (0..8).contains(&nf) && (0..8).contains(&nr) {
            let to = Square::new(nf as u8, nr as u8);
            let dst = pos.board[to];

            if dst.is_none() {
                push_move(pos, moves, from, to, 0, 0);
            } else {
                if dst.is_enemy_of(pos.side) {
                    push_move(pos, moves, from, to, 0, 0);
                }
                break;
            }

            nf += df;
            nr += dr;
        }
    }
}

/// Appends castling moves whose right bit is set and whose path between king
/// and rook is empty.
///
/// Whether the king crosses an attacked square is deliberately *not* checked
/// here; that is [`legal_castle_path_ok`]'s concern.
fn generate_castling_moves(pos: &Position, moves: &mut MoveList, from: Square) {
    use super::CastlingRights as Cr;

    let empty = |sq: Square| pos.board[sq].is_none();

    if pos.side.is_white() && from == Square::E1 {
        if pos.castling.contains(Cr::WHITE_KINGSIDE) && empty(Square::F1) && empty(Square::G1) {
            moves.push(Move::new(Square::E1, Square::G1, move_flags::CASTLE, 0));
        }
        if pos.castling.contains(Cr::WHITE_QUEENSIDE)
            && empty(Square::D1)
            && empty(Square::C1)
            && empty(Square::B1)
        {
            moves.push(Move::new(Square::E1, Square::C1, move_flags::CASTLE, 0));
        }
    } else if !pos.side.is_white() && from == Square::E8 {
        if pos.castling.contains(Cr::BLACK_KINGSIDE) && empty(Square::F8) && empty(Square::G8) {
            moves.push(Move::new(Square::E8, Square::G8, move_flags::CASTLE, 0));
        }
        if pos.castling.contains(Cr::BLACK_QUEENSIDE)
            && empty(Square::D8)
            && empty(Square::C8)
            && empty(Square::B8)
        {
            moves.push(Move::new(Square::E8, Square::C8, move_flags::CASTLE, 0));
        }
    }
}

/// Generates every pseudo-legal move for the side to move.
///
/// Moves that leave the mover's king in check are included; deep search
/// filters them with a per-move make/test/unmake instead of paying for full
/// legal generation at every node.
pub fn generate_pseudo_legal(pos: &Position) -> MoveList {
    const KNIGHT_STEPS: [(i8, i8); 8] = [
        (1, 2),
        (2, 1),
        (2, -1),
        (1, -2),
        (-1, -2),
        (-2, -1),
        (-2, 1),
        (-1, 2),
    ];
    const KING_STEPS: [(i8, i8); 8] = [
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ];

    let mut moves = MoveList::new();

    for from in Square::iter() {
        let piece = pos.board[from];
        if !piece.is_color(pos.side) {
            continue;
        }

        match piece.kind() {
            Some(PieceKind::Pawn) => generate_pawn_moves(pos, &mut moves, from),
            Some(PieceKind::Knight) => generate_leaper_moves(pos, &mut moves, from, &KNIGHT_STEPS),
            Some(PieceKind::Bishop) => generate_slider_moves(pos, &mut moves, from, &DIAGONAL_DIRS),
            Some(PieceKind::Rook) => generate_slider_moves(pos, &mut moves, from, &ORTHOGONAL_DIRS),
            Some(PieceKind::Queen) => {
                generate_slider_moves(pos, &mut moves, from, &DIAGONAL_DIRS);
                generate_slider_moves(pos, &mut moves, from, &ORTHOGONAL_DIRS);
            }
            Some(PieceKind::King) => {
                generate_leaper_moves(pos, &mut moves, from, &KING_STEPS);
                generate_castling_moves(pos, &mut moves, from);
            }
            None => {}
        }
    }

    moves
}

/// Returns `true` if a castling move does not start in, pass through, or
/// land in check.
pub fn legal_castle_path_ok(pos: &Position, mv: Move) -> bool {
    let us = pos.side;
    let them = us.opponent();

    if in_check(pos, us) {
        return false;
    }

    let crossed: &[Square] = match (mv.from(), mv.to()) {
        (Square::E1, Square::G1) => &[Square::F1, Square::G1],
        (Square::E1, Square::C1) => &[Square::D1, Square::C1],
        (Square::E8, Square::G8) => &[Square::F8, Square::G8],
        (Square::E8, Square::C8) => &[Square::D8, Square::C8],
        _ => &[],
    };

    crossed
        .iter()
        .all(|&sq| !is_square_attacked(pos, sq, them))
}

/// Generates every strictly legal move for the side to move.
///
/// Each pseudo-legal move is made, tested for leaving the mover in check,
/// and unmade; castling additionally passes the attacked-path check. Used at
/// the root and wherever a move from outside the generator must be verified.
pub fn generate_legal(pos: &mut Position) -> MoveList {
    let pseudo = generate_pseudo_legal(pos);
    let mut legal = MoveList::new();
    let us = pos.side;

    for mv in pseudo {
        if mv.is_castle() && !legal_castle_path_ok(pos, mv) {
            continue;
        }

        let undo = pos.do_move(mv);
        if !in_check(pos, us) {
            legal.push(mv);
        }
        pos.undo_move(mv, &undo);
    }

    legal
}

/// Returns `true` if `mv` is legal in this position.
#[inline(always)]
pub fn is_legal(pos: &mut Position, mv: Move) -> bool {
    generate_legal(pos).contains(&mv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, FEN_STARTPOS};

    #[test]
    fn test_startpos_move_counts() {
        let mut pos = Position::from_fen(FEN_STARTPOS);
        assert_eq!(generate_pseudo_legal(&pos).len(), 20);
        assert_eq!(generate_legal(&mut pos).len(), 20);
    }

    #[test]
    fn test_legal_is_filtered_pseudo_legal() {
        let fens = [
            crate::FEN_KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2",
        ];

        for fen in fens {
            let mut pos = Position::from_fen(fen);
            let us = pos.side_to_move();
            let legal = generate_legal(&mut pos);

            for mv in generate_pseudo_legal(&pos.clone()) {
                let path_ok = !mv.is_castle() || legal_castle_path_ok(&pos, mv);
                let undo = pos.do_move(mv);
                let keeps_king_safe = !in_check(&pos, us);
                pos.undo_move(mv, &undo);

                assert_eq!(
                    legal.contains(&mv),
                    keeps_king_safe && path_ok,
                    "legality mismatch for {mv} on {fen}"
                );
            }
        }
    }

    #[test]
    fn test_castling_emitted_for_both_sides() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let legal = generate_legal(&mut pos);
        assert!(legal.iter().any(|&m| m == "e1g1"));
        assert!(legal.iter().any(|&m| m == "e1c1"));

        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1");
        let legal = generate_legal(&mut pos);
        assert!(legal.iter().any(|&m| m == "e8g8"));
        assert!(legal.iter().any(|&m| m == "e8c8"));
    }

    #[test]
    fn test_castling_rejected_through_attacked_squares() {
        // The rook on e2 checks the king, so neither castle is legal, but
        // ordinary king moves remain.
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/4r3/R3K2R w KQkq - 0 1");
        let legal = generate_legal(&mut pos);

        assert!(!legal.iter().any(|&m| m == "e1g1"));
        assert!(!legal.iter().any(|&m| m == "e1c1"));
        assert!(legal.iter().any(|&m| m == "e1d1") || legal.iter().any(|&m| m == "e1f1"));
    }

    #[test]
    fn test_stalemate_has_no_legal_moves() {
        let mut pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");
        assert!(generate_legal(&mut pos).is_empty());
        assert!(!in_check(&pos, Color::Black));
    }

    #[test]
    fn test_promotions_fan_out() {
        let mut pos = Position::from_fen("8/P7/8/8/8/8/k6K/8 w - - 0 1");
        let legal = generate_legal(&mut pos);
        let promotions = legal.iter().filter(|m| m.is_promotion()).count();
        assert_eq!(promotions, 4);
    }
}
