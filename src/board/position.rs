/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use super::{Color, Move, Piece, PieceKind, Square, ZobristKey};
use crate::FEN_STARTPOS;

/// The castling rights of both players, as a 4-bit mask.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct CastlingRights(u8);

impl CastlingRights {
    /// White may castle king-side.
    pub const WHITE_KINGSIDE: Self = Self(1 << 0);

    /// White may castle queen-side.
    pub const WHITE_QUEENSIDE: Self = Self(1 << 1);

    /// Black may castle king-side.
    pub const BLACK_KINGSIDE: Self = Self(1 << 2);

    /// Black may castle queen-side.
    pub const BLACK_QUEENSIDE: Self = Self(1 << 3);

    /// No castling available for either side.
    pub const NONE: Self = Self(0);

    /// All four castling rights.
    pub const ALL: Self = Self(15);

    /// The raw 4-bit mask, for Zobrist hashing.
    #[inline(always)]
    pub const fn mask(self) -> u8 {
        self.0
    }

    /// Returns `true` if every right in `rights` is present.
    #[inline(always)]
    pub const fn contains(self, rights: Self) -> bool {
        self.0 & rights.0 == rights.0
    }

    /// Removes both rights of `color`, as when its king moves.
    #[inline(always)]
    pub fn remove_for_king(&mut self, color: Color) {
        match color {
            Color::White => self.0 &= !(Self::WHITE_KINGSIDE.0 | Self::WHITE_QUEENSIDE.0),
            Color::Black => self.0 &= !(Self::BLACK_KINGSIDE.0 | Self::BLACK_QUEENSIDE.0),
        }
    }

    /// Removes the right tied to a rook's home square, as when that rook
    /// moves away or is captured there.
    #[inline(always)]
    pub fn remove_for_rook_square(&mut self, square: Square) {
        match square {
            Square::H1 => self.0 &= !Self::WHITE_KINGSIDE.0,
            Square::A1 => self.0 &= !Self::WHITE_QUEENSIDE.0,
            Square::H8 => self.0 &= !Self::BLACK_KINGSIDE.0,
            Square::A8 => self.0 &= !Self::BLACK_QUEENSIDE.0,
            _ => {}
        }
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (right, c) in [
            (Self::WHITE_KINGSIDE, 'K'),
            (Self::WHITE_QUEENSIDE, 'Q'),
            (Self::BLACK_KINGSIDE, 'k'),
            (Self::BLACK_QUEENSIDE, 'q'),
        ] {
            if self.contains(right) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Snapshot of everything needed to undo a move exactly.
///
/// Created by [`Position::do_move`], consumed by [`Position::undo_move`].
#[derive(Clone, Copy, Debug)]
pub struct Undo {
    /// The piece that moved.
    pub moved: Piece,

    /// The piece captured by the move, if any (the pawn itself for EP).
    pub captured: Piece,

    prev_side: Color,
    prev_rights: CastlingRights,
    prev_ep: Option<Square>,
    prev_halfmove: u32,
    prev_fullmove: u32,
    prev_key: ZobristKey,

    /// Square the en-passant-captured pawn stood on, if this was an EP capture.
    ep_captured: Option<Square>,

    /// Rook origin and destination if this was a castle.
    rook_move: Option<(Square, Square)>,
}

/// Snapshot for undoing a null move (side swap with en passant cleared).
#[derive(Clone, Copy, Debug)]
pub struct NullUndo {
    prev_side: Color,
    prev_ep: Option<Square>,
    prev_key: ZobristKey,
}

/// The complete state of a game of chess.
///
/// A mailbox board of 64 [`Piece`]s plus side to move, castling rights,
/// en passant square, the two move clocks, and an incrementally-maintained
/// [`ZobristKey`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub(crate) board: [Piece; Square::COUNT],
    pub(crate) side: Color,
    pub(crate) castling: CastlingRights,
    pub(crate) ep_square: Option<Square>,
    pub(crate) halfmove: u32,
    pub(crate) fullmove: u32,
    pub(crate) key: ZobristKey,
}

impl Position {
    /// Creates an empty [`Position`]: no pieces, White to move, no rights.
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            board: [Piece::NONE; Square::COUNT],
            side: Color::White,
            castling: CastlingRights::NONE,
            ep_square: None,
            halfmove: 0,
            fullmove: 1,
            key: ZobristKey::EMPTY,
        }
    }

    /// Creates a [`Position`] with the standard initial placement.
    #[inline(always)]
    pub fn startpos() -> Self {
        let mut pos = Self::new();
        pos.set_startpos();
        pos
    }

    /// Creates a [`Position`] from a FEN string.
    ///
    /// Parsing is tolerant: unknown characters are skipped and missing or
    /// invalid fields fall back to their defaults, so the result is always
    /// a usable position.
    #[inline(always)]
    pub fn from_fen(fen: &str) -> Self {
        let mut pos = Self::new();
        pos.set_fen(fen);
        pos
    }

    /// Resets this position to the standard initial placement.
    pub fn set_startpos(&mut self) {
        self.set_fen(FEN_STARTPOS);
    }

    /// Loads a FEN string into this position.
    ///
    /// Field order: placements, side, castling, en passant, halfmove,
    /// fullmove. An empty placements field resets to the starting position;
    /// unknown placement characters skip a square; any other malformed field
    /// falls back to its default. The resulting position is always valid and
    /// its key always matches a full recomputation.
    pub fn set_fen(&mut self, fen: &str) {
        *self = Self::new();
        let mut fields = fen.split_whitespace();

        let Some(placements) = fields.next() else {
            // There is no way to build a board from nothing; start over.
            *self = Self::from_fen(FEN_STARTPOS);
            return;
        };

        // Placements run from a8 to h1, ranks separated by '/'.
        let mut sq = 56i32;
        for c in placements.chars() {
            if c == '/' {
                sq -= 16;
                continue;
            }
            if let Some(d) = c.to_digit(10) {
                sq += d as i32;
                continue;
            }
            if (0..64).contains(&sq) {
                if let Some(piece) = Piece::from_char(c) {
                    self.board[sq as usize] = piece;
                }
            }
            sq += 1;
        }

        self.side = match fields.next() {
            Some("b") => Color::Black,
            _ => Color::White,
        };

        if let Some(castling) = fields.next() {
            for c in castling.chars() {
                match c {
                    'K' => self.castling.0 |= CastlingRights::WHITE_KINGSIDE.0,
                    'Q' => self.castling.0 |= CastlingRights::WHITE_QUEENSIDE.0,
                    'k' => self.castling.0 |= CastlingRights::BLACK_KINGSIDE.0,
                    'q' => self.castling.0 |= CastlingRights::BLACK_QUEENSIDE.0,
                    _ => {}
                }
            }
        }

        self.ep_square = fields
            .next()
            .and_then(|ep| Square::from_uci(ep).ok());

        self.halfmove = fields
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        self.fullmove = fields
            .next()
            .and_then(|s| s.parse().ok())
            .filter(|&n| n > 0)
            .unwrap_or(1);

        self.key = self.recompute_key();
    }

    /// Generates the FEN string of this position.
    pub fn to_fen(&self) -> String {
        format!("{self}")
    }

    /// The player whose turn it is.
    #[inline(always)]
    pub const fn side_to_move(&self) -> Color {
        self.side
    }

    /// The castling rights of both players.
    #[inline(always)]
    pub const fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    /// The en passant target square, if the last move was a double push.
    #[inline(always)]
    pub const fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    /// The halfmove clock, for the fifty-move rule.
    #[inline(always)]
    pub const fn halfmove(&self) -> u32 {
        self.halfmove
    }

    /// The fullmove number; increments after each of Black's moves.
    #[inline(always)]
    pub const fn fullmove(&self) -> u32 {
        self.fullmove
    }

    /// The incrementally-maintained Zobrist key of this position.
    #[inline(always)]
    pub const fn key(&self) -> ZobristKey {
        self.key
    }

    /// The piece on `square`, if any.
    #[inline(always)]
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        let piece = self.board[square];
        piece.is_some().then_some(piece)
    }

    /// The raw board array.
    #[inline(always)]
    pub const fn board(&self) -> &[Piece; Square::COUNT] {
        &self.board
    }

    /// Places `piece` on `square`, keeping the key in sync.
    #[inline(always)]
    pub fn place(&mut self, piece: Piece, square: Square) {
        self.key.hash_piece(self.board[square], square);
        self.board[square] = piece;
        self.key.hash_piece(piece, square);
    }

    /// The square of `color`'s king, or `None` on a malformed board.
    #[inline(always)]
    pub fn king_square(&self, color: Color) -> Option<Square> {
        let king = Piece::new(color, PieceKind::King);
        Square::iter().find(|&sq| self.board[sq] == king)
    }

    /// Returns `true` if `mv` captures a piece in this position (including
    /// en passant, which leaves its destination square empty).
    #[inline(always)]
    pub fn is_capture(&self, mv: Move) -> bool {
        mv.is_en_passant() || self.board[mv.to()].is_some()
    }

    /// Returns `true` if `color` has at least one piece besides pawns and
    /// its king. Null-move pruning is unsound without this.
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        self.board.iter().any(|&p| {
            p.is_color(color)
                && !p.is_kind(PieceKind::Pawn)
                && !p.is_kind(PieceKind::King)
        })
    }

    /// Copies `self` and returns the position after `mv` has been made.
    #[inline(always)]
    pub fn with_move_made(&self, mv: Move) -> Self {
        let mut copied = *self;
        copied.do_move(mv);
        copied
    }

    /// Recomputes the Zobrist key from scratch.
    ///
    /// Used at construction and for validating the incremental updates.
    pub fn recompute_key(&self) -> ZobristKey {
        let mut key = ZobristKey::EMPTY;
        for sq in Square::iter() {
            key.hash_piece(self.board[sq], sq);
        }
        if self.side == Color::Black {
            key.hash_side_to_move();
        }
        key.hash_castling_rights(self.castling.mask());
        if let Some(ep) = self.ep_square {
            key.hash_ep_file(ep.file());
        }
        key
    }

    /// Applies a well-formed pseudo-legal move, returning the [`Undo`]
    /// record that restores the prior state exactly.
    ///
    /// Legality (not leaving the mover in check) is the caller's concern;
    /// moves must come from the generator.
    pub fn do_move(&mut self, mv: Move) -> Undo {
        let from = mv.from();
        let to = mv.to();
        let us = self.side;
        let moved = self.board[from];

        let mut undo = Undo {
            moved,
            captured: self.board[to],
            prev_side: us,
            prev_rights: self.castling,
            prev_ep: self.ep_square,
            prev_halfmove: self.halfmove,
            prev_fullmove: self.fullmove,
            prev_key: self.key,
            ep_captured: None,
            rook_move: None,
        };

        let moved_kind = moved.kind();

        // En passant rights last exactly one ply.
        self.ep_square = None;

        let is_capture = undo.captured.is_some() || mv.is_en_passant();
        if moved_kind == Some(PieceKind::Pawn) || is_capture {
            self.halfmove = 0;
        } else {
            self.halfmove += 1;
        }

        match moved_kind {
            Some(PieceKind::King) => self.castling.remove_for_king(us),
            Some(PieceKind::Rook) => self.castling.remove_for_rook_square(from),
            _ => {}
        }

        // A rook captured at home forfeits the opponent's right on that wing.
        if undo.captured.is_kind(PieceKind::Rook) {
            self.castling.remove_for_rook_square(to);
        }

        if mv.is_en_passant() {
            // The captured pawn sits behind the destination square.
            let cap_sq = Square::from_index(
                (to.index() as i32 - us.pawn_push() as i32) as usize,
            );
            undo.ep_captured = Some(cap_sq);
            undo.captured = self.board[cap_sq];

            self.board[cap_sq] = Piece::NONE;
            self.board[to] = moved;
            self.board[from] = Piece::NONE;
        } else if mv.is_castle() {
            self.board[to] = moved;
            self.board[from] = Piece::NONE;

            undo.rook_move = match (from, to) {
                (Square::E1, Square::G1) => Some((Square::H1, Square::F1)),
                (Square::E1, Square::C1) => Some((Square::A1, Square::D1)),
                (Square::E8, Square::G8) => Some((Square::H8, Square::F8)),
                (Square::E8, Square::C8) => Some((Square::A8, Square::D8)),
                _ => None,
            };

            if let Some((rook_from, rook_to)) = undo.rook_move {
                self.board[rook_to] = self.board[rook_from];
                self.board[rook_from] = Piece::NONE;
            }
        } else {
            self.board[to] = moved;
            self.board[from] = Piece::NONE;

            if moved_kind == Some(PieceKind::Pawn) {
                if let Some(kind) = mv.promo_kind() {
                    self.board[to] = Piece::new(us, kind);
                }

                // A double push opens the square behind the pawn to EP.
                let rank_delta = to.rank() as i32 - from.rank() as i32;
                if rank_delta == 2 || rank_delta == -2 {
                    self.ep_square = Some(Square::from_index(
                        (from.index() as i32 + us.pawn_push() as i32) as usize,
                    ));
                }
            }
        }

        self.side = us.opponent();
        if us == Color::Black {
            self.fullmove += 1;
        }

        self.apply_key_delta(&undo, mv);

        undo
    }

    /// Restores the state prior to `do_move(mv)`.
    pub fn undo_move(&mut self, mv: Move, undo: &Undo) {
        let from = mv.from();
        let to = mv.to();

        self.castling = undo.prev_rights;
        self.ep_square = undo.prev_ep;
        self.halfmove = undo.prev_halfmove;
        self.fullmove = undo.prev_fullmove;
        self.side = undo.prev_side;
        self.key = undo.prev_key;

        if let Some((rook_from, rook_to)) = undo.rook_move {
            self.board[rook_from] = self.board[rook_to];
            self.board[rook_to] = Piece::NONE;
        }

        if let Some(cap_sq) = undo.ep_captured {
            // The EP destination square was empty before the move.
            self.board[from] = undo.moved;
            self.board[to] = Piece::NONE;
            self.board[cap_sq] = undo.captured;
            return;
        }

        self.board[from] = undo.moved;
        self.board[to] = undo.captured;
    }

    /// Passes the turn: swaps the side to move and clears en passant,
    /// keeping the key consistent.
    pub fn do_null_move(&mut self) -> NullUndo {
        let undo = NullUndo {
            prev_side: self.side,
            prev_ep: self.ep_square,
            prev_key: self.key,
        };

        if let Some(ep) = self.ep_square {
            self.key.hash_ep_file(ep.file());
        }
        self.key.hash_side_to_move();

        self.ep_square = None;
        self.side = self.side.opponent();

        undo
    }

    /// Restores the state prior to [`Position::do_null_move`].
    pub fn undo_null_move(&mut self, undo: &NullUndo) {
        self.side = undo.prev_side;
        self.ep_square = undo.prev_ep;
        self.key = undo.prev_key;
    }

    /// Incremental Zobrist update after `do_move` has mutated the board.
    ///
    /// Starts from the saved pre-move key so that undo can restore it
    /// directly.
    fn apply_key_delta(&mut self, undo: &Undo, mv: Move) {
        let mut key = undo.prev_key;

        if let Some(ep) = undo.prev_ep {
            key.hash_ep_file(ep.file());
        }
        if let Some(ep) = self.ep_square {
            key.hash_ep_file(ep.file());
        }

        key.hash_castling_rights(undo.prev_rights.mask());
        key.hash_castling_rights(self.castling.mask());

        key.hash_side_to_move();

        let from = mv.from();
        let to = mv.to();

        // Moved piece off its origin.
        key.hash_piece(undo.moved, from);

        // Captured piece off the board (EP captures land behind `to`).
        if let Some(cap_sq) = undo.ep_captured {
            key.hash_piece(undo.captured, cap_sq);
        } else {
            key.hash_piece(undo.captured, to);
        }

        // Whatever now stands on the destination (promotion-aware).
        key.hash_piece(self.board[to], to);

        // The castle rook's hop.
        if let Some((rook_from, rook_to)) = undo.rook_move {
            let rook = self.board[rook_to];
            key.hash_piece(rook, rook_from);
            key.hash_piece(rook, rook_to);
        }

        self.key = key;
    }
}

impl Default for Position {
    #[inline(always)]
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Display for Position {
    /// Formats this position as a FEN string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let piece = self.board[Square::new(file, rank)];
                if let Some(c) = piece.char() {
                    if empty > 0 {
                        write!(f, "{empty}")?;
                        empty = 0;
                    }
                    write!(f, "{c}")?;
                } else {
                    empty += 1;
                }
            }
            if empty > 0 {
                write!(f, "{empty}")?;
            }
            if rank > 0 {
                write!(f, "/")?;
            }
        }

        let side = if self.side.is_white() { 'w' } else { 'b' };
        write!(f, " {side} {} ", self.castling)?;

        match self.ep_square {
            Some(ep) => write!(f, "{ep}")?,
            None => write!(f, "-")?,
        }

        write!(f, " {} {}", self.halfmove, self.fullmove)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_pseudo_legal, FEN_KIWIPETE, FEN_STARTPOS};

    const ROUNDTRIP_FENS: [&str; 5] = [
        FEN_STARTPOS,
        FEN_KIWIPETE,
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2",
    ];

    #[test]
    fn test_fen_roundtrip() {
        for fen in ROUNDTRIP_FENS {
            assert_eq!(Position::from_fen(fen).to_fen(), fen);
        }
    }

    #[test]
    fn test_do_undo_restores_everything() {
        for fen in ROUNDTRIP_FENS {
            let mut pos = Position::from_fen(fen);
            let original = pos;

            for mv in generate_pseudo_legal(&pos) {
                let undo = pos.do_move(mv);
                pos.undo_move(mv, &undo);
                assert_eq!(pos, original, "do/undo of {mv} diverged on {fen}");
                assert_eq!(pos.key(), original.key(), "key of {mv} diverged on {fen}");
            }
        }
    }

    #[test]
    fn test_incremental_key_matches_recompute() {
        for fen in ROUNDTRIP_FENS {
            let mut pos = Position::from_fen(fen);

            for mv in generate_pseudo_legal(&pos.clone()) {
                let undo = pos.do_move(mv);
                assert_eq!(
                    pos.key(),
                    pos.recompute_key(),
                    "incremental key diverged after {mv} on {fen}"
                );
                pos.undo_move(mv, &undo);
            }
        }
    }

    #[test]
    fn test_ordinary_capture_on_ep_target_square() {
        // c5xd4 is a plain capture onto d4, not en passant.
        let mut pos =
            Position::from_fen("rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2");
        pos.do_move(Move::from_uci(&pos, "d2d4").unwrap());
        let capture = Move::from_uci(&pos, "c5d4").unwrap();
        assert!(!capture.is_en_passant());
        pos.do_move(capture);

        assert_eq!(
            pos.piece_at(Square::D4),
            Some(Piece::new(Color::Black, PieceKind::Pawn))
        );
        // Only the d4 pawn left the board; e4 is untouched.
        assert_eq!(
            pos.piece_at(Square::E4),
            Some(Piece::new(Color::White, PieceKind::Pawn))
        );
    }

    #[test]
    fn test_en_passant_removes_the_bypassing_pawn() {
        let mut pos =
            Position::from_fen("rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2");
        pos.do_move(Move::from_uci(&pos, "e4e5").unwrap());
        pos.do_move(Move::from_uci(&pos, "d7d5").unwrap());

        let ep = Move::from_uci(&pos, "e5d6").unwrap();
        assert!(ep.is_en_passant());
        pos.do_move(ep);

        assert_eq!(
            pos.piece_at(Square::D6),
            Some(Piece::new(Color::White, PieceKind::Pawn))
        );
        assert_eq!(pos.piece_at(Square::D5), None);
        assert_eq!(pos.piece_at(Square::E5), None);
    }

    #[test]
    fn test_castling_moves_rook_and_clears_rights() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let castle = Move::from_uci(&pos, "e1g1").unwrap();
        assert!(castle.is_castle());

        pos.do_move(castle);
        assert_eq!(
            pos.piece_at(Square::G1),
            Some(Piece::new(Color::White, PieceKind::King))
        );
        assert_eq!(
            pos.piece_at(Square::F1),
            Some(Piece::new(Color::White, PieceKind::Rook))
        );
        assert_eq!(pos.piece_at(Square::H1), None);
        assert!(!pos.castling_rights().contains(CastlingRights::WHITE_KINGSIDE));
        assert!(!pos.castling_rights().contains(CastlingRights::WHITE_QUEENSIDE));
        assert!(pos.castling_rights().contains(CastlingRights::BLACK_KINGSIDE));
    }

    #[test]
    fn test_rook_capture_clears_opponent_right() {
        let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let capture = Move::from_uci(&pos, "a1a8").unwrap();
        pos.do_move(capture);
        assert!(!pos.castling_rights().contains(CastlingRights::BLACK_QUEENSIDE));
        assert!(pos.castling_rights().contains(CastlingRights::BLACK_KINGSIDE));
    }

    #[test]
    fn test_clocks() {
        let mut pos = Position::startpos();
        pos.do_move(Move::from_uci(&pos, "g1f3").unwrap());
        assert_eq!(pos.halfmove(), 1);
        assert_eq!(pos.fullmove(), 1);

        pos.do_move(Move::from_uci(&pos, "g8f6").unwrap());
        assert_eq!(pos.halfmove(), 2);
        assert_eq!(pos.fullmove(), 2);

        pos.do_move(Move::from_uci(&pos, "e2e4").unwrap());
        assert_eq!(pos.halfmove(), 0, "pawn moves reset the halfmove clock");
    }

    #[test]
    fn test_null_move_roundtrip() {
        let mut pos = Position::from_fen(FEN_KIWIPETE);
        let original = pos;

        let undo = pos.do_null_move();
        assert_eq!(pos.side_to_move(), original.side_to_move().opponent());
        assert_eq!(pos.key(), pos.recompute_key());

        pos.undo_null_move(&undo);
        assert_eq!(pos, original);
    }

    #[test]
    fn test_malformed_fen_falls_back() {
        let pos = Position::from_fen("");
        assert_eq!(pos, Position::startpos());

        // Junk fields fall back to defaults but still yield a valid position.
        let pos = Position::from_fen("8/8/8/8/8/8/8/K6k x ?? zz aa bb");
        assert_eq!(pos.side_to_move(), Color::White);
        assert_eq!(pos.halfmove(), 0);
        assert_eq!(pos.fullmove(), 1);
        assert_eq!(pos.key(), pos.recompute_key());
    }
}
