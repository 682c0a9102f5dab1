/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// The color of a player or piece.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum Color {
    #[default]
    White = 0,
    Black = 1,
}

impl Color {
    /// Number of colors.
    pub const COUNT: usize = 2;

    /// Index of this color, for array lookups.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The other color.
    #[inline(always)]
    pub const fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Returns `true` if this color is [`Color::White`].
    #[inline(always)]
    pub const fn is_white(self) -> bool {
        matches!(self, Self::White)
    }

    /// `+1` for White, `-1` for Black; used when accumulating White-relative scores.
    #[inline(always)]
    pub const fn sign(self) -> i32 {
        match self {
            Self::White => 1,
            Self::Black => -1,
        }
    }

    /// The rank this color's pawns start on (0-based).
    #[inline(always)]
    pub const fn pawn_rank(self) -> u8 {
        match self {
            Self::White => 1,
            Self::Black => 6,
        }
    }

    /// The direction this color's pawns advance: `+8` for White, `-8` for Black.
    #[inline(always)]
    pub const fn pawn_push(self) -> i8 {
        match self {
            Self::White => 8,
            Self::Black => -8,
        }
    }
}

/// The kind of a chess piece, independent of its color.
///
/// Discriminants start at 1 so that the packed [`Piece`] encoding can use 0
/// for "no piece".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceKind {
    /// Number of piece kinds.
    pub const COUNT: usize = 6;

    /// Index of this kind, in 1..7; matches its discriminant.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// All piece kinds, in increasing value order.
    #[inline(always)]
    pub const fn all() -> [Self; Self::COUNT] {
        [
            Self::Pawn,
            Self::Knight,
            Self::Bishop,
            Self::Rook,
            Self::Queen,
            Self::King,
        ]
    }

    /// Constructs a [`PieceKind`] from an index in 1..7, if valid.
    #[inline(always)]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Pawn),
            2 => Some(Self::Knight),
            3 => Some(Self::Bishop),
            4 => Some(Self::Rook),
            5 => Some(Self::Queen),
            6 => Some(Self::King),
            _ => None,
        }
    }

    /// Lowercase UCI character for this kind.
    #[inline(always)]
    pub const fn char(self) -> char {
        match self {
            Self::Pawn => 'p',
            Self::Knight => 'n',
            Self::Bishop => 'b',
            Self::Rook => 'r',
            Self::Queen => 'q',
            Self::King => 'k',
        }
    }
}

/// A chess piece, packed as `color << 3 | kind`.
///
/// White pieces occupy 1..7 and Black pieces 9..15, leaving 0 free to mean
/// "no piece". The packed form indexes the 16-slot Zobrist piece table
/// directly.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// Number of distinct packed piece encodings (including unused slots).
    pub const COUNT: usize = 16;

    /// The "no piece" sentinel occupying empty board squares.
    pub const NONE: Self = Self(0);

    /// Constructs a [`Piece`] of the given color and kind.
    #[inline(always)]
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self(((color as u8) << 3) | kind as u8)
    }

    /// Returns `true` if this is the "no piece" sentinel.
    #[inline(always)]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this is an actual piece.
    #[inline(always)]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// The color of this piece.
    ///
    /// [`Piece::NONE`] has no color; White is returned by convention.
    #[inline(always)]
    pub const fn color(self) -> Color {
        if self.0 >= 8 {
            Color::Black
        } else {
            Color::White
        }
    }

    /// The kind of this piece, or `None` for the empty sentinel.
    #[inline(always)]
    pub const fn kind(self) -> Option<PieceKind> {
        PieceKind::from_index(self.0 & 7)
    }

    /// Returns `true` if this piece exists and has the given kind.
    #[inline(always)]
    pub const fn is_kind(self, kind: PieceKind) -> bool {
        self.0 & 7 == kind as u8
    }

    /// Returns `true` if this piece exists and belongs to `color`.
    #[inline(always)]
    pub const fn is_color(self, color: Color) -> bool {
        self.is_some() && (self.0 >= 8) == matches!(color, Color::Black)
    }

    /// Returns `true` if this piece exists and does *not* belong to `color`.
    #[inline(always)]
    pub const fn is_enemy_of(self, color: Color) -> bool {
        self.is_some() && (self.0 >= 8) != matches!(color, Color::Black)
    }

    /// Index into the 16-slot Zobrist piece table.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// FEN character of this piece, or `None` for the empty sentinel.
    pub const fn char(self) -> Option<char> {
        match self.kind() {
            Some(kind) => {
                let c = kind.char();
                if matches!(self.color(), Color::White) {
                    Some(c.to_ascii_uppercase())
                } else {
                    Some(c)
                }
            }
            None => None,
        }
    }

    /// Parses a FEN character into a [`Piece`], or `None` for unknown characters.
    pub const fn from_char(c: char) -> Option<Self> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some(Self::new(color, kind))
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char().unwrap_or('.'))
    }
}

impl fmt::Debug for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_encoding() {
        let wp = Piece::new(Color::White, PieceKind::Pawn);
        let bk = Piece::new(Color::Black, PieceKind::King);

        assert_eq!(wp.index(), 1);
        assert_eq!(bk.index(), 14);
        assert_eq!(wp.color(), Color::White);
        assert_eq!(bk.color(), Color::Black);
        assert_eq!(wp.kind(), Some(PieceKind::Pawn));
        assert_eq!(bk.kind(), Some(PieceKind::King));
        assert!(Piece::NONE.is_none());
        assert_eq!(Piece::NONE.kind(), None);
    }

    #[test]
    fn test_piece_chars() {
        assert_eq!(Piece::from_char('K').unwrap().char(), Some('K'));
        assert_eq!(Piece::from_char('q').unwrap().char(), Some('q'));
        assert_eq!(Piece::from_char('x'), None);
    }

    #[test]
    fn test_color_relations() {
        let wn = Piece::new(Color::White, PieceKind::Knight);
        assert!(wn.is_color(Color::White));
        assert!(wn.is_enemy_of(Color::Black));
        assert!(!Piece::NONE.is_color(Color::White));
        assert!(!Piece::NONE.is_enemy_of(Color::White));
    }
}
