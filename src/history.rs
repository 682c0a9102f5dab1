/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{tune, Color, Move, Square, MAX_PLY};

/// Per-color from/to scores for quiet moves that caused beta cutoffs.
///
/// Used to order quiet moves and to steer late move reductions.
pub struct HistoryTable(Box<[[[i32; Square::COUNT]; Square::COUNT]; Color::COUNT]>);

impl HistoryTable {
    /// The score for moving from `mv.from()` to `mv.to()` as `color`.
    #[inline(always)]
    pub fn get(&self, color: Color, mv: Move) -> i32 {
        self.0[color.index()][mv.from().index()][mv.to().index()]
    }

    /// Applies a (possibly negative) bonus with the history gravity formula:
    /// the closer the entry is to saturation, the less a new bonus moves it.
    #[inline(always)]
    pub fn update(&mut self, color: Color, mv: Move, bonus: i32) {
        let max = tune::max_history_bonus!();
        let clamped = bonus.clamp(-max, max);

        let entry = &mut self.0[color.index()][mv.from().index()][mv.to().index()];
        *entry += clamped - *entry * clamped.abs() / max;
    }

    /// Forgets all recorded scores.
    pub fn clear(&mut self) {
        self.0.iter_mut().flatten().flatten().for_each(|v| *v = 0);
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self(Box::new([[[0; Square::COUNT]; Square::COUNT]; Color::COUNT]))
    }
}

/// Two quiet moves per ply that most recently caused a beta cutoff there.
pub struct KillerTable([[Move; 2]; MAX_PLY]);

impl KillerTable {
    /// The primary killer at `ply`.
    #[inline(always)]
    pub fn first(&self, ply: i32) -> Move {
        self.0[Self::clamp(ply)][0]
    }

    /// The secondary killer at `ply`.
    #[inline(always)]
    pub fn second(&self, ply: i32) -> Move {
        self.0[Self::clamp(ply)][1]
    }

    /// Records a cutoff move, demoting the previous primary killer.
    #[inline(always)]
    pub fn insert(&mut self, ply: i32, mv: Move) {
        let slot = &mut self.0[Self::clamp(ply)];
        if slot[0] != mv {
            slot[1] = slot[0];
            slot[0] = mv;
        }
    }

    /// Forgets all killers.
    pub fn clear(&mut self) {
        self.0 = [[Move::NULL; 2]; MAX_PLY];
    }

    #[inline(always)]
    fn clamp(ply: i32) -> usize {
        (ply.max(0) as usize).min(MAX_PLY - 1)
    }
}

impl Default for KillerTable {
    fn default() -> Self {
        Self([[Move::NULL; 2]; MAX_PLY])
    }
}

/// The refutation most recently found against each opponent from/to pair.
pub struct CountermoveTable(Box<[[Move; Square::COUNT]; Square::COUNT]>);

impl CountermoveTable {
    /// The stored refutation of the move `prev_from -> prev_to`, if any.
    #[inline(always)]
    pub fn get(&self, prev: (Square, Square)) -> Move {
        self.0[prev.0.index()][prev.1.index()]
    }

    /// Records `mv` as the refutation of `prev`.
    #[inline(always)]
    pub fn insert(&mut self, prev: (Square, Square), mv: Move) {
        self.0[prev.0.index()][prev.1.index()] = mv;
    }

    /// Forgets all refutations.
    pub fn clear(&mut self) {
        self.0.iter_mut().flatten().for_each(|m| *m = Move::NULL);
    }
}

impl Default for CountermoveTable {
    fn default() -> Self {
        Self(Box::new([[Move::NULL; Square::COUNT]; Square::COUNT]))
    }
}

/// Continuation history: quiet-move scores indexed by the previous move's
/// from/to pair as well as the current move's.
///
/// The full `(color, prev_from, prev_to, from, to)` index makes this by far
/// the largest per-thread table, so it lives in one flat heap allocation.
pub struct ContinuationHistory(Box<[i16]>);

impl ContinuationHistory {
    const SIZE: usize =
        Color::COUNT * Square::COUNT * Square::COUNT * Square::COUNT * Square::COUNT;

    #[inline(always)]
    fn index(color: Color, prev: (Square, Square), mv: Move) -> usize {
        (((color.index() * Square::COUNT + prev.0.index()) * Square::COUNT + prev.1.index())
            * Square::COUNT
            + mv.from().index())
            * Square::COUNT
            + mv.to().index()
    }

    /// The continuation score of `mv` following `prev`, for `color`.
    #[inline(always)]
    pub fn get(&self, color: Color, prev: (Square, Square), mv: Move) -> i32 {
        self.0[Self::index(color, prev, mv)] as i32
    }

    /// Gravity-updates the continuation score of `mv` following `prev`.
    #[inline(always)]
    pub fn update(&mut self, color: Color, prev: (Square, Square), mv: Move, bonus: i32) {
        let max = tune::max_history_bonus!();
        let clamped = bonus.clamp(-max, max);

        let entry = &mut self.0[Self::index(color, prev, mv)];
        let current = *entry as i32;
        *entry = (current + clamped - current * clamped.abs() / max) as i16;
    }

    /// Forgets all continuation scores.
    pub fn clear(&mut self) {
        self.0.fill(0);
    }
}

impl Default for ContinuationHistory {
    fn default() -> Self {
        Self(vec![0; Self::SIZE].into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(from: Square, to: Square) -> Move {
        Move::new(from, to, 0, 0)
    }

    #[test]
    fn test_history_gravity_saturates() {
        let mut history = HistoryTable::default();
        let quiet = mv(Square::G1, Square::F3);

        for _ in 0..1000 {
            history.update(Color::White, quiet, 500);
        }

        let score = history.get(Color::White, quiet);
        assert!(score > 0);
        assert!(score <= tune::max_history_bonus!());

        // The other color's entry is untouched.
        assert_eq!(history.get(Color::Black, quiet), 0);
    }

    #[test]
    fn test_history_penalty_pulls_down() {
        let mut history = HistoryTable::default();
        let quiet = mv(Square::E2, Square::E4);

        history.update(Color::White, quiet, 1000);
        let high = history.get(Color::White, quiet);
        history.update(Color::White, quiet, -1000);
        assert!(history.get(Color::White, quiet) < high);
    }

    #[test]
    fn test_killers_demote() {
        let mut killers = KillerTable::default();
        let a = mv(Square::B1, Square::C3);
        let b = mv(Square::G1, Square::F3);

        killers.insert(4, a);
        killers.insert(4, b);
        assert_eq!(killers.first(4), b);
        assert_eq!(killers.second(4), a);

        // Reinserting the primary is a no-op.
        killers.insert(4, b);
        assert_eq!(killers.second(4), a);
    }

    #[test]
    fn test_countermove_roundtrip() {
        let mut counters = CountermoveTable::default();
        let prev = (Square::E7, Square::E5);
        let refutation = mv(Square::G1, Square::F3);

        counters.insert(prev, refutation);
        assert_eq!(counters.get(prev), refutation);
        assert!(counters.get((Square::A1, Square::A2)).is_null());
    }

    #[test]
    fn test_continuation_history_is_keyed_by_prev() {
        let mut cont = ContinuationHistory::default();
        let prev_a = (Square::E7, Square::E5);
        let prev_b = (Square::D7, Square::D5);
        let quiet = mv(Square::G1, Square::F3);

        cont.update(Color::White, prev_a, quiet, 800);
        assert!(cont.get(Color::White, prev_a, quiet) > 0);
        assert_eq!(cont.get(Color::White, prev_b, quiet), 0);
    }
}
