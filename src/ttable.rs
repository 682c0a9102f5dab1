/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, RwLock,
};

use crate::{Move, Score, ZobristKey};

/// Number of bytes in a megabyte.
const BYTES_PER_MB: usize = 1024 * 1024;

/// Number of store-guarding mutex stripes. Power of two.
const STRIPES: usize = 4096;

/// How a stored score bounds the true value of its position.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum Bound {
    /// The score is exact: it fell inside the search window.
    Exact = 0,

    /// The score failed low: the true value is at most this.
    Alpha = 1,

    /// The score failed high: the true value is at least this.
    Beta = 2,
}

impl Bound {
    /// Classifies a search result against the window it was searched with.
    #[inline(always)]
    pub fn classify(score: Score, original_alpha: Score, beta: Score) -> Self {
        if score <= original_alpha {
            Self::Alpha
        } else if score >= beta {
            Self::Beta
        } else {
            Self::Exact
        }
    }

    #[inline(always)]
    const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::Alpha,
            2 => Self::Beta,
            _ => Self::Exact,
        }
    }
}

/// A decoded transposition table entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TtHit {
    /// Best move found for this position, possibly null.
    pub mv: Move,

    /// Stored score, already converted to be relative to the probing ply.
    pub score: Score,

    /// Depth the entry was searched to.
    pub depth: i32,

    /// How `score` bounds the true value.
    pub bound: Bound,
}

/// One 16-byte slot: the entry data and the key xor-folded with it.
///
/// Publishing `key ^ data` alongside `data` means a probe can detect any
/// torn read: a key reassembled from mismatched halves will not equal the
/// probe key, so an entry is never observed with fields it was not written
/// with.
#[derive(Default)]
struct Slot {
    key_xor_data: AtomicU64,
    data: AtomicU64,
}

#[inline(always)]
fn pack(mv: Move, score: Score, depth: u8, bound: Bound) -> u64 {
    // Move in the low 32 bits, then score, depth, bound.
    let mv = u64::from(mv.raw());
    let score = u64::from(score.inner() as u16);
    mv | (score << 32) | (u64::from(depth) << 48) | ((bound as u64) << 56)
}

#[inline(always)]
fn unpack(data: u64) -> (Move, Score, u8, Bound) {
    let mv = Move::from_raw(data as u32);
    let score = Score::new((data >> 32) as u16 as i16);
    let depth = (data >> 48) as u8;
    let bound = Bound::from_bits((data >> 56) as u8);
    (mv, score, depth, bound)
}

/// A fixed-size, shared transposition table.
///
/// The entry count is the largest power of two fitting the configured size,
/// so indexing is a mask. Reads are lock-free copies of the two atomic words
/// of a slot; stores serialize through a striped mutex so the
/// depth-preferred replacement decision is consistent. The outer `RwLock`
/// only changes hands when the table is resized between searches.
pub struct TranspositionTable {
    slots: RwLock<Box<[Slot]>>,
    stripes: Vec<Mutex<()>>,
}

impl TranspositionTable {
    /// Default size of the table, in megabytes.
    pub const DEFAULT_SIZE_MB: usize = 16;

    /// Minimum size of the table, in megabytes.
    pub const MIN_SIZE_MB: usize = 1;

    /// Maximum size of the table, in megabytes.
    pub const MAX_SIZE_MB: usize = 1024;

    /// Creates a table of (at most) `mb` megabytes.
    pub fn new(mb: usize) -> Self {
        Self {
            slots: RwLock::new(Self::allocate(mb)),
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn allocate(mb: usize) -> Box<[Slot]> {
        let mb = mb.clamp(Self::MIN_SIZE_MB, Self::MAX_SIZE_MB);
        let wanted = mb * BYTES_PER_MB / size_of::<Slot>();

        // Largest power of two that still fits.
        let capacity = if wanted.is_power_of_two() {
            wanted
        } else {
            wanted.next_power_of_two() >> 1
        };

        (0..capacity.max(1)).map(|_| Slot::default()).collect()
    }

    /// Reallocates the table at a new size, dropping all entries.
    ///
    /// Must not be called while a search is running; the engine boundary
    /// enforces that.
    pub fn resize(&self, mb: usize) {
        let mut slots = self.slots.write().unwrap();
        *slots = Self::allocate(mb);
    }

    /// Clears all entries without changing the size.
    pub fn clear(&self) {
        let slots = self.slots.read().unwrap();
        for slot in slots.iter() {
            slot.key_xor_data.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
    }

    /// Number of entries the table can hold.
    pub fn capacity(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    #[inline(always)]
    fn stripe_index(key: ZobristKey) -> usize {
        let k = key.inner();
        ((k ^ (k >> 32)) as usize) & (STRIPES - 1)
    }

    /// Looks up `key`, returning a copy of the entry if present.
    ///
    /// Lock-free; mate scores come back adjusted to `ply`.
    pub fn probe(&self, key: ZobristKey, ply: i32) -> Option<TtHit> {
        let slots = self.slots.read().unwrap();
        let slot = &slots[key.inner() as usize & (slots.len() - 1)];

        let key_xor_data = slot.key_xor_data.load(Ordering::Relaxed);
        let data = slot.data.load(Ordering::Relaxed);
        if key_xor_data == 0 && data == 0 {
            return None;
        }
        if key_xor_data ^ data != key.inner() {
            return None;
        }

        let (mv, score, depth, bound) = unpack(data);
        Some(TtHit {
            mv,
            score: score.from_tt(ply),
            depth: depth as i32,
            bound,
        })
    }

    /// Stores an entry for `key`.
    ///
    /// Replaces unconditionally on a key mismatch, and otherwise only when
    /// the new entry is at least as deep. Mate scores are made
    /// root-relative before packing.
    pub fn store(&self, key: ZobristKey, mv: Move, score: Score, depth: i32, bound: Bound, ply: i32) {
        let slots = self.slots.read().unwrap();
        let slot = &slots[key.inner() as usize & (slots.len() - 1)];

        let depth = depth.clamp(0, u8::MAX as i32) as u8;
        let data = pack(mv, score.into_tt(ply), depth, bound);

        let _guard = self.stripes[Self::stripe_index(key)].lock().unwrap();

        let cur_key_xor = slot.key_xor_data.load(Ordering::Relaxed);
        let cur_data = slot.data.load(Ordering::Relaxed);
        let cur_key = cur_key_xor ^ cur_data;
        let (_, _, cur_depth, _) = unpack(cur_data);

        let occupied = cur_key_xor != 0 || cur_data != 0;
        if occupied && cur_key == key.inner() && depth < cur_depth {
            return;
        }

        slot.data.store(data, Ordering::Relaxed);
        slot.key_xor_data.store(key.inner() ^ data, Ordering::Relaxed);
    }

    /// Approximate table occupancy in permille, by sampling a fixed prefix.
    pub fn hashfull(&self) -> usize {
        let slots = self.slots.read().unwrap();
        let sample = slots.len().min(1 << 15);
        if sample == 0 {
            return 0;
        }

        let filled = slots[..sample]
            .iter()
            .filter(|slot| {
                slot.key_xor_data.load(Ordering::Relaxed) != 0
                    || slot.data.load(Ordering::Relaxed) != 0
            })
            .count();

        filled * 1000 / sample
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Square;

    fn key(raw: u64) -> ZobristKey {
        ZobristKey::from_raw(raw)
    }

    #[test]
    fn test_slot_is_sixteen_bytes() {
        assert_eq!(size_of::<Slot>(), 16);
    }

    #[test]
    fn test_store_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        let mv = Move::new(Square::E2, Square::E4, 0, 0);
        let k = key(0xDEAD_BEEF_CAFE_F00D);

        tt.store(k, mv, Score::new(42), 7, Bound::Exact, 0);

        let hit = tt.probe(k, 0).unwrap();
        assert_eq!(hit.mv, mv);
        assert_eq!(hit.score, Score::new(42));
        assert_eq!(hit.depth, 7);
        assert_eq!(hit.bound, Bound::Exact);
    }

    #[test]
    fn test_probe_miss_on_other_key() {
        let tt = TranspositionTable::new(1);
        let mv = Move::new(Square::E2, Square::E4, 0, 0);

        tt.store(key(1), mv, Score::new(1), 1, Bound::Beta, 0);
        assert!(tt.probe(key(2), 0).is_none());
    }

    #[test]
    fn test_depth_preferred_replacement() {
        let tt = TranspositionTable::new(1);
        let shallow = Move::new(Square::E2, Square::E4, 0, 0);
        let deep = Move::new(Square::D2, Square::D4, 0, 0);
        let k = key(0x1234_5678_9ABC_DEF0);

        tt.store(k, deep, Score::new(10), 9, Bound::Exact, 0);
        tt.store(k, shallow, Score::new(20), 3, Bound::Exact, 0);

        // The shallower same-key store must not clobber the deeper entry.
        let hit = tt.probe(k, 0).unwrap();
        assert_eq!(hit.mv, deep);
        assert_eq!(hit.depth, 9);

        // A different key always replaces.
        let other = key(k.inner() ^ (tt.capacity() as u64));
        tt.store(other, shallow, Score::new(20), 1, Bound::Alpha, 0);
    }

    #[test]
    fn test_mate_score_ply_adjustment() {
        let tt = TranspositionTable::new(1);
        let mv = Move::new(Square::A1, Square::A8, 0, 0);
        let k = key(0xABCD);

        // A mate found 5 plies below the root...
        let found = Score::MATE - 5;
        tt.store(k, mv, found, 10, Bound::Exact, 5);

        // ...reads back correctly from 3 plies down: 2 plies closer.
        let hit = tt.probe(k, 3).unwrap();
        assert_eq!(hit.score, Score::MATE - 3);
    }

    #[test]
    fn test_clear_and_hashfull() {
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.hashfull(), 0);

        let mv = Move::new(Square::E2, Square::E4, 0, 0);
        for i in 0..100u64 {
            tt.store(key(i * 7919 + 1), mv, Score::new(1), 1, Bound::Exact, 0);
        }
        assert!(tt.hashfull() > 0);

        tt.clear();
        assert_eq!(tt.hashfull(), 0);
    }
}
