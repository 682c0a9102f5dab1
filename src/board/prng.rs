/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Fixed seeds so that hash keys are identical across builds.
const SEEDS: [u64; 4] = [
    0x9e37_79b9_7f4a_7c15,
    0xbf58_476d_1ce4_e5b9,
    0x94d0_49bb_1331_11eb,
    0xd6e8_feb8_6659_fd93,
];

/// A pseudo-random number generator using the xoshiro256** algorithm.
///
/// Usable in `const` contexts, which lets the Zobrist tables be built at
/// compile time. Reference: <https://prng.di.unimi.it/xoshiro256starstar.c>
pub struct XoShiRo([u64; 4]);

impl XoShiRo {
    /// Construct a new generator from the library's fixed seeds.
    #[inline(always)]
    pub const fn new() -> Self {
        Self(SEEDS)
    }

    /// Advance the generator, returning the next value and the new state.
    #[inline(always)]
    pub const fn next_const(self) -> (u64, Self) {
        let mut s = self.0;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);

        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];

        s[2] ^= t;

        s[3] = s[3].rotate_left(45);
        (result, Self(s))
    }
}

impl Default for XoShiRo {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_sequence() {
        let (a1, g) = XoShiRo::new().next_const();
        let (a2, _) = g.next_const();
        let (b1, g) = XoShiRo::new().next_const();
        let (b2, _) = g.next_const();

        assert_eq!(a1, b1);
        assert_eq!(a2, b2);
        assert_ne!(a1, a2);
    }
}
