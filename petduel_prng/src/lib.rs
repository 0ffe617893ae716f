// Deterministic, portable pseudo-random number generator.
//
// xoshiro256++ seeded through SplitMix64. Every random decision in the
// workspace draws from a `DuelRng`: creature generation, stat growth on
// level-up, candidate ability rolls, and the bot's move choice.
//
// Randomness never crosses the wire. Each client owns its own generator and
// only uses it for decisions that affect its own creature (level-up growth,
// new abilities), so two mirrors of the same battle never need to agree on
// a seed. Tests seed explicitly to get reproducible creatures.
//
// No floating-point arithmetic in the core generator.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DuelRng {
    s: [u64; 4],
}

impl DuelRng {
    /// Create a generator from a `u64` seed. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform integer in `[low, high)`, rejection-sampled to avoid modulo
    /// bias. Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Uniform `i32` in `[low, high]`, both ends inclusive. Stat jitter and
    /// growth ranges are written this way. Panics if `low > high`.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32_inclusive: low must be <= high");
        let span = (i64::from(high) - i64::from(low)) as u64 + 1;
        let offset = self.range_u64(0, span);
        (i64::from(low) + offset as i64) as i32
    }

    /// Pick an index into a collection of `len` items, or `None` when the
    /// collection is empty.
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.range_u64(0, len as u64) as usize)
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
