//! Random Number Generator.

use crate::pbrt::*;

/// 32-bit precision value for 1 - epsilon.
pub const FLOAT_ONE_MINUS_EPSILON: f32 = hexf32!("0x1.fffffep-1"); // 0.99999994

/// 1 - epsilon in the precision we've selected for `Float`.
pub const ONE_MINUS_EPSILON: Float = FLOAT_ONE_MINUS_EPSILON;

const PCG32_DEFAULT_STATE: u64 = 0x853c49e6748fea9b;
const PCG32_DEFAULT_STREAM: u64 = 0xda3e39cb94b95bdb;
const PCG32_MULT: u64 = 0x5851f42d4c957f2d;

/// Implements the PCG32 pseudo-random number generator.
#[derive(Clone, Debug)]
pub struct RNG {
    state: u64,
    inc: u64,
}

impl Default for RNG {
    /// Return a new instance of `RNG` with default state and stream.
    fn default() -> Self {
        Self {
            state: PCG32_DEFAULT_STATE,
            inc: PCG32_DEFAULT_STREAM,
        }
    }
}

impl RNG {
    /// Create a new `RNG` by seeding it with the given starting sequence.
    ///
    /// * `sequence_index` - The starting sequence to seed with.
    pub fn new(sequence_index: u64) -> Self {
        Self::with_seed(sequence_index, PCG32_DEFAULT_STATE)
    }

    /// Create a new `RNG` for a stream selected by `sequence_index` whose
    /// starting state is offset by `seed`. Distinct sequence indices give
    /// independent streams for the same seed.
    ///
    /// * `sequence_index` - The stream to use.
    /// * `seed`           - The starting state offset.
    pub fn with_seed(sequence_index: u64, seed: u64) -> Self {
        let mut ret = Self { state: 0, inc: 0 };
        ret.set_sequence(sequence_index, seed);
        ret
    }

    /// Initialize the random number generator sequence.
    ///
    /// * `init_seq` - The starting sequence to seed with.
    /// * `seed`     - The starting state offset.
    #[inline(always)]
    pub fn set_sequence(&mut self, init_seq: u64, seed: u64) {
        self.state = 0;
        let (inc, _) = init_seq.overflowing_shl(1);
        self.inc = inc | 1;
        let _ = self.uniform_u32();

        let (state, _) = self.state.overflowing_add(seed);
        self.state = state;
        let _ = self.uniform_u32();
    }

    /// Returns a uniformly distributed u32 value.
    #[inline(always)]
    pub fn uniform_u32(&mut self) -> u32 {
        let old_state = self.state;
        let (new_state, _) = old_state.overflowing_mul(PCG32_MULT);
        let (new_state, _) = new_state.overflowing_add(self.inc);
        self.state = new_state;

        let (xor_shifted, _) = old_state.overflowing_shr(18);
        let (xor_shifted, _) = (xor_shifted ^ old_state).overflowing_shr(27);
        let xor_shifted = xor_shifted as u32;

        let (rot, _) = old_state.overflowing_shr(59);
        let rot = rot as u32;

        let (r1, _) = xor_shifted.overflowing_shr(rot);
        let (bits, _) = (!rot).overflowing_add(1);
        let (r2, _) = xor_shifted.overflowing_shl(bits & 31);

        r1 | r2
    }

    /// Returns a uniformly distributed value over the half open interval
    /// `[lower_bound, upper_bound)`.
    ///
    /// * `lower_bound` - The lower bound.
    /// * `upper_bound` - The upper bound (exclusive).
    pub fn bounded_uniform_u32(&mut self, lower_bound: u32, upper_bound: u32) -> u32 {
        debug_assert!(upper_bound > lower_bound);
        let b = upper_bound - lower_bound;
        let threshold = (!b).wrapping_add(1) % b;
        loop {
            let r = self.uniform_u32();
            if r >= threshold {
                return lower_bound + r % b;
            }
        }
    }

    /// Returns a uniformly distributed value over the half open interval [0.0, 1.0).
    pub fn uniform_float(&mut self) -> Float {
        min(
            self.uniform_u32() as Float * hexf32!("0x1.0p-32") as Float,
            FLOAT_ONE_MINUS_EPSILON,
        )
    }

    /// Randomly permute a slice containing n-dimensional values in a linear
    /// structure.
    ///
    /// * `v`            - The slice to shuffle.
    /// * `count`        - Number n-dimensional values.
    /// * `n_dimensions` - Number of total dimensions.
    pub fn shuffle<T>(&mut self, v: &mut [T], count: usize, n_dimensions: usize) {
        debug_assert!(count * n_dimensions <= v.len());

        for i in 0..count {
            let other = i + self.bounded_uniform_u32(0, (count - i) as u32) as usize;
            for j in 0..n_dimensions {
                v.swap(n_dimensions * i + j, n_dimensions * other + j);
            }
        }
    }

    /// Runs only the first `k` steps of a Fisher-Yates shuffle so that the
    /// first `k` elements are a uniformly random subset of the slice in random
    /// order. The remaining elements are left in an unspecified order.
    ///
    /// * `v` - The slice to shuffle.
    /// * `k` - Number of leading elements to draw.
    pub fn partial_shuffle<T>(&mut self, v: &mut [T], k: usize) {
        let n = v.len();
        for i in 0..min(k, n) {
            let other = i + self.bounded_uniform_u32(0, (n - i) as u32) as usize;
            v.swap(i, other);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_sequence_is_reproducible() {
        let mut a = RNG::with_seed(3, 42);
        let mut b = RNG::with_seed(3, 42);
        for _ in 0..100 {
            assert_eq!(a.uniform_u32(), b.uniform_u32());
        }
    }

    #[test]
    fn different_streams_differ() {
        let mut a = RNG::with_seed(1, 42);
        let mut b = RNG::with_seed(2, 42);
        let same = (0..64).filter(|_| a.uniform_u32() == b.uniform_u32()).count();
        assert!(same < 4);
    }

    #[test]
    fn uniform_float_in_unit_interval() {
        let mut rng = RNG::new(7);
        for _ in 0..10_000 {
            let u = rng.uniform_float();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn bounded_uniform_stays_in_range() {
        let mut rng = RNG::new(11);
        let mut seen = [false; 5];
        for _ in 0..1000 {
            let v = rng.bounded_uniform_u32(10, 15);
            assert!((10..15).contains(&v));
            seen[(v - 10) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = RNG::new(5);
        let mut v: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut v, 50, 1);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<u32>>());
    }

    #[test]
    fn partial_shuffle_is_a_permutation() {
        let mut rng = RNG::new(9);
        let mut v: Vec<u32> = (0..20).collect();
        rng.partial_shuffle(&mut v, 4);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }

    #[test]
    fn partial_shuffle_prefix_is_uniform() {
        // Each element should land in the first slot with probability 1/n.
        let n = 8;
        let trials = 16_000;
        let mut rng = RNG::new(13);
        let mut hits = vec![0_u32; n];
        for _ in 0..trials {
            let mut v: Vec<usize> = (0..n).collect();
            rng.partial_shuffle(&mut v, 1);
            hits[v[0]] += 1;
        }
        let expected = trials as f64 / n as f64;
        for h in hits {
            assert!((h as f64 - expected).abs() < 0.15 * expected);
        }
    }
}
