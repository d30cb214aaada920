//! Seedable Random Number Generator
//!
//! Xorshift128+ generator. The engine only has two random inputs: the
//! rough-ice layout of an end and the wobble baked into a launch velocity.
//! Both are drawn on the throwing peer and transmitted, so the generator
//! never has to agree across peers; seeding is still explicit so tests and
//! replays are reproducible.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// PRNG using the Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use curling_engine::core::rng::SeededRng;
///
/// let mut a = SeededRng::new(12345);
/// let mut b = SeededRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeededRng {
    state: [u64; 2],
}

impl Default for SeededRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SeededRng {
    /// Seed the generator. The seed is spread over both state words with
    /// SplitMix64, so small seeds are fine.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // State must never be all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create an RNG seeded from fresh entropy.
    pub fn from_entropy() -> Self {
        let nonce = uuid::Uuid::new_v4();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self::new(derive_seed(nonce.as_bytes(), &nanos.to_le_bytes()))
    }

    /// Next raw 64-bit output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Integer in `[min, max]`, inclusive on both ends.
    #[inline]
    pub fn next_int_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        let span = u64::from(max - min) + 1;
        min + (self.next_u64() % span) as u32
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // 53 high bits -> exact double in [0, 1)
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Generate a float in [min, max).
    #[inline]
    pub fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        min + (max - min) * self.next_f64()
    }

}

/// One SplitMix64 step.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a 64-bit seed from an identifier and extra entropy.
pub fn derive_seed(id: &[u8], entropy: &[u8]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"CURLING_SEED_V1");
    hasher.update(id);
    hasher.update(entropy);
    let hash = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut rng1 = SeededRng::new(42);
        let mut rng2 = SeededRng::new(42);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_seeds_diverge() {
        let mut rng1 = SeededRng::new(1);
        let mut rng2 = SeededRng::new(2);
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_int_range() {
        let mut rng = SeededRng::new(7);
        for _ in 0..1000 {
            let v = rng.next_int_range(3, 5);
            assert!((3..=5).contains(&v));
        }
    }

    #[test]
    fn test_next_f64_bounds() {
        let mut rng = SeededRng::new(99);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
            let r = rng.next_f64_range(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&r));
        }
    }

    #[test]
    fn test_derive_seed_depends_on_inputs() {
        let a = derive_seed(b"lobby-a", &[1, 2, 3]);
        let b = derive_seed(b"lobby-a", &[1, 2, 3]);
        let c = derive_seed(b"lobby-b", &[1, 2, 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
