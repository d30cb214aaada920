//! Stone-Set Hashing
//!
//! SHA-256 digests of the stone collection. Peers attach a digest to every
//! sync-stones payload so that:
//! - a receiver can log whether its own simulation had drifted
//! - a payload whose contents do not match its digest is dropped as corrupt

use sha2::{Sha256, Digest};
use super::vec2::Vec2;

/// SHA-256 digest bytes.
pub type StateHash = [u8; 32];

/// Hasher with helpers for engine types.
///
/// Order of updates is significant.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Start a digest under a domain tag.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a stone collection.
    pub fn for_stones() -> Self {
        Self::new(b"CURLING_STONES_V1")
    }

    /// Feed one byte.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Feed a little-endian u32.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f64 (bit pattern, little-endian).
    ///
    /// `-0.0` is folded into `0.0` so a stopped stone hashes the same
    /// regardless of the sign its velocity decayed from.
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        let value = if value == 0.0 { 0.0 } else { value };
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Update with a Vec2.
    #[inline]
    pub fn update_vec2(&mut self, value: Vec2) {
        self.update_f64(value.x);
        self.update_f64(value.y);
    }

    /// Feed a flag as one byte.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finish the digest.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute a digest over stone-like records.
///
/// The closure is called once with the hasher; the count is hashed first
/// so that `[]` and a list of default stones differ.
pub fn compute_stones_hash<F>(count: usize, add_stones: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_stones();
    hasher.update_u32(count as u32);
    add_stones(&mut hasher);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_digest() {
        let make_hash = || {
            let mut hasher = StateHasher::for_stones();
            hasher.update_u32(3);
            hasher.update_vec2(Vec2::new(1.5, -2.25));
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_update_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_f64(1.0);
            h.update_f64(2.0);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_f64(2.0);
            h.update_f64(1.0);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_negative_zero_folded() {
        let a = {
            let mut h = StateHasher::for_stones();
            h.update_f64(0.0);
            h.finalize()
        };
        let b = {
            let mut h = StateHasher::for_stones();
            h.update_f64(-0.0);
            h.finalize()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_count_prefix() {
        let empty = compute_stones_hash(0, |_| {});
        let one = compute_stones_hash(1, |_| {});
        assert_ne!(empty, one);
    }
}
