//! Core primitives.
//!
//! Vector math, seeded randomness and stone-set digests shared by the
//! simulation and the network layer.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::SeededRng;
pub use hash::{StateHash, StateHasher, compute_stones_hash};
