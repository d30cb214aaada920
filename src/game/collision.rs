//! Collision Resolution
//!
//! Pairwise stone-on-stone contacts: equal-mass impulse scaled by the
//! restitution coefficient, followed by positional separation.
//!
//! One pass per tick over every unordered pair, no iterative solver.
//! Stable for ordinary two-stone contacts; simultaneous pile-ups of three or
//! more stones can leave residual overlap or odd rebounds for a tick. That
//! behaviour is part of the game feel and is kept as is.

use crate::core::vec2::Vec2;
use crate::game::state::Stone;
use crate::game::surface::RESTITUTION;

/// Check if two circles overlap.
#[inline]
pub fn circles_overlap(pos_a: Vec2, radius_a: f64, pos_b: Vec2, radius_b: f64) -> bool {
    let combined = radius_a + radius_b;
    pos_a.distance_squared(pos_b) < combined * combined
}

/// Resolve a contact between two stones.
///
/// Returns true if an impulse was applied. Coincident centers (`d == 0`)
/// and separating pairs are left alone.
pub fn resolve_pair(a: &mut Stone, b: &mut Stone) -> bool {
    if !a.active || !b.active {
        return false;
    }

    let delta = b.position - a.position;
    let distance = delta.length();
    let min_distance = a.radius + b.radius;
    if distance >= min_distance || distance <= 0.0 {
        return false;
    }

    let normal = delta.scale(1.0 / distance);

    // Closing speed along the normal; <= 0 means already separating
    let approach = (a.velocity - b.velocity).dot(normal);
    if approach <= 0.0 {
        return false;
    }

    let impulse = normal.scale(approach * (1.0 + RESTITUTION) / 2.0);
    a.velocity -= impulse;
    b.velocity += impulse;

    let correction = normal.scale((min_distance - distance) / 2.0);
    a.position -= correction;
    b.position += correction;

    true
}

/// Resolve every unordered pair of active stones once, in index order.
///
/// Returns the number of contacts resolved.
pub fn resolve_all(stones: &mut [Stone]) -> usize {
    let mut contacts = 0;
    for i in 0..stones.len() {
        let (head, tail) = stones.split_at_mut(i + 1);
        let a = &mut head[i];
        if !a.active {
            continue;
        }
        for b in tail.iter_mut() {
            if resolve_pair(a, b) {
                contacts += 1;
            }
        }
    }
    contacts
}
