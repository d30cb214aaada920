//! Stone Kinematics
//!
//! Per-stone integration: move, pick the friction for where the stone now
//! is, decay the velocity, hard-stop below the threshold.

use crate::game::state::Stone;
use crate::game::surface::{ice_friction, MIN_VELOCITY, ROUGH_FRICTION, SWEPT_FRICTION};
use crate::game::zone::ZoneSet;
use crate::core::vec2::Vec2;

/// Friction multiplier for a position in a given end.
///
/// Rough overrides the ice; swept is checked last and wins over both.
pub fn friction_at(position: Vec2, end: u32, zones: &ZoneSet) -> f64 {
    let mut friction = ice_friction(end);
    if zones.in_rough(position) {
        friction = ROUGH_FRICTION;
    }
    if zones.in_swept(position) {
        friction = SWEPT_FRICTION;
    }
    friction
}

/// Advance one stone by one tick. Inactive stones are left untouched.
pub fn integrate(stone: &mut Stone, end: u32, zones: &ZoneSet) {
    if !stone.active {
        return;
    }

    stone.position += stone.velocity;

    let friction = friction_at(stone.position, end, zones);
    stone.velocity = stone.velocity.scale(friction);

    if stone.velocity.length() < MIN_VELOCITY {
        stone.velocity = Vec2::ZERO;
    }
}
