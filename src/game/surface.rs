//! Surface Model
//!
//! Static geometry and physics constants of the sheet. Units are sheet
//! units (one unit is roughly one pixel at the reference canvas size);
//! one simulation tick is one frame at [`crate::TICK_RATE`].
//!
//! ```text
//!   y = 0            ─────────────── back boundary
//!   y = 110..290        ( house )     BUTTON at (150, 200)
//!   y = 500          ─ ─ ─ ─ ─ ─ ─ ─ hog line
//!   y = 1120               ●          hack (launch point)
//!   y = 1200         ─────────────── near boundary
//! ```

use crate::core::vec2::Vec2;

// =============================================================================
// GEOMETRY
// =============================================================================

/// Sheet width.
pub const SHEET_WIDTH: f64 = 300.0;

/// Sheet length.
pub const SHEET_LENGTH: f64 = 1200.0;

/// Button (house center) X.
pub const BUTTON_X: f64 = SHEET_WIDTH / 2.0;

/// Button (house center) Y.
pub const BUTTON_Y: f64 = 200.0;

/// Scoring ring radii, outermost first. The first entry is the house.
pub const RING_RADII: [f64; 4] = [90.0, 60.0, 30.0, 10.0];

/// Outer radius of the house.
pub const HOUSE_RADIUS: f64 = RING_RADII[0];

/// Hog line. Stones must come to rest past it (smaller y) to stay live.
pub const HOG_LINE_Y: f64 = 500.0;

/// Launch point Y.
pub const HACK_Y: f64 = 1120.0;

/// Stone radius (all stones are the same size).
pub const STONE_RADIUS: f64 = 11.0;

/// Stones leaving the sheet by more than this are retired.
pub const OUT_OF_BOUNDS_SLACK: f64 = STONE_RADIUS;

// =============================================================================
// PHYSICS
// =============================================================================

/// Per-tick velocity multiplier on fresh ice in the first end.
pub const BASE_FRICTION: f64 = 0.99;

/// Friction lost per end played (the ice gets slower).
pub const FRICTION_DEGRADATION: f64 = 0.0004;

/// Friction inside a rough patch.
pub const ROUGH_FRICTION: f64 = 0.975;

/// Friction inside a swept patch. Overrides rough.
pub const SWEPT_FRICTION: f64 = 0.995;

/// Speeds below this are snapped to zero.
pub const MIN_VELOCITY: f64 = 0.05;

/// Collision restitution.
pub const RESTITUTION: f64 = 0.9;

/// Launch speed at zero power.
pub const MIN_LAUNCH_SPEED: f64 = 4.0;

/// Launch speed at full power. Also the clamp for network velocities.
pub const MAX_LAUNCH_SPEED: f64 = 14.0;

/// Largest launch angle either side of straight up (radians).
pub const MAX_LAUNCH_ANGLE: f64 = 0.35;

/// Largest random wobble added to the launch angle at full power (radians).
pub const MAX_WOBBLE: f64 = 0.01;

// =============================================================================
// ZONES
// =============================================================================

/// Radius of a swept patch.
pub const SWEEP_RADIUS: f64 = 24.0;

/// Hard cap on swept patches in one throw.
pub const MAX_SWEEP_ZONES: usize = 256;

/// Rough patches per end.
pub const ROUGH_ZONE_COUNT_MIN: u32 = 3;
/// Rough patches per end.
pub const ROUGH_ZONE_COUNT_MAX: u32 = 5;

/// Rough patch radius range.
pub const ROUGH_RADIUS_MIN: f64 = 20.0;
/// Rough patch radius range.
pub const ROUGH_RADIUS_MAX: f64 = 45.0;

/// Rough patch centers stay this far from the side boundaries.
pub const ROUGH_EDGE_MARGIN: f64 = 50.0;

/// Rough patches are placed between these y values.
pub const ROUGH_Y_RANGE: (f64, f64) = (150.0, 950.0);

/// Ticks a swept patch takes to fade out on screen.
pub const SWEEP_FADE_TICKS: u32 = 120;

// =============================================================================
// MATCH
// =============================================================================

/// Stones per team per end.
pub const STONES_PER_TEAM: u32 = 8;

/// Stones per end.
pub const STONES_PER_END: u32 = STONES_PER_TEAM * 2;

/// Throws in an end protected by the free guard zone rule.
pub const PROTECTED_THROWS: u32 = 4;

/// Distance under which a stone counts as "still there".
pub const POSITION_TOLERANCE: f64 = 1.0;

/// Button position.
#[inline]
pub fn button() -> Vec2 {
    Vec2::new(BUTTON_X, BUTTON_Y)
}

/// Launch position.
#[inline]
pub fn hack() -> Vec2 {
    Vec2::new(SHEET_WIDTH / 2.0, HACK_Y)
}

/// Friction multiplier for an end number (1-based).
#[inline]
pub fn ice_friction(end: u32) -> f64 {
    BASE_FRICTION - f64::from(end.max(1) - 1) * FRICTION_DEGRADATION
}

/// True if a position is outside the sheet by more than the slack.
#[inline]
pub fn is_out_of_bounds(position: Vec2) -> bool {
    position.x < -OUT_OF_BOUNDS_SLACK
        || position.x > SHEET_WIDTH + OUT_OF_BOUNDS_SLACK
        || position.y < -OUT_OF_BOUNDS_SLACK
        || position.y > SHEET_LENGTH + OUT_OF_BOUNDS_SLACK
}

/// Distance from the button.
#[inline]
pub fn distance_to_button(position: Vec2) -> f64 {
    position.distance(button())
}

/// True if a stone at this position counts for scoring.
#[inline]
pub fn in_house(position: Vec2) -> bool {
    distance_to_button(position) <= HOUSE_RADIUS + STONE_RADIUS
}

/// True if a stone at this position sits in the free guard zone:
/// past the hog line, in front of the tee line, not touching the house.
#[inline]
pub fn in_free_guard_zone(position: Vec2) -> bool {
    position.y < HOG_LINE_Y && position.y > BUTTON_Y && !in_house(position)
}

/// True if a stone at this position has crossed the hog line.
#[inline]
pub fn past_hog_line(position: Vec2) -> bool {
    position.y < HOG_LINE_Y
}
