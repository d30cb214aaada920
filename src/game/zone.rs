//! Zone Effects
//!
//! Swept and rough patches that override a stone's friction while its
//! center is inside them. Swept patches come from players sweeping during a
//! throw and are cleared when the next throw starts; rough patches are drawn
//! once per end by the peer making the first throw and shipped to the other
//! peer inside that launch.

use serde::{Serialize, Deserialize};

use crate::core::rng::SeededRng;
use crate::core::vec2::Vec2;
use crate::game::surface::{
    MAX_SWEEP_ZONES, ROUGH_EDGE_MARGIN, ROUGH_RADIUS_MAX, ROUGH_RADIUS_MIN,
    ROUGH_Y_RANGE, ROUGH_ZONE_COUNT_MAX, ROUGH_ZONE_COUNT_MIN, SHEET_WIDTH,
    STONE_RADIUS, SWEEP_FADE_TICKS, SWEEP_RADIUS,
};

/// Kind of patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// Swept ice (faster)
    Swept,
    /// Rough ice (slower)
    Rough,
}

/// A circular friction patch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Patch center
    pub center: Vec2,
    /// Patch radius
    pub radius: f64,
    /// Patch kind
    pub kind: ZoneKind,
    /// Throw tick the patch was laid down at (swept only, display fade)
    pub created_tick: u32,
}

impl Zone {
    /// Create a swept patch.
    pub fn swept(center: Vec2, created_tick: u32) -> Self {
        Self {
            center,
            radius: SWEEP_RADIUS,
            kind: ZoneKind::Swept,
            created_tick,
        }
    }

    /// Create a rough patch.
    pub fn rough(center: Vec2, radius: f64) -> Self {
        Self {
            center,
            radius,
            kind: ZoneKind::Rough,
            created_tick: 0,
        }
    }

    /// True if a stone centered at `position` is affected.
    ///
    /// The reach is the patch radius plus half a stone radius.
    #[inline]
    pub fn affects(&self, position: Vec2) -> bool {
        position.distance(self.center) < self.radius + STONE_RADIUS / 2.0
    }

    /// Display opacity in [0, 1] at a given throw tick.
    pub fn opacity(&self, now_tick: u32) -> f64 {
        match self.kind {
            ZoneKind::Rough => 1.0,
            ZoneKind::Swept => {
                let age = now_tick.saturating_sub(self.created_tick);
                1.0 - f64::from(age.min(SWEEP_FADE_TICKS)) / f64::from(SWEEP_FADE_TICKS)
            }
        }
    }
}

/// All patches on the sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneSet {
    /// Swept patches of the throw in flight
    pub swept: Vec<Zone>,
    /// Rough patches of the current end
    pub rough: Vec<Zone>,
}

impl ZoneSet {
    /// Add a swept patch unless one already sits within half a sweep radius.
    ///
    /// Returns true if the patch was added.
    pub fn add_sweep_zone(&mut self, position: Vec2, tick: u32) -> bool {
        if !position.is_finite() || self.swept.len() >= MAX_SWEEP_ZONES {
            return false;
        }
        let min_spacing = SWEEP_RADIUS / 2.0;
        if self.swept.iter().any(|z| z.center.distance(position) < min_spacing) {
            return false;
        }
        self.swept.push(Zone::swept(position, tick));
        true
    }

    /// Drop all swept patches (start of a throw).
    pub fn clear_swept(&mut self) {
        self.swept.clear();
    }

    /// Drop everything (start of an end).
    pub fn clear(&mut self) {
        self.swept.clear();
        self.rough.clear();
    }

    /// Install the rough patches for this end.
    ///
    /// Entries with non-finite geometry or a non-positive radius are dropped
    /// and the set is capped at the per-end maximum.
    pub fn set_rough(&mut self, zones: impl IntoIterator<Item = Zone>) {
        self.rough = zones
            .into_iter()
            .filter(|z| z.center.is_finite() && z.radius.is_finite() && z.radius > 0.0)
            .map(|z| Zone::rough(z.center, z.radius.min(ROUGH_RADIUS_MAX)))
            .take(ROUGH_ZONE_COUNT_MAX as usize)
            .collect();
    }

    /// True if any swept patch affects the position.
    #[inline]
    pub fn in_swept(&self, position: Vec2) -> bool {
        self.swept.iter().any(|z| z.affects(position))
    }

    /// True if any rough patch affects the position.
    #[inline]
    pub fn in_rough(&self, position: Vec2) -> bool {
        self.rough.iter().any(|z| z.affects(position))
    }
}

/// Draw the rough patches for an end.
///
/// Produces 3-5 patches, centers kept away from the side boundaries.
pub fn generate_rough_zones(rng: &mut SeededRng) -> Vec<Zone> {
    let count = rng.next_int_range(ROUGH_ZONE_COUNT_MIN, ROUGH_ZONE_COUNT_MAX);
    (0..count)
        .map(|_| {
            let x = rng.next_f64_range(ROUGH_EDGE_MARGIN, SHEET_WIDTH - ROUGH_EDGE_MARGIN);
            let y = rng.next_f64_range(ROUGH_Y_RANGE.0, ROUGH_Y_RANGE.1);
            let radius = rng.next_f64_range(ROUGH_RADIUS_MIN, ROUGH_RADIUS_MAX);
            Zone::rough(Vec2::new(x, y), radius)
        })
        .collect()
}
