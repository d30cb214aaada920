//! Simulation Stepper
//!
//! One tick is fully synchronous: integrate every active stone, resolve
//! contacts once, retire anything that left the sheet. Network messages and
//! UI intents are only ever applied between calls to [`step`].

use crate::game::collision::resolve_all;
use crate::game::kinematics::integrate;
use crate::game::state::Stone;
use crate::game::surface::is_out_of_bounds;
use crate::game::zone::ZoneSet;

/// Result of a tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickResult {
    /// Any active stone still above the stop threshold
    pub any_moving: bool,
    /// Contacts resolved this tick
    pub contacts: usize,
    /// Indices of stones retired for leaving the sheet this tick
    pub retired: Vec<usize>,
}

/// Advance all stones one tick.
///
/// # Arguments
///
/// * `stones` - The stone collection (mutated in place, order preserved)
/// * `zones` - Friction patches in effect
/// * `end` - Current end number, for ice degradation
pub fn step(stones: &mut [Stone], zones: &ZoneSet, end: u32) -> TickResult {
    let mut result = TickResult::default();

    // 1. Kinematics
    for stone in stones.iter_mut() {
        integrate(stone, end, zones);
    }

    // 2. Contacts, single pass
    result.contacts = resolve_all(stones);

    // 3. Retire stones off the sheet
    for (index, stone) in stones.iter_mut().enumerate() {
        if stone.active && is_out_of_bounds(stone.position) {
            stone.retire();
            result.retired.push(index);
        }
    }

    result.any_moving = stones.iter().any(Stone::is_moving);
    result
}

/// Run ticks until nothing moves or `max_ticks` is reached.
///
/// Returns the number of ticks run.
pub fn settle(stones: &mut [Stone], zones: &ZoneSet, end: u32, max_ticks: u32) -> u32 {
    let mut ticks = 0;
    while ticks < max_ticks {
        ticks += 1;
        if !step(stones, zones, end).any_moving {
            break;
        }
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::state::{stones_hash, Team};
    use crate::game::surface::{hack, HOG_LINE_Y, SHEET_LENGTH};

    #[test]
    fn test_stone_comes_to_rest() {
        let mut stones = vec![Stone::new(Team::Red, hack(), Vec2::new(0.0, -9.0))];
        let ticks = settle(&mut stones, &ZoneSet::default(), 1, 10_000);
        assert!(ticks < 10_000);
        assert!(stones[0].active);
        assert_eq!(stones[0].velocity, Vec2::ZERO);
        assert!(stones[0].position.y < HOG_LINE_Y);
    }

    #[test]
    fn test_out_of_bounds_retired_not_removed() {
        let mut stones = vec![Stone::new(Team::Red, Vec2::new(150.0, 5.0), Vec2::new(0.0, -30.0))];
        let result = step(&mut stones, &ZoneSet::default(), 1);
        assert_eq!(result.retired, vec![0]);
        assert_eq!(stones.len(), 1);
        assert!(!stones[0].active);
        assert!(!result.any_moving);
    }

    #[test]
    fn test_backward_stone_retired_past_near_boundary() {
        let mut stones = vec![Stone::new(Team::Yellow, Vec2::new(150.0, SHEET_LENGTH), Vec2::new(0.0, 20.0))];
        let result = step(&mut stones, &ZoneSet::default(), 1);
        assert_eq!(result.retired, vec![0]);
    }

    #[test]
    fn test_step_is_deterministic() {
        let make = || {
            vec![
                Stone::at_rest(Team::Yellow, Vec2::new(150.0, 300.0)),
                Stone::at_rest(Team::Red, Vec2::new(160.0, 250.0)),
                Stone::new(Team::Red, hack(), Vec2::new(0.05, -10.0)),
            ]
        };
        let mut a = make();
        let mut b = make();
        settle(&mut a, &ZoneSet::default(), 3, 5_000);
        settle(&mut b, &ZoneSet::default(), 3, 5_000);
        assert_eq!(stones_hash(&a), stones_hash(&b));
    }

    #[test]
    fn test_contact_counted() {
        let mut stones = vec![
            Stone::new(Team::Red, Vec2::new(150.0, 230.0), Vec2::new(0.0, -10.0)),
            Stone::at_rest(Team::Yellow, Vec2::new(150.0, 205.0)),
        ];
        let result = step(&mut stones, &ZoneSet::default(), 1);
        assert_eq!(result.contacts, 1);
        assert!(stones[1].is_moving());
    }
}
