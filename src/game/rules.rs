//! Rule Enforcement
//!
//! Runs once per throw, after the stones have settled and (on the
//! non-throwing peer) after sync-stones has been applied. Both peers run it
//! on identical input, so it needs no message of its own.

use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::state::{find_resting_stone, PreThrowSnapshot, Stone, Team};
use crate::game::surface::{in_free_guard_zone, past_hog_line, PROTECTED_THROWS};

/// One guard put back by the free guard zone rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GuardRestore {
    /// Team owning the guard
    pub team: Team,
    /// Position it was returned to
    pub position: Vec2,
    /// True if the guard had left play and a new stone was created
    pub recreated: bool,
}

/// Outcome of the free guard zone check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GuardZoneOutcome {
    /// Guards put back
    pub restored: Vec<GuardRestore>,
    /// The thrown stone was retired as a penalty
    pub penalized: bool,
}

/// Apply the free guard zone rule.
///
/// Only throws 1..=`PROTECTED_THROWS` of an end are checked. For every
/// opponent stone that was active in the guard zone before the throw and is
/// no longer found (active, stopped, within tolerance) at its old spot:
/// - if the same stone is still in play it is moved back and stopped
/// - otherwise a fresh stone is created at the old spot
///
/// If anything was restored, the thrown stone is retired.
pub fn enforce_free_guard_zone(stones: &mut Vec<Stone>, snapshot: &PreThrowSnapshot) -> GuardZoneOutcome {
    let mut outcome = GuardZoneOutcome::default();

    if snapshot.throw_number() > PROTECTED_THROWS {
        return outcome;
    }

    let opponent = snapshot.thrower.other();

    for (index, guard) in snapshot.stones.iter().enumerate() {
        if guard.team != opponent || !guard.active || !in_free_guard_zone(guard.position) {
            continue;
        }

        if find_resting_stone(stones, opponent, guard.position).is_some() {
            continue;
        }

        let recreated = match stones.get_mut(index) {
            Some(moved) if moved.active && moved.team == opponent => {
                moved.position = guard.position;
                moved.velocity = Vec2::ZERO;
                false
            }
            _ => {
                stones.push(Stone::at_rest(opponent, guard.position));
                true
            }
        };

        debug!(?opponent, position = ?guard.position, recreated, "free guard zone: guard restored");
        outcome.restored.push(GuardRestore {
            team: opponent,
            position: guard.position,
            recreated,
        });
    }

    if !outcome.restored.is_empty() {
        if let Some(thrown) = stones.get_mut(snapshot.thrown_index()) {
            thrown.retire();
            outcome.penalized = true;
        }
    }

    outcome
}

/// Retire every active, stopped stone that has not crossed the hog line.
///
/// Returns the indices retired.
pub fn enforce_hog_line(stones: &mut [Stone]) -> Vec<usize> {
    let mut retired = Vec::new();
    for (index, stone) in stones.iter_mut().enumerate() {
        if stone.active && !stone.is_moving() && !past_hog_line(stone.position) {
            stone.retire();
            retired.push(index);
        }
    }
    retired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::surface::{button, BUTTON_X, HOG_LINE_Y};

    fn guard_pos() -> Vec2 {
        Vec2::new(BUTTON_X, 400.0)
    }

    fn snapshot_with_guard(thrown_before: u32) -> (Vec<Stone>, PreThrowSnapshot) {
        let before = vec![Stone::at_rest(Team::Yellow, guard_pos())];
        let snapshot = PreThrowSnapshot::capture(&before, Team::Red, thrown_before);
        let mut after = before.clone();
        // The thrown stone, already settled
        after.push(Stone::at_rest(Team::Red, Vec2::new(BUTTON_X, 300.0)));
        (after, snapshot)
    }

    #[test]
    fn test_untouched_guard_no_penalty() {
        let (mut stones, snapshot) = snapshot_with_guard(1);
        let outcome = enforce_free_guard_zone(&mut stones, &snapshot);
        assert!(outcome.restored.is_empty());
        assert!(!outcome.penalized);
        assert!(stones[1].active);
    }

    #[test]
    fn test_displaced_guard_moved_back() {
        let (mut stones, snapshot) = snapshot_with_guard(2);
        stones[0].position = Vec2::new(BUTTON_X + 30.0, 350.0);

        let outcome = enforce_free_guard_zone(&mut stones, &snapshot);

        assert_eq!(outcome.restored.len(), 1);
        assert!(!outcome.restored[0].recreated);
        assert!(outcome.penalized);
        assert_eq!(stones.len(), 2);
        assert_eq!(stones[0].position, guard_pos());
        assert_eq!(stones[0].velocity, Vec2::ZERO);
        assert!(!stones[1].active, "thrown stone retired");
    }

    #[test]
    fn test_removed_guard_recreated() {
        for thrown_before in 0..PROTECTED_THROWS {
            let (mut stones, snapshot) = snapshot_with_guard(thrown_before);
            stones[0].retire();
            stones[0].position = Vec2::new(BUTTON_X, -50.0);

            let outcome = enforce_free_guard_zone(&mut stones, &snapshot);

            assert_eq!(outcome.restored.len(), 1);
            assert!(outcome.restored[0].recreated);
            assert_eq!(stones.len(), 3);
            let recreated = stones[2];
            assert_eq!(recreated.team, Team::Yellow);
            assert_eq!(recreated.position, guard_pos());
            assert_eq!(recreated.velocity, Vec2::ZERO);
            assert!(recreated.active);
            assert!(!stones[1].active);
            // The retired original is kept for display
            assert!(!stones[0].active);
        }
    }

    #[test]
    fn test_guard_nudged_within_tolerance_stays() {
        let (mut stones, snapshot) = snapshot_with_guard(1);
        stones[0].position = guard_pos() + Vec2::new(0.5, 0.5);

        let outcome = enforce_free_guard_zone(&mut stones, &snapshot);

        assert!(outcome.restored.is_empty());
        assert!(!outcome.penalized);
        assert_eq!(stones[0].position, guard_pos() + Vec2::new(0.5, 0.5));
        assert!(stones[1].active);
    }

    #[test]
    fn test_fifth_throw_unprotected() {
        let (mut stones, snapshot) = snapshot_with_guard(PROTECTED_THROWS);
        stones[0].retire();
        let outcome = enforce_free_guard_zone(&mut stones, &snapshot);
        assert_eq!(outcome, GuardZoneOutcome::default());
        assert!(stones[1].active);
    }

    #[test]
    fn test_own_guard_not_protected() {
        let before = vec![Stone::at_rest(Team::Red, guard_pos())];
        let snapshot = PreThrowSnapshot::capture(&before, Team::Red, 1);
        let mut stones = before.clone();
        stones[0].retire();
        stones.push(Stone::at_rest(Team::Red, button()));
        let outcome = enforce_free_guard_zone(&mut stones, &snapshot);
        assert!(outcome.restored.is_empty());
    }

    #[test]
    fn test_house_stone_not_protected() {
        let before = vec![Stone::at_rest(Team::Yellow, button())];
        let snapshot = PreThrowSnapshot::capture(&before, Team::Red, 0);
        let mut stones = before.clone();
        stones[0].retire();
        stones.push(Stone::at_rest(Team::Red, button()));
        let outcome = enforce_free_guard_zone(&mut stones, &snapshot);
        assert!(outcome.restored.is_empty());
    }

    #[test]
    fn test_hog_line() {
        let mut stones = vec![
            Stone::at_rest(Team::Red, Vec2::new(BUTTON_X, HOG_LINE_Y + 40.0)),
            Stone::at_rest(Team::Yellow, Vec2::new(BUTTON_X, HOG_LINE_Y - 40.0)),
            Stone::new(Team::Red, Vec2::new(BUTTON_X, HOG_LINE_Y + 10.0), Vec2::new(0.0, -2.0)),
        ];
        let retired = enforce_hog_line(&mut stones);
        assert_eq!(retired, vec![0]);
        assert!(!stones[0].active);
        assert!(stones[1].active);
        assert!(stones[2].active);
    }
}
