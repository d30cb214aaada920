//! Game State Definitions
//!
//! Stones, teams, phases and the owned match state that every component
//! receives by reference. There is no global state: each peer owns exactly
//! one `MatchState`.

use std::time::Instant;
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, compute_stones_hash};
use crate::core::vec2::Vec2;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::scoring::{calculate_score, RoundResult};
use crate::game::surface::{self, STONE_RADIUS, STONES_PER_END, MIN_VELOCITY};
use crate::game::zone::ZoneSet;

// =============================================================================
// TEAM
// =============================================================================

/// One of the two teams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Team {
    /// Team 0
    Red = 0,
    /// Team 1
    Yellow = 1,
}

impl Team {
    /// Both teams in index order.
    pub const ALL: [Team; 2] = [Team::Red, Team::Yellow];

    /// Array index (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposing team.
    #[inline]
    pub fn other(self) -> Team {
        match self {
            Team::Red => Team::Yellow,
            Team::Yellow => Team::Red,
        }
    }

    /// Team from wire index.
    pub fn from_index(index: u8) -> Option<Team> {
        match index {
            0 => Some(Team::Red),
            1 => Some(Team::Yellow),
            _ => None,
        }
    }
}

// =============================================================================
// STONE
// =============================================================================

/// A single stone.
///
/// Retired stones keep their slot in the collection (for display) with
/// `active == false`; physics and scoring skip them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stone {
    /// Owning team
    pub team: Team,
    /// Center position
    pub position: Vec2,
    /// Velocity in units per tick
    pub velocity: Vec2,
    /// Collision radius
    pub radius: f64,
    /// Still in play?
    pub active: bool,
}

impl Stone {
    /// Create an active stone.
    pub fn new(team: Team, position: Vec2, velocity: Vec2) -> Self {
        Self {
            team,
            position,
            velocity,
            radius: STONE_RADIUS,
            active: true,
        }
    }

    /// Create a stationary active stone.
    pub fn at_rest(team: Team, position: Vec2) -> Self {
        Self::new(team, position, Vec2::ZERO)
    }

    /// Current speed.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Active and above the stop threshold.
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.active && self.speed() > MIN_VELOCITY
    }

    /// Take the stone out of play. It stays in the collection.
    #[inline]
    pub fn retire(&mut self) {
        self.active = false;
        self.velocity = Vec2::ZERO;
    }
}

/// Index of an active, stationary stone of `team` within
/// `POSITION_TOLERANCE` of `position`.
pub fn find_resting_stone(stones: &[Stone], team: Team, position: Vec2) -> Option<usize> {
    stones.iter().position(|s| {
        s.active
            && s.team == team
            && !s.is_moving()
            && s.position.distance(position) <= surface::POSITION_TOLERANCE
    })
}

/// Digest of a stone collection (order-sensitive).
pub fn stones_hash(stones: &[Stone]) -> StateHash {
    compute_stones_hash(stones.len(), |hasher| {
        for stone in stones {
            hasher.update_u8(stone.team as u8);
            hasher.update_vec2(stone.position);
            hasher.update_vec2(stone.velocity);
            hasher.update_bool(stone.active);
        }
    })
}

// =============================================================================
// THROW IDENTITY
// =============================================================================

/// Identifies one throw: the end it belongs to and how many stones had
/// been thrown in that end before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThrowId {
    /// End number (1-based)
    pub end: u32,
    /// Stones thrown in the end before this throw (0..16)
    pub index: u32,
}

// =============================================================================
// PRE-THROW SNAPSHOT
// =============================================================================

/// Frozen copy of every stone taken just before a throw is added.
#[derive(Clone, Debug, PartialEq)]
pub struct PreThrowSnapshot {
    /// Stones before the throw (the thrown stone is at `stones.len()` afterwards)
    pub stones: Vec<Stone>,
    /// Team throwing
    pub thrower: Team,
    /// Stones thrown in the end before this throw
    pub thrown_before: u32,
}

impl PreThrowSnapshot {
    /// Capture the current stones.
    pub fn capture(stones: &[Stone], thrower: Team, thrown_before: u32) -> Self {
        Self {
            stones: stones.to_vec(),
            thrower,
            thrown_before,
        }
    }

    /// Index of the stone added by this throw.
    #[inline]
    pub fn thrown_index(&self) -> usize {
        self.stones.len()
    }

    /// 1-based number of this throw within the end.
    #[inline]
    pub fn throw_number(&self) -> u32 {
        self.thrown_before + 1
    }
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Active team is choosing a direction
    Aiming,
    /// Direction fixed, power being set
    AimLocked,
    /// Stone in motion, simulation running
    Waiting,
    /// Short pause between throws
    Cooldown,
    /// End scored, pause before the next end
    EndOver,
    /// All ends played
    GameOver,
    /// Opponent left; halted until acknowledged
    Interrupted,
}

impl MatchPhase {
    /// True if a throw may be launched or skipped in this phase.
    #[inline]
    pub fn is_aiming(self) -> bool {
        matches!(self, MatchPhase::Aiming | MatchPhase::AimLocked)
    }

    /// True if nothing more can happen in this match.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchPhase::GameOver | MatchPhase::Interrupted)
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match on one peer.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Ends in the game
    pub total_ends: u32,
    /// Current end (1-based; `total_ends + 1` once the game is over)
    pub current_end: u32,
    /// Aggregate score per team
    pub scores: [u32; 2],
    /// Stones thrown this end per team
    pub stones_thrown: [u32; 2],
    /// Team whose turn it is
    pub current_team: Team,
    /// Team holding last-rock advantage
    pub hammer: Team,
    /// Current phase
    pub phase: MatchPhase,
    /// When the current phase was entered (timer anchor)
    pub phase_started_at: Instant,
    /// Every stone thrown this end, in throw order
    pub stones: Vec<Stone>,
    /// Swept and rough patches
    pub zones: ZoneSet,
    /// Snapshot for the throw in flight
    pub pre_throw: Option<PreThrowSnapshot>,
    /// Sweep energy left for the throw in flight
    pub sweep_energy: f64,
    /// Simulation ticks run for the throw in flight
    pub throw_ticks: u32,
    /// Result of the last completed end
    pub last_end_result: Option<RoundResult>,
    /// Events generated since the last drain
    pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a match positioned before its first end.
    pub fn new(total_ends: u32, hammer: Team, now: Instant) -> Self {
        Self {
            total_ends: total_ends.max(1),
            current_end: 1,
            scores: [0, 0],
            stones_thrown: [0, 0],
            current_team: hammer.other(),
            hammer,
            phase: MatchPhase::Aiming,
            phase_started_at: now,
            stones: Vec::new(),
            zones: ZoneSet::default(),
            pre_throw: None,
            sweep_energy: 0.0,
            throw_ticks: 0,
            last_end_result: None,
            pending_events: Vec::new(),
        }
    }

    /// Stones thrown this end by both teams.
    #[inline]
    pub fn total_thrown(&self) -> u32 {
        self.stones_thrown[0] + self.stones_thrown[1]
    }

    /// True once all stones of the end have been thrown.
    #[inline]
    pub fn end_complete(&self) -> bool {
        self.total_thrown() >= STONES_PER_END
    }

    /// Identity of the next (or in-flight) throw.
    ///
    /// During `EndOver` the end counter has already moved on, so the next
    /// throw is the first of the new end.
    pub fn current_throw(&self) -> ThrowId {
        let index = match (&self.pre_throw, self.phase) {
            (Some(snapshot), _) => snapshot.thrown_before,
            (None, MatchPhase::EndOver) => 0,
            (None, _) => self.total_thrown(),
        };
        ThrowId {
            end: self.current_end,
            index,
        }
    }

    /// True if any active stone is above the stop threshold.
    pub fn any_moving(&self) -> bool {
        self.stones.iter().any(Stone::is_moving)
    }

    /// Score the stones as they lie now (for live display).
    pub fn live_score(&self) -> RoundResult {
        calculate_score(&self.stones)
    }

    /// Winner by aggregate score, `None` on a tie.
    pub fn leader(&self) -> Option<Team> {
        use std::cmp::Ordering;
        match self.scores[0].cmp(&self.scores[1]) {
            Ordering::Greater => Some(Team::Red),
            Ordering::Less => Some(Team::Yellow),
            Ordering::Equal => None,
        }
    }

    /// Time spent in the current phase.
    pub fn phase_elapsed(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.phase_started_at)
    }

    /// Enter a phase and restart its timer.
    pub fn set_phase(&mut self, phase: MatchPhase, now: Instant) {
        let from = self.phase;
        self.phase = phase;
        self.phase_started_at = now;
        if from != phase {
            self.push_event(GameEventData::PhaseChanged { from, to: phase });
        }
    }

    /// Digest of the stone collection.
    pub fn compute_hash(&self) -> StateHash {
        stones_hash(&self.stones)
    }

    /// Queue a game event tagged with the current end.
    pub fn push_event(&mut self, data: GameEventData) {
        self.pending_events.push(GameEvent::new(self.current_end, data));
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_other_and_index() {
        assert_eq!(Team::Red.other(), Team::Yellow);
        assert_eq!(Team::Yellow.other(), Team::Red);
        assert_eq!(Team::Yellow.index(), 1);
        assert_eq!(Team::from_index(0), Some(Team::Red));
        assert_eq!(Team::from_index(2), None);
    }

    #[test]
    fn test_new_match_first_thrower_lacks_hammer() {
        let state = MatchState::new(8, Team::Yellow, Instant::now());
        assert_eq!(state.current_team, Team::Red);
        assert_eq!(state.current_end, 1);
        assert_eq!(state.phase, MatchPhase::Aiming);
        assert_eq!(state.current_throw(), ThrowId { end: 1, index: 0 });
    }

    #[test]
    fn test_retired_stone_is_not_moving() {
        let mut stone = Stone::new(Team::Red, Vec2::new(1.0, 1.0), Vec2::new(0.0, -5.0));
        assert!(stone.is_moving());
        stone.retire();
        assert!(!stone.active);
        assert!(!stone.is_moving());
        assert_eq!(stone.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_find_resting_stone() {
        let spot = Vec2::new(100.0, 400.0);
        let mut stones = vec![
            Stone::at_rest(Team::Yellow, spot),
            Stone::at_rest(Team::Red, spot + Vec2::new(0.6, 0.0)),
        ];
        assert_eq!(find_resting_stone(&stones, Team::Red, spot), Some(1));
        assert_eq!(find_resting_stone(&stones, Team::Yellow, spot), Some(0));
        assert_eq!(find_resting_stone(&stones, Team::Red, spot + Vec2::new(2.0, 0.0)), None);

        stones[1].velocity = Vec2::new(0.0, -3.0);
        assert_eq!(find_resting_stone(&stones, Team::Red, spot), None);
        stones[0].retire();
        assert_eq!(find_resting_stone(&stones, Team::Yellow, spot), None);
    }

    #[test]
    fn test_stones_hash_detects_changes() {
        let a = vec![Stone::at_rest(Team::Red, Vec2::new(10.0, 10.0))];
        let mut b = a.clone();
        assert_eq!(stones_hash(&a), stones_hash(&b));
        b[0].active = false;
        assert_ne!(stones_hash(&a), stones_hash(&b));
    }

    #[test]
    fn test_set_phase_emits_event_once() {
        let now = Instant::now();
        let mut state = MatchState::new(1, Team::Yellow, now);
        state.set_phase(MatchPhase::AimLocked, now);
        state.set_phase(MatchPhase::AimLocked, now);
        let events = state.take_events();
        assert_eq!(events.len(), 1);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_current_throw_after_end() {
        let now = Instant::now();
        let mut state = MatchState::new(8, Team::Yellow, now);
        state.stones_thrown = [8, 8];
        state.current_end = 2;
        state.set_phase(MatchPhase::EndOver, now);
        assert_eq!(state.current_throw(), ThrowId { end: 2, index: 0 });
    }

    #[test]
    fn test_throw_id_ordering() {
        let a = ThrowId { end: 1, index: 15 };
        let b = ThrowId { end: 2, index: 0 };
        assert!(a < b);
        assert!(ThrowId { end: 2, index: 1 } > b);
    }
}
