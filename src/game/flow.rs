//! Match State Machine
//!
//! Turn order, end transitions and phase timers. Every operation is a free
//! function over `&mut MatchState` and returns whether it was applied, so
//! an intent arriving in the wrong phase or from the wrong team is simply
//! ignored with no state change.
//!
//! ```text
//! Aiming ──lock──► AimLocked ──confirm──► Waiting ──settled──► Cooldown ──► Aiming
//!   ▲                 │                      │
//!   └─────cancel──────┘                      └──16th stone──► EndOver ──► Aiming (next end)
//!                                                                  └────► GameOver
//! ```

use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::events::GameEventData;
use crate::game::rules::{enforce_free_guard_zone, enforce_hog_line};
use crate::game::scoring::{calculate_score, RoundResult};
use crate::game::state::{MatchPhase, MatchState, PreThrowSnapshot, Stone, Team};
use crate::game::surface::{hack, MAX_LAUNCH_SPEED, STONES_PER_TEAM};
use crate::game::tick::{step, TickResult};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Match configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Ends in the game
    pub total_ends: u32,
    /// Team holding the hammer in the first end
    pub initial_hammer: Team,
    /// Time allowed in `Aiming`
    pub aim_time_limit: Duration,
    /// Time allowed in `AimLocked`
    pub locked_time_limit: Duration,
    /// Pause between throws
    pub cooldown: Duration,
    /// Pause after an end is scored
    pub end_pause: Duration,
    /// Sweep energy available per throw
    pub sweep_energy_budget: f64,
    /// Energy spent per accepted sweep zone
    pub sweep_cost: f64,
    /// Hard cap on simulation ticks per throw
    pub max_throw_ticks: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            total_ends: 8,
            initial_hammer: Team::Yellow,
            aim_time_limit: Duration::from_secs(20),
            locked_time_limit: Duration::from_secs(30),
            cooldown: Duration::from_millis(1500),
            end_pause: Duration::from_secs(3),
            sweep_energy_budget: 100.0,
            sweep_cost: 2.0,
            max_throw_ticks: 60 * 60, // one minute @ 60Hz
        }
    }
}

/// What a timer check did (or, for aim expiry, asks the caller to do).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Nothing due
    Idle,
    /// Aim timer ran out for this team; the throw owner should skip it
    AimExpired(Team),
    /// Cooldown finished, next throw is being aimed
    TurnStarted,
    /// End pause finished, next end started
    EndStarted,
    /// End pause finished after the last end
    GameOver,
}

// =============================================================================
// MATCH LIFECYCLE
// =============================================================================

/// Create a match in its first end.
pub fn new_match(config: &MatchConfig, now: Instant) -> MatchState {
    let mut state = MatchState::new(config.total_ends, config.initial_hammer, now);
    begin_end(&mut state, now);
    state
}

/// Reset the sheet for `state.current_end`.
///
/// The team without the hammer throws first.
pub fn begin_end(state: &mut MatchState, now: Instant) {
    state.stones.clear();
    state.zones.clear();
    state.stones_thrown = [0, 0];
    state.pre_throw = None;
    state.sweep_energy = 0.0;
    state.throw_ticks = 0;
    state.current_team = state.hammer.other();
    state.set_phase(MatchPhase::Aiming, now);
    debug!(end = state.current_end, first = ?state.current_team, "end started");
}

/// Halt the match after the opponent left.
pub fn interrupt(state: &mut MatchState, now: Instant) -> bool {
    if state.phase.is_terminal() {
        return false;
    }
    // Last end already scored: the game is over, not interrupted
    if state.phase == MatchPhase::EndOver && state.current_end > state.total_ends {
        finish_game(state, now);
        return false;
    }
    state.pre_throw = None;
    state.set_phase(MatchPhase::Interrupted, now);
    state.push_event(GameEventData::MatchInterrupted);
    true
}

fn finish_game(state: &mut MatchState, now: Instant) {
    state.set_phase(MatchPhase::GameOver, now);
    let winner = state.leader();
    let scores = state.scores;
    state.push_event(GameEventData::GameOver { winner, scores });
    debug!(?winner, ?scores, "game over");
}

// =============================================================================
// AIMING
// =============================================================================

/// Fix the aim direction.
pub fn lock_aim(state: &mut MatchState, team: Team, now: Instant) -> bool {
    if state.phase != MatchPhase::Aiming || team != state.current_team {
        return false;
    }
    state.set_phase(MatchPhase::AimLocked, now);
    true
}

/// Release a locked aim.
pub fn cancel_aim(state: &mut MatchState, team: Team, now: Instant) -> bool {
    if state.phase != MatchPhase::AimLocked || team != state.current_team {
        return false;
    }
    state.set_phase(MatchPhase::Aiming, now);
    true
}

/// Put a stone into play from the hack.
///
/// Snapshots the stones for the guard zone rule, clears last throw's swept
/// zones and refills the sweep budget.
pub fn launch_stone(
    state: &mut MatchState,
    config: &MatchConfig,
    team: Team,
    velocity: Vec2,
    power: f64,
    now: Instant,
) -> bool {
    if !state.phase.is_aiming()
        || team != state.current_team
        || state.stones_thrown[team.index()] >= STONES_PER_TEAM
        || !velocity.is_finite()
    {
        return false;
    }

    let velocity = velocity.clamp_length(MAX_LAUNCH_SPEED);
    state.pre_throw = Some(PreThrowSnapshot::capture(&state.stones, team, state.total_thrown()));
    state.zones.clear_swept();
    state.stones.push(Stone::new(team, hack(), velocity));
    state.sweep_energy = config.sweep_energy_budget;
    state.throw_ticks = 0;
    state.set_phase(MatchPhase::Waiting, now);
    state.push_event(GameEventData::ThrowLaunched {
        team,
        velocity,
        power: if power.is_finite() { power.clamp(0.0, 1.0) } else { 0.0 },
    });
    true
}

/// Skip the current team's throw after its aim timer expired.
///
/// The stone counts as thrown.
pub fn skip_turn(state: &mut MatchState, team: Team, now: Instant) -> bool {
    if !state.phase.is_aiming() || team != state.current_team {
        return false;
    }
    state.push_event(GameEventData::TurnSkipped { team });
    advance_turn(state, team, now);
    true
}

// =============================================================================
// THROW IN FLIGHT
// =============================================================================

/// Lay a sweep zone for the throw in flight.
///
/// Only the team that did not throw may sweep, and only while it has
/// energy left.
pub fn apply_sweep(state: &mut MatchState, config: &MatchConfig, team: Team, position: Vec2) -> bool {
    if state.phase != MatchPhase::Waiting
        || team == state.current_team
        || state.sweep_energy < config.sweep_cost
    {
        return false;
    }
    if !state.zones.add_sweep_zone(position, state.throw_ticks) {
        return false;
    }
    state.sweep_energy -= config.sweep_cost;
    true
}

/// Run one simulation tick for the throw in flight.
pub fn step_throw(state: &mut MatchState) -> TickResult {
    if state.phase != MatchPhase::Waiting {
        return TickResult::default();
    }

    let result = step(&mut state.stones, &state.zones, state.current_end);
    state.throw_ticks = state.throw_ticks.saturating_add(1);

    for &index in &result.retired {
        let stone = state.stones[index];
        state.push_event(GameEventData::StoneOutOfPlay {
            team: stone.team,
            position: stone.position,
        });
    }
    result
}

/// True if the throw in flight has settled or hit the tick cap.
pub fn throw_settled(state: &MatchState, config: &MatchConfig) -> bool {
    state.phase == MatchPhase::Waiting
        && (!state.any_moving() || state.throw_ticks >= config.max_throw_ticks)
}

/// Close out a settled throw: apply the rules and pass the turn.
///
/// Any residual motion is stopped first, so the rules always see a sheet
/// at rest.
pub fn finish_throw(state: &mut MatchState, now: Instant) -> bool {
    if state.phase != MatchPhase::Waiting {
        return false;
    }
    let Some(snapshot) = state.pre_throw.take() else {
        return false;
    };

    for stone in state.stones.iter_mut() {
        stone.velocity = Vec2::ZERO;
    }

    let guard = enforce_free_guard_zone(&mut state.stones, &snapshot);
    for restore in &guard.restored {
        state.push_event(GameEventData::GuardRestored {
            team: restore.team,
            position: restore.position,
            recreated: restore.recreated,
        });
    }
    if guard.penalized {
        state.push_event(GameEventData::GuardZonePenalty { thrower: snapshot.thrower });
    }

    for index in enforce_hog_line(&mut state.stones) {
        let stone = state.stones[index];
        debug!(team = ?stone.team, y = stone.position.y, "hog line violation");
        state.push_event(GameEventData::HogLineViolation {
            team: stone.team,
            position: stone.position,
        });
    }

    state.sweep_energy = 0.0;
    advance_turn(state, snapshot.thrower, now);
    true
}

fn advance_turn(state: &mut MatchState, thrower: Team, now: Instant) {
    let thrown = &mut state.stones_thrown[thrower.index()];
    *thrown = (*thrown + 1).min(STONES_PER_TEAM);

    if state.end_complete() {
        complete_end(state, now);
        return;
    }

    let other = thrower.other();
    state.current_team = if state.stones_thrown[other.index()] < STONES_PER_TEAM {
        other
    } else {
        thrower
    };
    state.set_phase(MatchPhase::Cooldown, now);
}

fn complete_end(state: &mut MatchState, now: Instant) {
    let result = calculate_score(&state.stones);
    record_end(state, result, now);
}

/// Apply an end result: hammer, scores, end counter, `EndOver`.
///
/// The hammer passes to the team that did not score and stays put on a
/// blank end.
pub fn record_end(state: &mut MatchState, result: RoundResult, now: Instant) {
    if let (Some(team), false) = (result.team, result.is_blank()) {
        state.scores[team.index()] += result.points;
        state.hammer = team.other();
    }

    let end = state.current_end;
    state.last_end_result = Some(result);
    state.current_end += 1;
    state.push_event(GameEventData::EndScored {
        end,
        result,
        scores: state.scores,
        hammer: state.hammer,
    });
    state.set_phase(MatchPhase::EndOver, now);
    debug!(end, ?result, scores = ?state.scores, "end scored");
}

// =============================================================================
// TIMERS
// =============================================================================

/// Check phase timers.
///
/// Cooldown and end pauses advance on their own. Aim expiry is reported
/// but not applied: only the peer owning the throw may skip it.
pub fn update_timers(state: &mut MatchState, config: &MatchConfig, now: Instant) -> TimerOutcome {
    let elapsed = state.phase_elapsed(now);
    match state.phase {
        MatchPhase::Aiming if elapsed >= config.aim_time_limit => {
            TimerOutcome::AimExpired(state.current_team)
        }
        MatchPhase::AimLocked if elapsed >= config.locked_time_limit => {
            TimerOutcome::AimExpired(state.current_team)
        }
        MatchPhase::Cooldown if elapsed >= config.cooldown => {
            state.set_phase(MatchPhase::Aiming, now);
            TimerOutcome::TurnStarted
        }
        MatchPhase::EndOver if elapsed >= config.end_pause => {
            if state.current_end > state.total_ends {
                finish_game(state, now);
                TimerOutcome::GameOver
            } else {
                begin_end(state, now);
                TimerOutcome::EndStarted
            }
        }
        _ => TimerOutcome::Idle,
    }
}

/// Time left on the aim timer, if aiming.
pub fn aim_time_remaining(state: &MatchState, config: &MatchConfig, now: Instant) -> Option<Duration> {
    let limit = match state.phase {
        MatchPhase::Aiming => config.aim_time_limit,
        MatchPhase::AimLocked => config.locked_time_limit,
        _ => return None,
    };
    Some(limit.saturating_sub(state.phase_elapsed(now)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::surface::{button, BUTTON_X, STONES_PER_END};

    fn quick_config() -> MatchConfig {
        MatchConfig {
            total_ends: 2,
            cooldown: Duration::ZERO,
            end_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    fn play_throw(state: &mut MatchState, config: &MatchConfig, velocity: Vec2, now: Instant) {
        let team = state.current_team;
        assert!(launch_stone(state, config, team, velocity, 0.5, now));
        while !throw_settled(state, config) {
            step_throw(state);
        }
        assert!(finish_throw(state, now));
    }

    #[test]
    fn test_turns_alternate_until_end_over() {
        let config = quick_config();
        let now = Instant::now();
        let mut state = new_match(&config, now);

        for n in 0..STONES_PER_END {
            assert!(state.phase.is_aiming(), "throw {} not aimable", n);
            let expected = if n % 2 == 0 { Team::Red } else { Team::Yellow };
            assert_eq!(state.current_team, expected);
            assert!(skip_turn(&mut state, expected, now));
            if n + 1 < STONES_PER_END {
                assert_eq!(state.phase, MatchPhase::Cooldown);
                assert_eq!(update_timers(&mut state, &config, now), TimerOutcome::TurnStarted);
            }
        }

        assert_eq!(state.phase, MatchPhase::EndOver);
        assert_eq!(state.stones_thrown, [STONES_PER_TEAM, STONES_PER_TEAM]);
        assert_eq!(state.current_end, 2);
    }

    #[test]
    fn test_team_with_stones_left_throws_out_the_end() {
        let config = quick_config();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        state.stones_thrown = [STONES_PER_TEAM, 5];
        state.current_team = Team::Yellow;

        play_throw(&mut state, &config, Vec2::new(0.0, -2.0), now);
        assert_eq!(state.stones_thrown, [STONES_PER_TEAM, 6]);
        assert_eq!(state.current_team, Team::Yellow);
        assert_eq!(state.phase, MatchPhase::Cooldown);

        for thrown in 6..STONES_PER_TEAM {
            assert_eq!(update_timers(&mut state, &config, now), TimerOutcome::TurnStarted);
            assert_eq!(state.phase, MatchPhase::Aiming);
            assert_eq!(state.current_team, Team::Yellow);
            assert!(!skip_turn(&mut state, Team::Red, now));
            assert!(skip_turn(&mut state, Team::Yellow, now));
            assert_eq!(state.stones_thrown[Team::Yellow.index()], thrown + 1);
        }

        assert_eq!(state.phase, MatchPhase::EndOver);
        assert_eq!(state.stones_thrown, [STONES_PER_TEAM, STONES_PER_TEAM]);
        assert_eq!(state.current_end, 2);
    }

    #[test]
    fn test_wrong_team_and_phase_ignored() {
        let config = MatchConfig::default();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        state.take_events();

        assert!(!lock_aim(&mut state, Team::Yellow, now));
        assert!(!cancel_aim(&mut state, Team::Red, now));
        assert!(!launch_stone(&mut state, &config, Team::Yellow, Vec2::new(0.0, -9.0), 1.0, now));
        assert!(!apply_sweep(&mut state, &config, Team::Yellow, button()));
        assert!(!finish_throw(&mut state, now));
        assert!(!launch_stone(&mut state, &config, Team::Red, Vec2::new(f64::NAN, -9.0), 1.0, now));

        assert_eq!(state.phase, MatchPhase::Aiming);
        assert!(state.stones.is_empty());
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_lock_and_cancel() {
        let config = MatchConfig::default();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        assert!(lock_aim(&mut state, Team::Red, now));
        assert_eq!(state.phase, MatchPhase::AimLocked);
        assert!(cancel_aim(&mut state, Team::Red, now));
        assert_eq!(state.phase, MatchPhase::Aiming);
    }

    #[test]
    fn test_aim_expiry_reported_not_applied() {
        let config = MatchConfig::default();
        let start = Instant::now();
        let mut state = new_match(&config, start);

        assert_eq!(update_timers(&mut state, &config, start), TimerOutcome::Idle);
        let late = start + config.aim_time_limit;
        assert_eq!(update_timers(&mut state, &config, late), TimerOutcome::AimExpired(Team::Red));
        assert_eq!(state.phase, MatchPhase::Aiming);

        // Locked aim gets the longer limit
        assert!(lock_aim(&mut state, Team::Red, late));
        let later = late + config.aim_time_limit;
        assert_eq!(update_timers(&mut state, &config, later), TimerOutcome::Idle);
        assert_eq!(
            aim_time_remaining(&state, &config, later),
            Some(config.locked_time_limit - config.aim_time_limit)
        );
    }

    #[test]
    fn test_launch_sets_up_throw() {
        let config = MatchConfig::default();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        state.zones.add_sweep_zone(Vec2::new(BUTTON_X, 600.0), 0);

        assert!(launch_stone(&mut state, &config, Team::Red, Vec2::new(0.0, -50.0), 1.0, now));

        assert_eq!(state.phase, MatchPhase::Waiting);
        assert_eq!(state.stones.len(), 1);
        assert_eq!(state.stones[0].position, hack());
        assert!(state.stones[0].speed() <= MAX_LAUNCH_SPEED + 1e-9);
        assert!(state.zones.swept.is_empty());
        assert_eq!(state.sweep_energy, config.sweep_energy_budget);
        assert_eq!(state.pre_throw.as_ref().map(|s| s.thrown_before), Some(0));
    }

    #[test]
    fn test_only_non_thrower_sweeps() {
        let config = MatchConfig::default();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        launch_stone(&mut state, &config, Team::Red, Vec2::new(0.0, -9.0), 0.5, now);

        assert!(!apply_sweep(&mut state, &config, Team::Red, Vec2::new(BUTTON_X, 900.0)));
        assert!(apply_sweep(&mut state, &config, Team::Yellow, Vec2::new(BUTTON_X, 900.0)));
        assert_eq!(state.sweep_energy, config.sweep_energy_budget - config.sweep_cost);
        // Too close to the previous zone
        assert!(!apply_sweep(&mut state, &config, Team::Yellow, Vec2::new(BUTTON_X, 902.0)));
        assert_eq!(state.zones.swept.len(), 1);
    }

    #[test]
    fn test_sweep_energy_runs_out() {
        let config = MatchConfig {
            sweep_energy_budget: 4.0,
            ..Default::default()
        };
        let now = Instant::now();
        let mut state = new_match(&config, now);
        launch_stone(&mut state, &config, Team::Red, Vec2::new(0.0, -9.0), 0.5, now);

        let accepted = (0..10)
            .filter(|i| apply_sweep(&mut state, &config, Team::Yellow, Vec2::new(BUTTON_X, 1000.0 - 30.0 * *i as f64)))
            .count();
        assert_eq!(accepted, 2);
    }

    #[test]
    fn test_short_throw_retired_at_hog_line() {
        let config = quick_config();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        play_throw(&mut state, &config, Vec2::new(0.0, -2.0), now);

        assert!(!state.stones[0].active);
        assert_eq!(state.stones_thrown, [1, 0]);
        assert_eq!(state.current_team, Team::Yellow);
        assert!(state
            .take_events()
            .iter()
            .any(|e| matches!(e.data, GameEventData::HogLineViolation { .. })));
    }

    #[test]
    fn test_end_scoring_moves_hammer() {
        let now = Instant::now();
        let mut state = new_match(&quick_config(), now);
        assert_eq!(state.hammer, Team::Yellow);

        record_end(&mut state, RoundResult { team: Some(Team::Yellow), points: 2 }, now);
        assert_eq!(state.scores, [0, 2]);
        assert_eq!(state.hammer, Team::Red);

        record_end(&mut state, RoundResult::BLANK, now);
        assert_eq!(state.hammer, Team::Red);
        assert_eq!(state.scores, [0, 2]);
        assert_eq!(state.current_end, 3);
    }

    #[test]
    fn test_next_end_non_hammer_throws_first() {
        let config = quick_config();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        state.stones.push(Stone::at_rest(Team::Red, button()));
        record_end(&mut state, RoundResult { team: Some(Team::Red), points: 1 }, now);

        assert_eq!(update_timers(&mut state, &config, now), TimerOutcome::EndStarted);
        assert!(state.stones.is_empty());
        assert_eq!(state.hammer, Team::Yellow);
        assert_eq!(state.current_team, Team::Red);
        assert_eq!(state.phase, MatchPhase::Aiming);
    }

    #[test]
    fn test_game_over_after_last_end() {
        let config = quick_config();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        record_end(&mut state, RoundResult { team: Some(Team::Red), points: 3 }, now);
        update_timers(&mut state, &config, now);
        record_end(&mut state, RoundResult { team: Some(Team::Yellow), points: 1 }, now);
        state.take_events();

        assert_eq!(update_timers(&mut state, &config, now), TimerOutcome::GameOver);
        assert_eq!(state.phase, MatchPhase::GameOver);
        let events = state.take_events();
        assert!(events.iter().any(|e| e.data == GameEventData::GameOver {
            winner: Some(Team::Red),
            scores: [3, 1],
        }));
    }

    #[test]
    fn test_interrupt_after_last_end_finishes_game() {
        let config = MatchConfig { total_ends: 1, ..Default::default() };
        let now = Instant::now();
        let mut state = new_match(&config, now);
        record_end(&mut state, RoundResult { team: Some(Team::Red), points: 2 }, now);
        assert_eq!(state.phase, MatchPhase::EndOver);

        assert!(!interrupt(&mut state, now));
        assert_eq!(state.phase, MatchPhase::GameOver);
        assert_eq!(state.leader(), Some(Team::Red));
    }

    #[test]
    fn test_interrupt_is_terminal() {
        let config = MatchConfig::default();
        let now = Instant::now();
        let mut state = new_match(&config, now);
        assert!(interrupt(&mut state, now));
        assert!(!interrupt(&mut state, now));
        assert!(!lock_aim(&mut state, Team::Red, now));
        assert_eq!(update_timers(&mut state, &config, now + Duration::from_secs(600)), TimerOutcome::Idle);
    }
}
