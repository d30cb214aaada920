//! Match Peer
//!
//! One side of a peer-authoritative match. Each peer runs the full
//! simulation; whichever peer's team is throwing owns that throw:
//!
//! - it draws the launch velocity (and, on the first launch of an end, the
//!   rough ice) and sends them
//! - it alone acts on the aim timer and sends `timeout`
//! - when its simulation settles it sends `sync_stones` and closes the throw
//!
//! The other peer mirrors the launch, streams its sweeps, and closes the
//! throw only after replacing its stones with the owner's snapshot. Both
//! then run the rules on identical input.
//!
//! Nothing in here does I/O. Outgoing messages collect in an outbox that
//! the driver drains after every call.

use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use crate::core::rng::SeededRng;
use crate::core::vec2::Vec2;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::flow::{self, MatchConfig, TimerOutcome};
use crate::game::intent::{launch_velocity, Intent};
use crate::game::scoring::RoundResult;
use crate::game::state::{MatchPhase, MatchState, Stone, Team, ThrowId};
use crate::game::zone::{generate_rough_zones, ZoneSet};
use crate::network::protocol::{GameStateRecord, PeerMessage, StoneSnapshot, ZoneRecord};
use crate::network::sync::{apply_game_state, apply_sync_stones, SyncOutcome, ThrowGate};

// =============================================================================
// VIEW
// =============================================================================

/// Read-only snapshot for a UI, taken once per tick.
#[derive(Clone, Debug)]
pub struct PeerView {
    /// Team this peer plays
    pub local_team: Team,
    /// Current phase
    pub phase: MatchPhase,
    /// Team whose turn it is
    pub current_team: Team,
    /// Current end (1-based)
    pub current_end: u32,
    /// Ends in the game
    pub total_ends: u32,
    /// Aggregate scores
    pub scores: [u32; 2],
    /// Hammer team
    pub hammer: Team,
    /// Stones thrown this end per team
    pub stones_thrown: [u32; 2],
    /// Every stone of the end, retired ones included
    pub stones: Vec<Stone>,
    /// Swept and rough patches
    pub zones: ZoneSet,
    /// Ticks simulated for the throw in flight (drives sweep fade-out)
    pub throw_ticks: u32,
    /// Score if the end stopped now
    pub live_score: RoundResult,
    /// Result of the previous end
    pub last_end_result: Option<RoundResult>,
    /// Sweep energy left
    pub sweep_energy: f64,
    /// Time left to aim, if aiming
    pub aim_time_remaining: Option<Duration>,
    /// Local player may aim and throw
    pub is_my_turn: bool,
    /// Local player may sweep
    pub can_sweep: bool,
    /// Winner once the game is over (`None` on a tie or while playing)
    pub winner: Option<Team>,
}

// =============================================================================
// PEER
// =============================================================================

/// One peer of a match.
pub struct MatchPeer {
    state: MatchState,
    config: MatchConfig,
    local_team: Team,
    rng: SeededRng,
    gate: ThrowGate,
    outbox: Vec<PeerMessage>,
    /// End whose rough ice is installed
    rough_end: Option<u32>,
    /// Game-state record that arrived before our end closed
    pending_game_state: Option<GameStateRecord>,
    acknowledged: bool,
    desyncs: u32,
}

impl MatchPeer {
    /// Create a peer for `local_team` with an explicit rng seed.
    pub fn new(local_team: Team, config: MatchConfig, seed: u64, now: Instant) -> Self {
        let state = flow::new_match(&config, now);
        Self {
            state,
            config,
            local_team,
            rng: SeededRng::new(seed),
            gate: ThrowGate::default(),
            outbox: Vec::new(),
            rough_end: None,
            pending_game_state: None,
            acknowledged: false,
            desyncs: 0,
        }
    }

    /// Create a peer seeded from fresh entropy.
    pub fn with_entropy(local_team: Team, config: MatchConfig, now: Instant) -> Self {
        let mut peer = Self::new(local_team, config, 0, now);
        peer.rng = SeededRng::from_entropy();
        peer
    }

    /// Team played locally.
    pub fn local_team(&self) -> Team {
        self.local_team
    }

    /// Match state (read-only).
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Match configuration.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// True if the local team owns the current throw.
    pub fn is_owner(&self) -> bool {
        self.state.current_team == self.local_team
    }

    /// Sync-stones snapshots that differed from the local simulation.
    pub fn desync_count(&self) -> u32 {
        self.desyncs
    }

    /// True once the match can no longer progress.
    pub fn is_finished(&self) -> bool {
        self.state.phase.is_terminal()
    }

    /// True after an interruption has been acknowledged; the driver should
    /// go back to the lobby.
    pub fn should_return_to_lobby(&self) -> bool {
        self.acknowledged
    }

    /// Take queued outgoing messages.
    pub fn drain_outbox(&mut self) -> Vec<PeerMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Take game events since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        let events = self.state.take_events();
        for event in &events {
            match &event.data {
                GameEventData::EndScored { end, result, scores, .. } => {
                    info!(end, team = ?result.team, points = result.points, ?scores, "end scored");
                }
                GameEventData::GameOver { winner, scores } => {
                    info!(?winner, ?scores, "game over");
                }
                GameEventData::MatchInterrupted => info!("match interrupted"),
                other => debug!(end = event.end, event = ?other, "game event"),
            }
        }
        events
    }

    // =========================================================================
    // INTENTS
    // =========================================================================

    /// Apply a UI intent. Returns false if it was ignored.
    pub fn handle_intent(&mut self, intent: Intent, now: Instant) -> bool {
        let Some(intent) = intent.sanitize() else {
            debug!(?intent, "non-finite intent ignored");
            return false;
        };
        let applied = match intent {
            Intent::LockAim => self.lock_aim(now),
            Intent::ConfirmThrow { direction, power } => self.confirm_throw(direction, power, now),
            Intent::CancelAim => self.cancel_aim(now),
            Intent::Sweep { x, y } => self.sweep(Vec2::new(x, y)),
            Intent::AcknowledgeInterrupt => self.acknowledge_interrupt(),
        };
        if !applied {
            debug!(?intent, phase = ?self.state.phase, "intent ignored");
        }
        applied
    }

    /// Fix the aim direction.
    pub fn lock_aim(&mut self, now: Instant) -> bool {
        flow::lock_aim(&mut self.state, self.local_team, now)
    }

    /// Release a locked aim.
    pub fn cancel_aim(&mut self, now: Instant) -> bool {
        flow::cancel_aim(&mut self.state, self.local_team, now)
    }

    /// Throw the local team's stone.
    pub fn confirm_throw(&mut self, direction: f64, power: f64, now: Instant) -> bool {
        if !self.is_owner() || self.state.phase != MatchPhase::AimLocked {
            return false;
        }

        let throw = self.state.current_throw();
        let rough_zones = if self.rough_end != Some(throw.end) {
            let zones = generate_rough_zones(&mut self.rng);
            self.state.zones.set_rough(zones);
            self.rough_end = Some(throw.end);
            Some(self.state.zones.rough.iter().map(ZoneRecord::from).collect())
        } else {
            None
        };

        let velocity = launch_velocity(direction, power, &mut self.rng);
        if !flow::launch_stone(&mut self.state, &self.config, self.local_team, velocity, power, now) {
            return false;
        }

        debug!(?throw, ?velocity, power, "stone launched");
        self.outbox.push(PeerMessage::Launch {
            throw,
            team: self.local_team as u8,
            velocity: velocity.to_array(),
            power,
            rough_zones,
        });
        self.replay_held(now);
        true
    }

    /// Sweep at a sheet position while the opponent's stone is moving.
    pub fn sweep(&mut self, position: Vec2) -> bool {
        if !flow::apply_sweep(&mut self.state, &self.config, self.local_team, position) {
            return false;
        }
        self.outbox.push(PeerMessage::Sweep {
            throw: self.state.current_throw(),
            team: self.local_team as u8,
            position: position.to_array(),
        });
        true
    }

    /// Dismiss the opponent-left notice.
    pub fn acknowledge_interrupt(&mut self) -> bool {
        if self.state.phase != MatchPhase::Interrupted {
            return false;
        }
        self.acknowledged = true;
        true
    }

    /// The opponent left the lobby or disconnected.
    pub fn opponent_left(&mut self, now: Instant) -> bool {
        let interrupted = flow::interrupt(&mut self.state, now);
        if interrupted {
            self.gate.clear();
            self.outbox.clear();
        }
        interrupted
    }

    // =========================================================================
    // INCOMING MESSAGES
    // =========================================================================

    /// Handle a message from the other peer.
    #[instrument(level = "debug", skip(self, message, now), fields(team = ?self.local_team, kind = message.kind()))]
    pub fn handle_message(&mut self, message: PeerMessage, now: Instant) {
        match self.state.phase {
            MatchPhase::Interrupted => return,
            MatchPhase::GameOver if !matches!(message, PeerMessage::GameState(_)) => return,
            _ => {}
        }

        let Some(message) = message.sanitize() else {
            debug!("malformed message ignored");
            return;
        };

        if let Some(message) = self.gate.admit(message, self.state.current_throw()) {
            self.apply(message, now);
        }
    }

    fn apply(&mut self, message: PeerMessage, now: Instant) {
        match message {
            PeerMessage::Launch { team, velocity, power, rough_zones, .. } => {
                self.apply_launch(team, velocity, power, rough_zones, now);
            }
            PeerMessage::Sweep { team, position, .. } => {
                if self.state.phase != MatchPhase::Waiting {
                    self.gate.defer(message);
                    return;
                }
                if let Some(team) = Team::from_index(team) {
                    if team != self.local_team {
                        flow::apply_sweep(&mut self.state, &self.config, team, Vec2::from_array(position));
                    }
                }
            }
            PeerMessage::SyncStones(snapshot) => {
                if self.state.phase != MatchPhase::Waiting {
                    self.gate.defer(PeerMessage::SyncStones(snapshot));
                    return;
                }
                if self.is_owner() {
                    debug!("sync-stones for own throw ignored");
                    return;
                }
                match apply_sync_stones(&mut self.state, &snapshot) {
                    SyncOutcome::Rejected => return,
                    SyncOutcome::Corrected => self.desyncs += 1,
                    SyncOutcome::InSync => {}
                }
                self.close_throw(now);
            }
            PeerMessage::Timeout { team, .. } => {
                let Some(team) = Team::from_index(team) else { return };
                if team == self.local_team || team != self.state.current_team {
                    return;
                }
                self.catch_up(now);
                if flow::skip_turn(&mut self.state, team, now) {
                    debug!(?team, "opponent timed out");
                    self.after_turn(false, now);
                }
            }
            PeerMessage::GameState(record) => {
                if !apply_game_state(&mut self.state, &record) {
                    self.pending_game_state = Some(record);
                }
            }
        }
    }

    fn apply_launch(
        &mut self,
        team: u8,
        velocity: [f64; 2],
        power: f64,
        rough_zones: Option<Vec<ZoneRecord>>,
        now: Instant,
    ) {
        let Some(team) = Team::from_index(team) else { return };
        if team == self.local_team || team != self.state.current_team {
            debug!(?team, "launch from wrong team ignored");
            return;
        }

        self.catch_up(now);
        if let Some(zones) = rough_zones {
            self.state.zones.set_rough(zones.iter().map(ZoneRecord::to_zone));
            self.rough_end = Some(self.state.current_end);
        }

        let velocity = Vec2::from_array(velocity);
        if flow::launch_stone(&mut self.state, &self.config, team, velocity, power, now) {
            self.replay_held(now);
        }
    }

    /// The owner has already moved past a pause we are still sitting in.
    fn catch_up(&mut self, now: Instant) {
        match self.state.phase {
            MatchPhase::Cooldown => self.state.set_phase(MatchPhase::Aiming, now),
            MatchPhase::EndOver if self.state.current_end <= self.state.total_ends => {
                flow::begin_end(&mut self.state, now);
            }
            _ => {}
        }
    }

    fn replay_held(&mut self, now: Instant) {
        let current = self.state.current_throw();
        for message in self.gate.release(current) {
            self.apply(message, now);
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advance the peer by one fixed step.
    pub fn tick(&mut self, now: Instant) {
        if self.state.phase.is_terminal() {
            return;
        }

        match flow::update_timers(&mut self.state, &self.config, now) {
            TimerOutcome::AimExpired(team) if team == self.local_team => {
                let throw = self.state.current_throw();
                if flow::skip_turn(&mut self.state, team, now) {
                    debug!(?throw, "aim timer expired, turn skipped");
                    self.outbox.push(PeerMessage::Timeout { throw, team: team as u8 });
                    self.after_turn(true, now);
                }
            }
            TimerOutcome::TurnStarted | TimerOutcome::EndStarted => self.replay_held(now),
            _ => {}
        }

        if self.state.phase != MatchPhase::Waiting {
            return;
        }

        if !flow::throw_settled(&self.state, &self.config) {
            let _result = flow::step_throw(&mut self.state);
            #[cfg(feature = "debug-tracing")]
            tracing::trace!(
                tick = self.state.throw_ticks,
                moving = _result.any_moving,
                contacts = _result.contacts,
                "throw step"
            );
        }

        if self.is_owner() && flow::throw_settled(&self.state, &self.config) {
            let snapshot = StoneSnapshot::capture(self.state.current_throw(), &self.state.stones);
            debug!(throw = ?snapshot.throw, hash = %&snapshot.state_hash[..16], "throw settled");
            self.outbox.push(PeerMessage::SyncStones(snapshot));
            self.close_throw(now);
        }
    }

    fn close_throw(&mut self, now: Instant) {
        let owned = self.is_owner();
        if flow::finish_throw(&mut self.state, now) {
            self.after_turn(owned, now);
        }
    }

    /// Bookkeeping after a throw was finished or skipped.
    fn after_turn(&mut self, owned: bool, now: Instant) {
        if self.state.phase == MatchPhase::EndOver {
            if owned {
                self.outbox.push(PeerMessage::GameState(GameStateRecord::from_state(&self.state)));
            }
            if let Some(record) = self.pending_game_state.take() {
                apply_game_state(&mut self.state, &record);
            }
        }
        self.replay_held(now);
    }

    /// Identity of the throw in flight or next to be thrown.
    pub fn current_throw(&self) -> ThrowId {
        self.state.current_throw()
    }

    /// Snapshot for the UI.
    pub fn view(&self, now: Instant) -> PeerView {
        let state = &self.state;
        PeerView {
            local_team: self.local_team,
            phase: state.phase,
            current_team: state.current_team,
            current_end: state.current_end,
            total_ends: state.total_ends,
            scores: state.scores,
            hammer: state.hammer,
            stones_thrown: state.stones_thrown,
            stones: state.stones.clone(),
            zones: state.zones.clone(),
            throw_ticks: state.throw_ticks,
            live_score: state.live_score(),
            last_end_result: state.last_end_result,
            sweep_energy: state.sweep_energy,
            aim_time_remaining: if self.is_owner() {
                flow::aim_time_remaining(state, &self.config, now)
            } else {
                None
            },
            is_my_turn: self.is_owner() && state.phase.is_aiming(),
            can_sweep: !self.is_owner()
                && state.phase == MatchPhase::Waiting
                && state.sweep_energy >= self.config.sweep_cost,
            winner: if state.phase == MatchPhase::GameOver { state.leader() } else { None },
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
