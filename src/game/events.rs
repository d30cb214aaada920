//! Game Events
//!
//! Things that happened during a match, queued on the `MatchState` and
//! drained by the peer for logging and by the UI for effects.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::scoring::RoundResult;
use crate::game::state::{MatchPhase, Team};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventData {
    /// Phase transition
    PhaseChanged {
        from: MatchPhase,
        to: MatchPhase,
    },

    /// A stone was put into play
    ThrowLaunched {
        team: Team,
        velocity: Vec2,
        power: f64,
    },

    /// Aim timer ran out; the stone counts as thrown
    TurnSkipped {
        team: Team,
    },

    /// A stone left the sheet
    StoneOutOfPlay {
        team: Team,
        position: Vec2,
    },

    /// A protected guard was put back where it was
    GuardRestored {
        team: Team,
        position: Vec2,
        /// The guard had left play and was re-created
        recreated: bool,
    },

    /// The thrown stone was removed for breaking the free guard zone rule
    GuardZonePenalty {
        thrower: Team,
    },

    /// A stone stopped short of the hog line
    HogLineViolation {
        team: Team,
        position: Vec2,
    },

    /// An end was scored
    EndScored {
        end: u32,
        result: RoundResult,
        scores: [u32; 2],
        hammer: Team,
    },

    /// The game finished
    GameOver {
        winner: Option<Team>,
        scores: [u32; 2],
    },

    /// The opponent left mid-match
    MatchInterrupted,
}

/// A game event tagged with the end it happened in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// End number
    pub end: u32,
    /// Event payload
    pub data: GameEventData,
}

impl GameEvent {
    /// Create an event.
    pub fn new(end: u32, data: GameEventData) -> Self {
        Self { end, data }
    }

    /// True for events that end or interrupt the match.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.data,
            GameEventData::GameOver { .. } | GameEventData::MatchInterrupted
        )
    }
}
