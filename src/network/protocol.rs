//! Protocol Messages
//!
//! Two layers of wire types:
//!
//! - [`PeerMessage`]: the peer-to-peer game protocol. Only clients decode
//!   these; inside the envelope they travel as an opaque JSON payload.
//! - [`ClientMessage`] / [`ServerMessage`]: the client-relay envelope
//!   (lobby membership and forwarding).
//!
//! All messages are serialized as JSON text frames. Snapshot digests cover
//! exact f64 bits, so floats must read back bit for bit (`serde_json` is
//! built with `float_roundtrip`). Flat payloads (stone snapshots, game-state
//! records) also have bincode helpers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::state::{stones_hash, MatchState, Stone, Team, ThrowId};
use crate::game::surface::{MAX_LAUNCH_SPEED, ROUGH_RADIUS_MAX, ROUGH_ZONE_COUNT_MAX, STONE_RADIUS};
use crate::game::zone::Zone;

/// Most stones a sync-stones snapshot may carry. A full end is 16 throws
/// plus any guards re-created by the free guard zone rule.
pub const MAX_SNAPSHOT_STONES: usize = 64;

/// Most ends a game-state record may announce.
pub const MAX_TOTAL_ENDS: u32 = 64;

// =============================================================================
// RECORDS
// =============================================================================

/// A stone on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoneRecord {
    /// Team index (0 = red, 1 = yellow)
    pub team: u8,
    /// Center position
    pub position: [f64; 2],
    /// Velocity
    pub velocity: [f64; 2],
    /// Still in play
    pub active: bool,
}

impl From<&Stone> for StoneRecord {
    fn from(stone: &Stone) -> Self {
        Self {
            team: stone.team as u8,
            position: stone.position.to_array(),
            velocity: stone.velocity.to_array(),
            active: stone.active,
        }
    }
}

impl StoneRecord {
    /// Convert to a stone, refusing bad team ids and non-finite numbers.
    pub fn to_stone(&self) -> Option<Stone> {
        let team = Team::from_index(self.team)?;
        let position = Vec2::from_array(self.position);
        let velocity = Vec2::from_array(self.velocity);
        if !position.is_finite() || !velocity.is_finite() {
            return None;
        }
        Some(Stone {
            team,
            position,
            velocity: velocity.clamp_length(MAX_LAUNCH_SPEED),
            radius: STONE_RADIUS,
            active: self.active,
        })
    }
}

/// A rough patch on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Center position
    pub center: [f64; 2],
    /// Radius
    pub radius: f64,
}

impl From<&Zone> for ZoneRecord {
    fn from(zone: &Zone) -> Self {
        Self {
            center: zone.center.to_array(),
            radius: zone.radius,
        }
    }
}

impl ZoneRecord {
    /// Convert to a rough zone.
    pub fn to_zone(&self) -> Zone {
        Zone::rough(Vec2::from_array(self.center), self.radius)
    }

    fn is_valid(&self) -> bool {
        self.center.iter().all(|c| c.is_finite()) && self.radius.is_finite() && self.radius > 0.0
    }
}

/// Full stone set after a throw settled, as seen by the throw owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoneSnapshot {
    /// Throw this snapshot closes
    pub throw: ThrowId,
    /// Every stone, in collection order
    pub stones: Vec<StoneRecord>,
    /// Hex SHA-256 digest of `stones`
    pub state_hash: String,
}

impl StoneSnapshot {
    /// Capture the stones for a throw.
    pub fn capture(throw: ThrowId, stones: &[Stone]) -> Self {
        Self {
            throw,
            stones: stones.iter().map(StoneRecord::from).collect(),
            state_hash: hex::encode(stones_hash(stones)),
        }
    }

    /// Decode the stones. `None` if any record is invalid.
    pub fn to_stones(&self) -> Option<Vec<Stone>> {
        self.stones.iter().map(StoneRecord::to_stone).collect()
    }

    /// True if the digest matches the decoded stones.
    pub fn verify(&self) -> bool {
        match self.to_stones() {
            Some(stones) => hex::encode(stones_hash(&stones)) == self.state_hash,
            None => false,
        }
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Match progress sent at each end transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateRecord {
    /// Ends in the game
    pub total_ends: u32,
    /// Current end after the transition
    pub current_end: u32,
    /// Aggregate scores
    pub scores: [u32; 2],
    /// Hammer team index
    pub hammer: u8,
}

impl GameStateRecord {
    /// Capture from a match state.
    pub fn from_state(state: &MatchState) -> Self {
        Self {
            total_ends: state.total_ends,
            current_end: state.current_end,
            scores: state.scores,
            hammer: state.hammer as u8,
        }
    }

    /// Hammer team, if the index is valid.
    pub fn hammer_team(&self) -> Option<Team> {
        Team::from_index(self.hammer)
    }

    fn is_valid(&self) -> bool {
        self.hammer_team().is_some()
            && (1..=MAX_TOTAL_ENDS).contains(&self.total_ends)
            && (1..=self.total_ends + 1).contains(&self.current_end)
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// PEER -> PEER MESSAGES
// =============================================================================

/// Game protocol between the two peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// A stone was thrown. The receiver adds the same stone with the same
    /// velocity and simulates it locally.
    Launch {
        throw: ThrowId,
        team: u8,
        /// Launch velocity, wobble included
        velocity: [f64; 2],
        /// Power shown in the UI (0.0 to 1.0)
        power: f64,
        /// Rough patches for the end, first throw of an end only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rough_zones: Option<Vec<ZoneRecord>>,
    },

    /// The sweeping team laid a swept patch.
    Sweep {
        throw: ThrowId,
        team: u8,
        position: [f64; 2],
    },

    /// Authoritative stone set once the throw settled.
    SyncStones(StoneSnapshot),

    /// The throwing team's aim timer ran out.
    Timeout {
        throw: ThrowId,
        team: u8,
    },

    /// Scores and hammer after an end.
    GameState(GameStateRecord),
}

impl PeerMessage {
    /// Throw this message belongs to (`None` for game-state).
    pub fn throw_id(&self) -> Option<ThrowId> {
        match self {
            PeerMessage::Launch { throw, .. }
            | PeerMessage::Sweep { throw, .. }
            | PeerMessage::Timeout { throw, .. } => Some(*throw),
            PeerMessage::SyncStones(snapshot) => Some(snapshot.throw),
            PeerMessage::GameState(_) => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Launch { .. } => "launch",
            PeerMessage::Sweep { .. } => "sweep",
            PeerMessage::SyncStones(_) => "sync_stones",
            PeerMessage::Timeout { .. } => "timeout",
            PeerMessage::GameState(_) => "game_state",
        }
    }

    /// Validate and normalise a message from the network.
    ///
    /// Bad team ids, non-finite numbers and digest mismatches reject the
    /// message; launch speeds, power and rough sets are clamped.
    pub fn sanitize(self) -> Option<Self> {
        match self {
            PeerMessage::Launch { throw, team, velocity, power, rough_zones } => {
                Team::from_index(team)?;
                let velocity = Vec2::from_array(velocity);
                if !velocity.is_finite() {
                    return None;
                }
                let rough_zones = rough_zones.map(|zones| {
                    zones
                        .into_iter()
                        .filter(ZoneRecord::is_valid)
                        .map(|z| ZoneRecord { radius: z.radius.min(ROUGH_RADIUS_MAX), ..z })
                        .take(ROUGH_ZONE_COUNT_MAX as usize)
                        .collect()
                });
                Some(PeerMessage::Launch {
                    throw,
                    team,
                    velocity: velocity.clamp_length(MAX_LAUNCH_SPEED).to_array(),
                    power: if power.is_finite() { power.clamp(0.0, 1.0) } else { 0.0 },
                    rough_zones,
                })
            }
            PeerMessage::Sweep { team, position, .. } => {
                Team::from_index(team)?;
                if !position.iter().all(|c| c.is_finite()) {
                    return None;
                }
                Some(self)
            }
            PeerMessage::SyncStones(ref snapshot) => {
                if snapshot.stones.len() > MAX_SNAPSHOT_STONES || !snapshot.verify() {
                    return None;
                }
                Some(self)
            }
            PeerMessage::Timeout { team, .. } => {
                Team::from_index(team)?;
                Some(self)
            }
            PeerMessage::GameState(record) => record.is_valid().then_some(self),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Encode as the payload of an `action` envelope.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode the payload of an `action` envelope.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload)
    }
}

// =============================================================================
// CLIENT -> RELAY MESSAGES
// =============================================================================

/// Messages sent from a client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or create) a named lobby.
    Join {
        lobby: String,
        display_name: String,
    },

    /// Leave the current lobby.
    Leave,

    /// Ask for the open lobbies.
    ListLobbies,

    /// Forward a game message to the other lobby member. The payload is
    /// not interpreted by the relay.
    Action { action: serde_json::Value },

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// RELAY -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Joined a lobby, waiting for an opponent.
    Joined(JoinedInfo),

    /// Both seats taken; the match begins.
    GameStart(GameStartInfo),

    /// Game message from the other member, as it was sent.
    Action { action: serde_json::Value },

    /// The other member left or disconnected.
    OpponentLeft { display_name: String },

    /// Open lobbies.
    LobbyList { lobbies: Vec<LobbySummary> },

    /// Request failed.
    Error(ServerError),

    /// Relay is going down.
    Shutdown { reason: String },

    /// Ping response.
    Pong { timestamp: u64, server_time: u64 },
}

/// Lobby join confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedInfo {
    /// Lobby name
    pub lobby: String,
    /// Relay-assigned player id (uuid)
    pub player_id: String,
    /// Seat/team index assigned
    pub team: u8,
}

/// A lobby member as announced at game start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    /// Relay-assigned player id
    pub player_id: String,
    /// Name shown to the opponent
    pub display_name: String,
    /// Team index
    pub team: u8,
}

/// Match start announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartInfo {
    /// Lobby name
    pub lobby: String,
    /// Both members
    pub players: Vec<LobbyPlayer>,
    /// Team of the receiving client
    pub your_team: u8,
}

/// One entry in a lobby listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySummary {
    /// Lobby name
    pub name: String,
    /// Members present
    pub players: usize,
    /// When the lobby was opened
    pub created_at: DateTime<Utc>,
}

/// Relay error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed message.
    InvalidInput,
    /// Lobby already has two members.
    LobbyFull,
    /// Already a member of a lobby.
    AlreadyInLobby,
    /// Not a member of any lobby.
    NotInLobby,
    /// No opponent to forward to yet.
    NoOpponent,
    /// Lobby limit reached.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            code,
            message: message.into(),
        })
    }
}
