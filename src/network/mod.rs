//! Network Layer
//!
//! Peer-authoritative synchronization and the WebSocket relay that carries it.
//! The relay only forwards messages; all game logic runs through `game/` on
//! each peer.

pub mod protocol;
pub mod sync;
pub mod peer;
pub mod lobby;
pub mod relay;
pub mod client;

pub use protocol::{
    ClientMessage, ServerMessage, PeerMessage, StoneSnapshot, GameStateRecord, ErrorCode,
};
pub use sync::{ThrowGate, SyncOutcome, apply_sync_stones, apply_game_state};
pub use peer::{MatchPeer, PeerView};
pub use lobby::{Lobby, LobbyManager, LobbyError};
pub use relay::{RelayServer, ServerConfig, RelayError};
pub use client::{ClientConfig, ClientError, ClientHandle, MatchSummary, run_client};
