//! Lobby Management
//!
//! Named two-seat lobbies. The first member takes the red seat, the second
//! the yellow seat; once both are taken the match starts and the relay
//! forwards game messages between the two. Lobbies hold no game state.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::game::state::Team;
use crate::network::protocol::{
    ErrorCode, GameStartInfo, LobbyPlayer, LobbySummary, ServerMessage,
};

/// Longest accepted lobby or display name (bytes).
pub const MAX_NAME_LEN: usize = 32;

/// Lobby state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    /// One seat taken.
    Waiting,
    /// Both seats taken, match running.
    Playing,
}

/// A lobby member.
#[derive(Debug, Clone)]
pub struct LobbyMember {
    /// Relay-assigned player id.
    pub player_id: Uuid,
    /// Name shown to the opponent.
    pub display_name: String,
    /// Seat.
    pub team: Team,
    /// Message channel to this member.
    pub sender: mpsc::Sender<ServerMessage>,
}

impl LobbyMember {
    fn as_player(&self) -> LobbyPlayer {
        LobbyPlayer {
            player_id: self.player_id.to_string(),
            display_name: self.display_name.clone(),
            team: self.team as u8,
        }
    }
}

/// A two-seat lobby.
#[derive(Debug)]
pub struct Lobby {
    /// Lobby name.
    pub name: String,
    /// Current state.
    pub state: LobbyState,
    /// When the lobby was opened.
    pub created_at: DateTime<Utc>,
    members: Vec<LobbyMember>,
}

impl Lobby {
    /// Open an empty lobby.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LobbyState::Waiting,
            created_at: Utc::now(),
            members: Vec::with_capacity(2),
        }
    }

    /// Take the first free seat.
    pub fn add_member(
        &mut self,
        player_id: Uuid,
        display_name: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Team, LobbyError> {
        if self.members.iter().any(|m| m.player_id == player_id) {
            return Err(LobbyError::AlreadyInLobby);
        }
        let team = Team::ALL
            .into_iter()
            .find(|t| self.members.iter().all(|m| m.team != *t))
            .ok_or(LobbyError::LobbyFull)?;

        self.members.push(LobbyMember {
            player_id,
            display_name,
            team,
            sender,
        });
        if self.is_full() {
            self.state = LobbyState::Playing;
        }
        Ok(team)
    }

    /// Remove a member.
    pub fn remove_member(&mut self, player_id: &Uuid) -> Option<LobbyMember> {
        let index = self.members.iter().position(|m| m.player_id == *player_id)?;
        Some(self.members.remove(index))
    }

    /// The other member.
    pub fn opponent_of(&self, player_id: &Uuid) -> Option<&LobbyMember> {
        self.members.iter().find(|m| m.player_id != *player_id)
    }

    /// Members present.
    pub fn members(&self) -> &[LobbyMember] {
        &self.members
    }

    /// Both seats taken.
    pub fn is_full(&self) -> bool {
        self.members.len() >= Team::ALL.len()
    }

    /// Game start announcement for one member.
    pub fn start_info_for(&self, member: &LobbyMember) -> GameStartInfo {
        GameStartInfo {
            lobby: self.name.clone(),
            players: self.members.iter().map(LobbyMember::as_player).collect(),
            your_team: member.team as u8,
        }
    }

    /// Send `game_start` to both members.
    pub async fn announce_start(&self) {
        for member in &self.members {
            let _ = member
                .sender
                .send(ServerMessage::GameStart(self.start_info_for(member)))
                .await;
        }
    }

    /// Listing entry.
    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            name: self.name.clone(),
            players: self.members.len(),
            created_at: self.created_at,
        }
    }
}

/// Result of a join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Lobby joined.
    pub lobby: Arc<RwLock<Lobby>>,
    /// Seat taken.
    pub team: Team,
    /// The join filled the lobby.
    pub started: bool,
}

/// Result of a leave.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// Lobby left (now closed).
    pub lobby: String,
    /// Name of the member who left.
    pub display_name: String,
    /// The member left behind, if any.
    pub opponent: Option<LobbyMember>,
}

/// Lobby errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Both seats taken.
    #[error("Lobby is full")]
    LobbyFull,

    /// Already a member of a lobby.
    #[error("Already in a lobby")]
    AlreadyInLobby,

    /// Not a member of any lobby.
    #[error("Not in a lobby")]
    NotInLobby,

    /// No opponent yet.
    #[error("No opponent in lobby")]
    NoOpponent,

    /// Lobby limit reached.
    #[error("Too many lobbies")]
    TooManyLobbies,

    /// Empty or oversized name.
    #[error("Invalid name")]
    InvalidName,
}

impl LobbyError {
    /// Wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            LobbyError::LobbyFull => ErrorCode::LobbyFull,
            LobbyError::AlreadyInLobby => ErrorCode::AlreadyInLobby,
            LobbyError::NotInLobby => ErrorCode::NotInLobby,
            LobbyError::NoOpponent => ErrorCode::NoOpponent,
            LobbyError::TooManyLobbies => ErrorCode::ServerOverloaded,
            LobbyError::InvalidName => ErrorCode::InvalidInput,
        }
    }
}

fn valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.len() <= MAX_NAME_LEN
}

// =============================================================================
// LOBBY MANAGER
// =============================================================================

/// Manages all lobbies.
pub struct LobbyManager {
    /// Lobbies by name.
    lobbies: RwLock<BTreeMap<String, Arc<RwLock<Lobby>>>>,
    /// Player to lobby mapping.
    player_lobbies: RwLock<BTreeMap<Uuid, String>>,
    /// Lobby limit.
    max_lobbies: usize,
}

impl LobbyManager {
    /// Create a manager allowing up to `max_lobbies` lobbies.
    pub fn new(max_lobbies: usize) -> Self {
        Self {
            lobbies: RwLock::new(BTreeMap::new()),
            player_lobbies: RwLock::new(BTreeMap::new()),
            max_lobbies,
        }
    }

    /// Join a lobby, opening it if it does not exist.
    pub async fn join(
        &self,
        name: &str,
        player_id: Uuid,
        display_name: &str,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<JoinOutcome, LobbyError> {
        if !valid_name(name) || !valid_name(display_name) {
            return Err(LobbyError::InvalidName);
        }
        let name = name.trim().to_string();

        let mut player_lobbies = self.player_lobbies.write().await;
        if player_lobbies.contains_key(&player_id) {
            return Err(LobbyError::AlreadyInLobby);
        }

        let lobby = {
            let mut lobbies = self.lobbies.write().await;
            if !lobbies.contains_key(&name) && lobbies.len() >= self.max_lobbies {
                return Err(LobbyError::TooManyLobbies);
            }
            lobbies
                .entry(name.clone())
                .or_insert_with(|| Arc::new(RwLock::new(Lobby::new(name.clone()))))
                .clone()
        };

        let (team, started) = {
            let mut guard = lobby.write().await;
            let team = guard.add_member(player_id, display_name.trim().to_string(), sender)?;
            (team, guard.is_full())
        };

        player_lobbies.insert(player_id, name);
        Ok(JoinOutcome { lobby, team, started })
    }

    /// Leave the current lobby. The lobby is closed.
    pub async fn leave(&self, player_id: &Uuid) -> Option<LeaveOutcome> {
        let mut player_lobbies = self.player_lobbies.write().await;
        let name = player_lobbies.remove(player_id)?;

        let lobby = self.lobbies.write().await.remove(&name)?;
        let mut lobby = lobby.write().await;
        let leaving = lobby.remove_member(player_id)?;
        let opponent = lobby.members().first().cloned();
        if let Some(ref opponent) = opponent {
            player_lobbies.remove(&opponent.player_id);
        }

        Some(LeaveOutcome {
            lobby: name,
            display_name: leaving.display_name,
            opponent,
        })
    }

    /// Channel to the other member of the player's lobby.
    pub async fn opponent_sender(&self, player_id: &Uuid) -> Result<mpsc::Sender<ServerMessage>, LobbyError> {
        let lobby = self.get_player_lobby(player_id).await.ok_or(LobbyError::NotInLobby)?;
        let lobby = lobby.read().await;
        if lobby.state != LobbyState::Playing {
            return Err(LobbyError::NoOpponent);
        }
        lobby
            .opponent_of(player_id)
            .map(|m| m.sender.clone())
            .ok_or(LobbyError::NoOpponent)
    }

    /// Get a lobby by name.
    pub async fn get_lobby(&self, name: &str) -> Option<Arc<RwLock<Lobby>>> {
        self.lobbies.read().await.get(name).cloned()
    }

    /// Get the lobby a player is in.
    pub async fn get_player_lobby(&self, player_id: &Uuid) -> Option<Arc<RwLock<Lobby>>> {
        let name = self.player_lobbies.read().await.get(player_id).cloned()?;
        self.get_lobby(&name).await
    }

    /// Lobbies with a free seat.
    pub async fn list_open(&self) -> Vec<LobbySummary> {
        let lobbies = self.lobbies.read().await;
        let mut open = Vec::new();
        for lobby in lobbies.values() {
            let lobby = lobby.read().await;
            if lobby.state == LobbyState::Waiting {
                open.push(lobby.summary());
            }
        }
        open
    }

    /// Active lobby count.
    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }

    /// Remove lobbies nobody is in.
    pub async fn cleanup(&self) {
        let mut lobbies = self.lobbies.write().await;
        let mut to_remove = Vec::new();

        for (name, lobby) in lobbies.iter() {
            if lobby.read().await.members().is_empty() {
                to_remove.push(name.clone());
            }
        }

        for name in to_remove {
            lobbies.remove(&name);
        }
    }
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self::new(256)
    }
}
