//! Relay Client
//!
//! Connects to the relay, joins a lobby and, once the lobby starts, drives a
//! [`MatchPeer`] at a fixed step. A single task owns the peer; relay
//! messages and UI intents are handled strictly between ticks.
//!
//! The UI side talks to the task through a [`ClientHandle`]: intents go in
//! over an mpsc channel, [`PeerView`] snapshots come out over a watch
//! channel once per tick.

use std::time::{Duration, Instant};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn, error, instrument};

use crate::game::flow::MatchConfig;
use crate::game::intent::Intent;
use crate::game::state::{MatchPhase, Team};
use crate::network::peer::{MatchPeer, PeerView};
use crate::network::protocol::{ClientMessage, PeerMessage, ServerError, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay URL, e.g. `ws://127.0.0.1:8080`.
    pub relay_url: String,
    /// Lobby to join.
    pub lobby: String,
    /// Name shown to the opponent.
    pub display_name: String,
    /// Simulation steps per second.
    pub tick_rate: u32,
    /// Rules for the match. Both peers must agree on these.
    pub match_config: MatchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8080".to_string(),
            lobby: "default".to_string(),
            display_name: "player".to_string(),
            tick_rate: crate::TICK_RATE,
            match_config: MatchConfig::default(),
        }
    }
}

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Could not reach the relay.
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        /// Relay URL
        url: String,
        /// Underlying error
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// WebSocket error after connecting.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The relay refused a request.
    #[error("Relay error {:?}: {}", .0.code, .0.message)]
    Relay(ServerError),

    /// The relay assigned a team we do not know.
    #[error("Invalid team assignment {0}")]
    InvalidTeam(u8),

    /// The relay went away before the match started.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The driver task panicked or was cancelled.
    #[error("Client task failed: {0}")]
    Task(String),
}

/// How a match ended, from this side.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    /// Team played locally
    pub local_team: Team,
    /// Final scores `[red, yellow]`
    pub scores: [u32; 2],
    /// Winner, `None` on a tie or an unfinished match
    pub winner: Option<Team>,
    /// True if the match reached game over
    pub completed: bool,
    /// True if the opponent (or the relay) went away mid-match
    pub interrupted: bool,
    /// Snapshots that corrected local drift
    pub desyncs: u32,
}

impl MatchSummary {
    fn from_peer(peer: &MatchPeer) -> Self {
        let state = peer.state();
        let completed = state.phase == MatchPhase::GameOver;
        Self {
            local_team: peer.local_team(),
            scores: state.scores,
            winner: if completed { state.leader() } else { None },
            completed,
            interrupted: state.phase == MatchPhase::Interrupted,
            desyncs: peer.desync_count(),
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// UI-side handle to a running client task.
pub struct ClientHandle {
    intents: mpsc::Sender<Intent>,
    views: watch::Receiver<Option<PeerView>>,
    task: JoinHandle<Result<MatchSummary, ClientError>>,
}

impl ClientHandle {
    /// Spawn a client task on the current runtime.
    pub fn spawn(config: ClientConfig) -> Self {
        let (intent_tx, intent_rx) = mpsc::channel(64);
        let (view_tx, view_rx) = watch::channel(None);
        let task = tokio::spawn(run_client(config, intent_rx, view_tx));
        Self {
            intents: intent_tx,
            views: view_rx,
            task,
        }
    }

    /// Queue an intent for the next step. Returns false if the task is gone.
    pub async fn send_intent(&self, intent: Intent) -> bool {
        self.intents.send(intent).await.is_ok()
    }

    /// Subscribe to view snapshots.
    pub fn views(&self) -> watch::Receiver<Option<PeerView>> {
        self.views.clone()
    }

    /// Latest view, if the match has started.
    pub fn latest(&self) -> Option<PeerView> {
        self.views.borrow().clone()
    }

    /// Stop the task without saying goodbye to the relay.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the match to end.
    pub async fn join(self) -> Result<MatchSummary, ClientError> {
        self.task.await.map_err(|e| ClientError::Task(e.to_string()))?
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Connect, wait for an opponent and play one match.
#[instrument(skip_all, fields(lobby = %config.lobby, name = %config.display_name))]
pub async fn run_client(
    config: ClientConfig,
    mut intents: mpsc::Receiver<Intent>,
    views: watch::Sender<Option<PeerView>>,
) -> Result<MatchSummary, ClientError> {
    let (ws, _) = connect_async(config.relay_url.as_str())
        .await
        .map_err(|source| ClientError::Connect { url: config.relay_url.clone(), source })?;
    info!("Connected to relay {}", config.relay_url);

    let (mut ws_tx, mut ws_rx) = ws.split();
    send(&mut ws_tx, &ClientMessage::Join {
        lobby: config.lobby.clone(),
        display_name: config.display_name.clone(),
    }).await?;

    // Opponent actions can overtake our own game_start.
    let mut early = Vec::new();
    let team = loop {
        match next_server_message(&mut ws_rx).await? {
            Some(ServerMessage::Joined(info)) => {
                info!("Joined lobby {} as team {}", info.lobby, info.team);
            }
            Some(ServerMessage::GameStart(start)) => {
                let names: Vec<_> = start.players.iter().map(|p| p.display_name.as_str()).collect();
                info!(players = ?names, "Match starting");
                break Team::from_index(start.your_team).ok_or(ClientError::InvalidTeam(start.your_team))?;
            }
            Some(ServerMessage::Action { action }) => early.push(action),
            Some(ServerMessage::Error(e)) => return Err(ClientError::Relay(e)),
            Some(ServerMessage::Shutdown { reason }) => {
                warn!("Relay shutting down: {}", reason);
                return Err(ClientError::ConnectionClosed);
            }
            Some(other) => debug!(?other, "ignored while waiting for opponent"),
            None => return Err(ClientError::ConnectionClosed),
        }
    };

    let mut peer = MatchPeer::with_entropy(team, config.match_config.clone(), Instant::now());
    let now = Instant::now();
    for action in early {
        deliver(&mut peer, action, now);
    }
    views.send_replace(Some(peer.view(now)));

    let step = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate.max(1)));
    let mut ticker = interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut relay_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                peer.tick(now);
                peer.take_events();
                if relay_open {
                    flush(&mut ws_tx, &mut peer).await?;
                }
                views.send_replace(Some(peer.view(now)));

                if peer.state().phase == MatchPhase::GameOver || peer.should_return_to_lobby() {
                    break;
                }
            }
            msg = next_server_message(&mut ws_rx), if relay_open => {
                let now = Instant::now();
                match msg? {
                    Some(ServerMessage::Action { action }) => deliver(&mut peer, action, now),
                    Some(ServerMessage::OpponentLeft { display_name }) => {
                        info!("{} left the match", display_name);
                        peer.opponent_left(now);
                    }
                    Some(ServerMessage::Shutdown { reason }) => {
                        warn!("Relay shutting down: {}", reason);
                        peer.opponent_left(now);
                    }
                    Some(ServerMessage::Error(e)) => warn!("Relay error {:?}: {}", e.code, e.message),
                    Some(other) => debug!(?other, "ignored during match"),
                    None => {
                        error!("Relay connection lost");
                        relay_open = false;
                        peer.opponent_left(now);
                    }
                }
            }
            intent = intents.recv() => {
                let Some(intent) = intent else {
                    info!("Local player quit");
                    break;
                };
                peer.handle_intent(intent, Instant::now());
                if relay_open {
                    flush(&mut ws_tx, &mut peer).await?;
                }
            }
        }
    }

    let summary = MatchSummary::from_peer(&peer);
    info!(?summary, "Match finished");

    if relay_open {
        send(&mut ws_tx, &ClientMessage::Leave).await?;
        let _ = ws_tx.close().await;
    }
    Ok(summary)
}

/// Send everything the peer queued.
async fn flush(ws: &mut WsSink, peer: &mut MatchPeer) -> Result<(), ClientError> {
    for action in peer.drain_outbox() {
        send(ws, &ClientMessage::Action { action: action.to_payload()? }).await?;
    }
    Ok(())
}

/// Decode a forwarded action and hand it to the peer.
fn deliver(peer: &mut MatchPeer, payload: serde_json::Value, now: Instant) {
    match PeerMessage::from_payload(payload) {
        Ok(action) => peer.handle_message(action, now),
        Err(e) => warn!("Dropping undecodable action: {}", e),
    }
}

async fn send(ws: &mut WsSink, msg: &ClientMessage) -> Result<(), ClientError> {
    ws.send(Message::Text(msg.to_json()?)).await?;
    Ok(())
}

/// Next decodable relay message; `None` once the connection is closed.
async fn next_server_message(ws: &mut WsSource) -> Result<Option<ServerMessage>, ClientError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => warn!("Failed to parse relay message: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Err(e)) => return Err(e.into()),
            _ => {}
        }
    }
}
