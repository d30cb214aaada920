//! WebSocket Message Relay
//!
//! Async WebSocket server that pairs clients into two-seat lobbies and
//! forwards game messages between them. The relay runs no simulation and
//! never decodes a forwarded action payload.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};
use uuid::Uuid;

use crate::network::lobby::{LobbyError, LobbyManager};
use crate::network::protocol::{
    ClientMessage, ServerMessage, ErrorCode, JoinedInfo,
};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Connections accepted before new ones are turned away.
    pub max_connections: usize,
    /// Maximum open lobbies.
    pub max_lobbies: usize,
    /// Connections silent for longer than this are dropped.
    pub idle_timeout: Duration,
    /// How often idle connections and empty lobbies are swept.
    pub cleanup_interval: Duration,
    /// Version reported at startup.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            max_lobbies: 256,
            idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Relay errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Listener could not be opened.
    #[error("Relay socket error: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Handshake or frame error.
    #[error("Relay websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Too many open connections.
    #[error("Relay is at its connection limit")]
    ConnectionLimitReached,

    /// Lobby error.
    #[error("Lobby error: {0}")]
    Lobby(#[from] LobbyError),
}

/// A live relay connection.
struct ConnectedClient {
    /// Relay-assigned player id.
    player_id: Uuid,
    /// Connection time.
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
    /// Disconnect signal for idle eviction.
    kick: mpsc::Sender<()>,
}

type ClientTable = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: ServerConfig,
    /// Lobby manager.
    lobbies: Arc<LobbyManager>,
    /// Connected clients.
    clients: ClientTable,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Create a new relay.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let lobbies = Arc::new(LobbyManager::new(config.max_lobbies));

        Self {
            config,
            lobbies,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind and run until shut down.
    #[instrument(skip(self), fields(addr = %self.config.bind_addr))]
    pub async fn run(&self) -> Result<(), RelayError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), RelayError> {
        info!("Relay v{} listening on {}", self.config.version, listener.local_addr()?);

        let cleanup_clients = self.clients.clone();
        let cleanup_lobbies = self.lobbies.clone();
        let idle_timeout = self.config.idle_timeout;
        let every = self.config.cleanup_interval;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, cleanup_lobbies, idle_timeout, every).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("{}, rejecting {}", RelayError::ConnectionLimitReached, addr);
                                continue;
                            }

                            debug!("Accepted {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            warn!("accept failed: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Relay stopping");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Upgrade a socket and serve it until it closes.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let lobbies = self.lobbies.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("Handshake with {} failed: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let (kick_tx, mut kick_rx) = mpsc::channel::<()>(1);
            let player_id = Uuid::new_v4();

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    player_id,
                    connected_at: Instant::now(),
                    last_activity: Instant::now(),
                    kick: kick_tx,
                });
            }

            // Outbound frames go through one writer task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Could not encode {:?}: {}", msg, e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Inbound frames
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Undecodable frame from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::error(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        )).await;
                                        continue;
                                    }
                                };

                                // Update activity
                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                    }
                                }

                                Self::handle_client_message(player_id, client_msg, &lobbies, &msg_tx).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(ServerMessage::error(
                                    ErrorCode::InvalidInput,
                                    "Binary frames are not supported",
                                )).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("{} closed the connection", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("Connection {} failed: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = kick_rx.recv() => {
                        info!("Dropping idle client {}", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Relay shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            Self::handle_leave(player_id, &lobbies).await;
            let connected_for = {
                let mut clients = clients.write().await;
                clients.remove(&addr).map(|c| c.connected_at.elapsed())
            };
            drop(msg_tx);
            let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;

            info!("Client {} cleaned up after {:?}", addr, connected_for.unwrap_or_default());
        });
    }

    /// Dispatch one decoded client message.
    async fn handle_client_message(
        player_id: Uuid,
        msg: ClientMessage,
        lobbies: &Arc<LobbyManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::Join { lobby, display_name } => {
                Self::handle_join(player_id, &lobby, &display_name, lobbies, sender).await;
            }
            ClientMessage::Leave => {
                Self::handle_leave(player_id, lobbies).await;
            }
            ClientMessage::ListLobbies => {
                let lobbies = lobbies.list_open().await;
                let _ = sender.send(ServerMessage::LobbyList { lobbies }).await;
            }
            ClientMessage::Action { action } => {
                Self::handle_action(player_id, action, lobbies, sender).await;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
                }).await;
            }
        }
    }

    /// Handle a lobby join.
    async fn handle_join(
        player_id: Uuid,
        lobby: &str,
        display_name: &str,
        lobbies: &Arc<LobbyManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match lobbies.join(lobby, player_id, display_name, sender.clone()).await {
            Ok(outcome) => {
                let name = outcome.lobby.read().await.name.clone();
                let _ = sender.send(ServerMessage::Joined(JoinedInfo {
                    lobby: name.clone(),
                    player_id: player_id.to_string(),
                    team: outcome.team as u8,
                })).await;
                debug!("Player {} joined lobby {} as {:?}", player_id, name, outcome.team);

                if outcome.started {
                    outcome.lobby.read().await.announce_start().await;
                    info!("Lobby {} started", name);
                }
            }
            Err(e) => {
                let _ = sender.send(ServerMessage::error(e.code(), e.to_string())).await;
            }
        }
    }

    /// Handle leaving (explicit or on disconnect).
    async fn handle_leave(player_id: Uuid, lobbies: &Arc<LobbyManager>) {
        if let Some(outcome) = lobbies.leave(&player_id).await {
            debug!("Player {} left lobby {}", player_id, outcome.lobby);
            if let Some(opponent) = outcome.opponent {
                let _ = opponent.sender.send(ServerMessage::OpponentLeft {
                    display_name: outcome.display_name,
                }).await;
            }
        }
    }

    /// Forward a game message to the opponent, unopened.
    async fn handle_action(
        player_id: Uuid,
        action: serde_json::Value,
        lobbies: &Arc<LobbyManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match lobbies.opponent_sender(&player_id).await {
            Ok(opponent) => {
                if opponent.send(ServerMessage::Action { action }).await.is_err() {
                    debug!("Opponent of {} gone, action dropped", player_id);
                }
            }
            Err(e) => {
                let _ = sender.send(ServerMessage::error(e.code(), e.to_string())).await;
            }
        }
    }

    /// Periodically kick idle connections and drop empty lobbies.
    async fn run_cleanup_loop(
        clients: ClientTable,
        lobbies: Arc<LobbyManager>,
        idle_timeout: Duration,
        every: Duration,
    ) {
        let mut interval = interval(every);

        loop {
            interval.tick().await;

            let now = Instant::now();
            let idle: Vec<_> = {
                let clients = clients.read().await;
                clients.iter()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > idle_timeout)
                    .map(|(addr, c)| (*addr, c.player_id, c.kick.clone()))
                    .collect()
            };

            for (addr, player_id, kick) in idle {
                debug!("Client {} ({}) idle", addr, player_id);
                let _ = kick.try_send(());
            }

            lobbies.cleanup().await;
        }
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Number of open lobbies.
    pub async fn lobby_count(&self) -> usize {
        self.lobbies.lobby_count().await
    }
}
