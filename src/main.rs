//! Curling Engine
//!
//! `curling-engine relay` runs the message relay (the default).
//! `curling-engine demo` plays a headless match between two in-process
//! peers and checks that they agree at the end.
//! `curling-engine bot` joins a relay lobby and plays a match on its own.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use curling_engine::{
    TICK_RATE, VERSION, Intent, MatchConfig, MatchPeer, MatchPhase, PeerView, SeededRng, Team,
    game::events::GameEventData,
    network::{ClientConfig, ClientHandle, RelayServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Curling Engine v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let mode = env::args().nth(1).unwrap_or_else(|| "relay".to_string());
    match mode.as_str() {
        "relay" => run_relay().await,
        "demo" => demo_match(),
        "bot" => run_bot().await,
        other => bail!("unknown mode '{}', expected relay, demo or bot", other),
    }
}

/// Read an optional environment override.
fn env_override<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => Ok(Some(raw.parse().with_context(|| format!("invalid {}", name))?)),
        Err(_) => Ok(None),
    }
}

fn match_config() -> anyhow::Result<MatchConfig> {
    let mut config = MatchConfig::default();
    if let Some(ends) = env_override("MATCH_TOTAL_ENDS")? {
        config.total_ends = ends;
    }
    Ok(config)
}

async fn run_relay() -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(addr) = env_override("RELAY_BIND_ADDR")? {
        config.bind_addr = addr;
    }
    if let Some(max) = env_override("RELAY_MAX_CONNECTIONS")? {
        config.max_connections = max;
    }

    let server = Arc::new(RelayServer::new(config));
    let running = server.clone();
    let mut handle = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = &mut handle => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            server.shutdown();
            handle.await??;
        }
    }
    Ok(())
}

// =============================================================================
// BOT
// =============================================================================

/// Plays whatever side it is given: throws at the house, sweeps the
/// opponent's stone now and then.
struct Bot {
    rng: SeededRng,
    aim_ticks: u32,
    sweep_ticks: u32,
}

impl Bot {
    fn new(seed: u64) -> Self {
        Self {
            rng: SeededRng::new(seed),
            aim_ticks: 0,
            sweep_ticks: 0,
        }
    }

    fn decide(&mut self, view: &PeerView) -> Option<Intent> {
        if view.phase == MatchPhase::Interrupted {
            return Some(Intent::AcknowledgeInterrupt);
        }

        if view.is_my_turn {
            self.aim_ticks += 1;
            if self.aim_ticks < 30 {
                return None;
            }
            if view.phase == MatchPhase::Aiming {
                return Some(Intent::LockAim);
            }
            self.aim_ticks = 0;
            return Some(Intent::ConfirmThrow {
                direction: self.rng.next_f64_range(-0.03, 0.03),
                power: self.rng.next_f64_range(0.45, 0.62),
            });
        }

        if view.can_sweep {
            self.sweep_ticks += 1;
            if self.sweep_ticks % 8 != 0 || self.rng.next_f64_range(0.0, 1.0) < 0.5 {
                return None;
            }
            let stone = view.stones.iter().find(|s| s.is_moving())?;
            let ahead = stone.position + stone.velocity.scale(6.0);
            return Some(Intent::Sweep { x: ahead.x, y: ahead.y });
        }
        None
    }
}

async fn run_bot() -> anyhow::Result<()> {
    let mut config = ClientConfig {
        match_config: match_config()?,
        ..Default::default()
    };
    if let Ok(url) = env::var("RELAY_URL") {
        config.relay_url = url;
    }
    if let Ok(lobby) = env::var("LOBBY") {
        config.lobby = lobby;
    }
    if let Ok(name) = env::var("PLAYER_NAME") {
        config.display_name = name;
    }

    let handle = ClientHandle::spawn(config);
    let mut views = handle.views();
    let mut bot = Bot::new(rand_seed());

    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        let Some(view) = view else { continue };
        if view.phase == MatchPhase::GameOver {
            break;
        }
        if let Some(intent) = bot.decide(&view) {
            if !handle.send_intent(intent).await {
                break;
            }
        }
    }

    let summary = handle.join().await?;
    info!(?summary, "Bot done");
    Ok(())
}

fn rand_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

// =============================================================================
// DEMO
// =============================================================================

/// Two peers, one process, simulated clock. Messages are delivered after
/// every step.
fn demo_match() -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let config = match_config()?;
    let step = Duration::from_secs_f64(1.0 / f64::from(TICK_RATE));
    let mut now = Instant::now();

    let mut red = MatchPeer::new(Team::Red, config.clone(), 11, now);
    let mut yellow = MatchPeer::new(Team::Yellow, config.clone(), 22, now);
    let mut bots = [Bot::new(1), Bot::new(2)];

    info!("Ends: {}, first hammer: {:?}", config.total_ends, config.initial_hammer);

    let max_ticks = u64::from(config.total_ends) * 16 * 60 * u64::from(TICK_RATE);
    let mut ticks = 0u64;

    while !(red.is_finished() && yellow.is_finished()) {
        if ticks >= max_ticks {
            bail!("demo did not finish within {} ticks", max_ticks);
        }
        ticks += 1;
        now += step;

        for (peer, bot) in [&mut red, &mut yellow].into_iter().zip(bots.iter_mut()) {
            peer.tick(now);
            if let Some(intent) = bot.decide(&peer.view(now)) {
                peer.handle_intent(intent, now);
            }
            for event in peer.take_events() {
                if let GameEventData::EndScored { end, result, scores, .. } = event.data {
                    if peer.local_team() == Team::Red {
                        info!("End {}: {:?} scores {} (total {:?})", end, result.team, result.points, scores);
                    }
                }
            }
        }

        deliver(&mut red, &mut yellow, now);
    }

    // Print final results
    info!("=== Match Results ===");
    info!("Ticks: {} ({:.1} simulated minutes)", ticks, ticks as f64 / f64::from(TICK_RATE) / 60.0);
    info!("Scores: red {} / yellow {}", red.state().scores[0], red.state().scores[1]);
    info!("Winner: {:?}", red.state().leader());
    info!("Desyncs corrected: red {}, yellow {}", red.desync_count(), yellow.desync_count());

    info!("=== Verifying Convergence ===");
    let red_hash = red.state().compute_hash();
    let yellow_hash = yellow.state().compute_hash();
    info!("Red stones:    {}", hex::encode(red_hash));
    info!("Yellow stones: {}", hex::encode(yellow_hash));

    if red_hash == yellow_hash
        && red.state().scores == yellow.state().scores
        && red.state().phase == yellow.state().phase
    {
        info!("CONVERGENCE VERIFIED: peers agree");
        Ok(())
    } else {
        warn!("CONVERGENCE FAILURE: peers disagree");
        bail!("peers diverged")
    }
}

fn deliver(a: &mut MatchPeer, b: &mut MatchPeer, now: Instant) {
    loop {
        let to_b = a.drain_outbox();
        let to_a = b.drain_outbox();
        if to_a.is_empty() && to_b.is_empty() {
            break;
        }
        for msg in to_b {
            b.handle_message(msg, now);
        }
        for msg in to_a {
            a.handle_message(msg, now);
        }
    }
}
