//! # Curling Engine
//!
//! Two-player curling with a peer-authoritative match engine. Both peers
//! run the full simulation; the peer throwing a stone owns that throw and
//! its settled result is the one both sides keep.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CURLING ENGINE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  ├── rng.rs      - Seedable Xorshift128+ PRNG                │
//! │  └── hash.rs     - Stone-set digests                         │
//! │                                                              │
//! │  game/           - Match engine (no I/O)                     │
//! │  ├── surface.rs  - Sheet geometry and constants              │
//! │  ├── kinematics.rs - Friction and integration                │
//! │  ├── zone.rs     - Swept and rough ice                       │
//! │  ├── collision.rs- Stone contacts                            │
//! │  ├── tick.rs     - Simulation step                           │
//! │  ├── scoring.rs  - End scoring                               │
//! │  ├── rules.rs    - Free guard zone, hog line                 │
//! │  ├── state.rs    - Match state                               │
//! │  └── flow.rs     - Turn/end state machine                    │
//! │                                                              │
//! │  network/        - Synchronization and transport             │
//! │  ├── protocol.rs - Wire messages                             │
//! │  ├── sync.rs     - Throw ordering, sync-stones replace       │
//! │  ├── peer.rs     - One side of a match                       │
//! │  ├── lobby.rs    - Two-seat lobbies                          │
//! │  ├── relay.rs    - WebSocket relay                           │
//! │  └── client.rs   - Relay client and fixed-step driver        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! The simulation uses `f64`, so two peers may drift by a few ulps over a
//! throw. Drift never outlives the throw: the owner's settled stones
//! replace the other peer's before any rule runs, and rules and scoring are
//! pure functions of those stones.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::SeededRng;
pub use game::flow::MatchConfig;
pub use game::intent::Intent;
pub use game::state::{MatchPhase, MatchState, Stone, Team};
pub use network::peer::{MatchPeer, PeerView};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
