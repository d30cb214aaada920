//! Game Logic Module
//!
//! Sheet physics, scoring, rules and the match state machine. Nothing in
//! here touches the network or the clock: time arrives as an `Instant`
//! argument and messages arrive as plain function calls.
//!
//! ## Module Structure
//!
//! - `surface`: Sheet geometry and physics constants
//! - `kinematics`: Per-stone integration and friction
//! - `zone`: Swept and rough friction patches
//! - `collision`: Stone-on-stone contact resolution
//! - `tick`: One simulation step over all stones
//! - `scoring`: End scoring
//! - `rules`: Free guard zone and hog line
//! - `state`: Stones, teams, phases, match state
//! - `flow`: Turn/end state machine and timers
//! - `intent`: Player intents and launch velocity
//! - `events`: Game events for logging and UI effects

pub mod surface;
pub mod kinematics;
pub mod zone;
pub mod collision;
pub mod tick;
pub mod scoring;
pub mod rules;
pub mod state;
pub mod flow;
pub mod intent;
pub mod events;

// Re-export key types
pub use state::{MatchState, MatchPhase, Stone, Team, ThrowId};
pub use flow::{MatchConfig, TimerOutcome};
pub use intent::Intent;
pub use scoring::{calculate_score, RoundResult};
pub use tick::TickResult;
pub use events::GameEvent;
