//! Two peers playing whole matches over an in-memory link.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use proptest::prelude::*;

use curling_engine::game::surface::STONES_PER_END;
use curling_engine::network::PeerMessage;
use curling_engine::{Intent, MatchConfig, MatchPeer, MatchPhase, Team, TICK_RATE};

/// One direction of the link: FIFO of JSON frames with a fixed delay,
/// optionally delivering every message twice.
struct Wire {
    queue: VecDeque<(u64, String)>,
    delay: u64,
    duplicate: bool,
}

impl Wire {
    fn new(delay: u64, duplicate: bool) -> Self {
        Self { queue: VecDeque::new(), delay, duplicate }
    }

    fn send(&mut self, tick: u64, messages: Vec<PeerMessage>) {
        for msg in messages {
            let frame = msg.to_json().unwrap();
            if self.duplicate {
                self.queue.push_back((tick + self.delay, frame.clone()));
            }
            self.queue.push_back((tick + self.delay, frame));
        }
    }

    fn deliver(&mut self, tick: u64, to: &mut MatchPeer, now: Instant) {
        while self.queue.front().map_or(false, |(due, _)| *due <= tick) {
            if let Some((_, frame)) = self.queue.pop_front() {
                to.handle_message(PeerMessage::from_json(&frame).unwrap(), now);
            }
        }
    }
}

struct Outcome {
    red: MatchPeer,
    yellow: MatchPeer,
}

/// Owner locks its aim a short while after its turn starts and throws
/// ten ticks later; the other side sweeps the running stone every few
/// ticks.
fn intent_for(peer: &MatchPeer, tick: u64, now: Instant, power: f64) -> Option<Intent> {
    let view = peer.view(now);
    if view.is_my_turn && view.phase == MatchPhase::Aiming && tick % 20 == 0 {
        return Some(Intent::LockAim);
    }
    if view.is_my_turn && view.phase == MatchPhase::AimLocked && tick % 20 == 10 {
        let bias = if view.local_team == Team::Red { 0.01 } else { -0.01 };
        return Some(Intent::ConfirmThrow { direction: bias, power });
    }
    if view.can_sweep && tick % 12 == 0 {
        let stone = view.stones.iter().find(|s| s.is_moving())?;
        return Some(Intent::Sweep { x: stone.position.x, y: stone.position.y - 10.0 });
    }
    None
}

fn play(config: MatchConfig, seeds: (u64, u64), delay: u64, duplicate: bool, power: f64) -> Outcome {
    let step = Duration::from_secs_f64(1.0 / f64::from(TICK_RATE));
    let mut now = Instant::now();
    let mut red = MatchPeer::new(Team::Red, config.clone(), seeds.0, now);
    let mut yellow = MatchPeer::new(Team::Yellow, config, seeds.1, now);
    let mut to_yellow = Wire::new(delay, duplicate);
    let mut to_red = Wire::new(delay, duplicate);

    for tick in 0..2_000_000u64 {
        if red.is_finished() && yellow.is_finished() {
            return Outcome { red, yellow };
        }
        now += step;

        red.tick(now);
        yellow.tick(now);
        if let Some(intent) = intent_for(&red, tick, now, power) {
            red.handle_intent(intent, now);
        }
        if let Some(intent) = intent_for(&yellow, tick, now, power) {
            yellow.handle_intent(intent, now);
        }

        to_yellow.send(tick, red.drain_outbox());
        to_red.send(tick, yellow.drain_outbox());
        to_yellow.deliver(tick, &mut yellow, now);
        to_red.deliver(tick, &mut red, now);
    }
    panic!("match did not finish");
}

fn quick_config(total_ends: u32) -> MatchConfig {
    MatchConfig {
        total_ends,
        cooldown: Duration::from_millis(200),
        end_pause: Duration::from_millis(500),
        ..Default::default()
    }
}

fn assert_converged(outcome: &Outcome, total_ends: u32) {
    let (red, yellow) = (outcome.red.state(), outcome.yellow.state());
    assert_eq!(red.phase, MatchPhase::GameOver);
    assert_eq!(yellow.phase, MatchPhase::GameOver);
    assert_eq!(red.scores, yellow.scores);
    assert_eq!(red.hammer, yellow.hammer);
    assert_eq!(red.current_end, total_ends + 1);
    assert_eq!(yellow.current_end, total_ends + 1);
    assert_eq!(red.compute_hash(), yellow.compute_hash());
    assert_eq!(red.stones_thrown, [STONES_PER_END / 2; 2]);
    assert_eq!(yellow.stones_thrown, red.stones_thrown);
}

#[test]
fn test_full_match_converges() {
    let outcome = play(quick_config(2), (7, 8), 0, false, 0.52);
    assert_converged(&outcome, 2);
}

#[test]
fn test_full_match_with_latency() {
    let outcome = play(quick_config(2), (3, 4), 6, false, 0.55);
    assert_converged(&outcome, 2);
}

#[test]
fn test_full_match_with_duplicates() {
    let outcome = play(quick_config(1), (5, 6), 2, true, 0.5);
    assert_converged(&outcome, 1);
}

#[test]
fn test_timeouts_only_match() {
    // Nobody ever throws: every turn times out on the owner and both
    // sides still walk through every end together.
    let step = Duration::from_secs_f64(1.0 / f64::from(TICK_RATE));
    let config = MatchConfig {
        total_ends: 1,
        aim_time_limit: Duration::from_millis(100),
        cooldown: Duration::ZERO,
        end_pause: Duration::ZERO,
        ..Default::default()
    };
    let mut now = Instant::now();
    let mut red = MatchPeer::new(Team::Red, config.clone(), 1, now);
    let mut yellow = MatchPeer::new(Team::Yellow, config, 2, now);

    for _ in 0..100_000 {
        if red.is_finished() && yellow.is_finished() {
            break;
        }
        now += step;
        red.tick(now);
        yellow.tick(now);
        for msg in red.drain_outbox() {
            yellow.handle_message(msg, now);
        }
        for msg in yellow.drain_outbox() {
            red.handle_message(msg, now);
        }
    }

    assert_eq!(red.state().phase, MatchPhase::GameOver);
    assert_eq!(yellow.state().phase, MatchPhase::GameOver);
    assert_eq!(red.state().scores, [0, 0]);
    assert_eq!(yellow.state().scores, [0, 0]);
    assert!(red.state().leader().is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    #[test]
    fn prop_peers_agree(
        red_seed in any::<u64>(),
        yellow_seed in any::<u64>(),
        delay in 0u64..8,
        power in 0.4f64..0.65,
    ) {
        let outcome = play(quick_config(1), (red_seed, yellow_seed), delay, false, power);
        let (red, yellow) = (outcome.red.state(), outcome.yellow.state());
        prop_assert_eq!(red.phase, MatchPhase::GameOver);
        prop_assert_eq!(red.scores, yellow.scores);
        prop_assert_eq!(red.compute_hash(), yellow.compute_hash());
    }
}
