//! Throw Ordering and Reconciliation
//!
//! [`ThrowGate`] orders incoming peer messages by [`ThrowId`]: messages for
//! a throw that is already over are dropped, messages for a throw that has
//! not started yet are held until it does.
//!
//! [`apply_sync_stones`] is the reconciliation step. It replaces the local
//! stone set wholesale with the throw owner's, so float drift between the
//! two simulations never survives past the end of a throw.

use std::collections::BTreeMap;
use tracing::debug;

use crate::game::state::{stones_hash, MatchPhase, MatchState, ThrowId};
use crate::network::protocol::{GameStateRecord, PeerMessage, StoneSnapshot};

/// Default cap on held messages.
pub const DEFAULT_MAX_BUFFERED: usize = 512;

// =============================================================================
// THROW GATE
// =============================================================================

/// Orders peer messages by throw.
#[derive(Debug)]
pub struct ThrowGate {
    pending: BTreeMap<ThrowId, Vec<PeerMessage>>,
    buffered: usize,
    max_buffered: usize,
}

impl Default for ThrowGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED)
    }
}

impl ThrowGate {
    /// Create a gate holding at most `max_buffered` messages.
    pub fn new(max_buffered: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            buffered: 0,
            max_buffered,
        }
    }

    /// Sort a message against the current throw.
    ///
    /// Returns the message if it can be handled now. Stale messages are
    /// dropped; future ones are held.
    pub fn admit(&mut self, message: PeerMessage, current: ThrowId) -> Option<PeerMessage> {
        let Some(throw) = message.throw_id() else {
            return Some(message);
        };

        if throw < current {
            debug!(kind = message.kind(), ?throw, ?current, "stale message dropped");
            None
        } else if throw > current {
            self.hold(throw, message);
            None
        } else {
            Some(message)
        }
    }

    /// Hold a message for its throw even though that throw is current
    /// (e.g. a sweep that overtook its launch).
    pub fn defer(&mut self, message: PeerMessage) {
        if let Some(throw) = message.throw_id() {
            self.hold(throw, message);
        }
    }

    fn hold(&mut self, throw: ThrowId, message: PeerMessage) {
        if self.buffered >= self.max_buffered {
            debug!(kind = message.kind(), ?throw, "gate full, message dropped");
            return;
        }
        debug!(kind = message.kind(), ?throw, "message held for later throw");
        self.pending.entry(throw).or_default().push(message);
        self.buffered += 1;
    }

    /// Drop everything older than `current` and hand back what is held for it.
    pub fn release(&mut self, current: ThrowId) -> Vec<PeerMessage> {
        let later = self.pending.split_off(&current);
        let dropped: usize = self.pending.values().map(Vec::len).sum();
        if dropped > 0 {
            debug!(dropped, ?current, "stale held messages dropped");
        }
        self.pending = later;

        let ready = self.pending.remove(&current).unwrap_or_default();
        self.buffered = self.pending.values().map(Vec::len).sum();
        ready
    }

    /// Messages currently held.
    pub fn len(&self) -> usize {
        self.buffered
    }

    /// True if nothing is held.
    pub fn is_empty(&self) -> bool {
        self.buffered == 0
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.buffered = 0;
    }
}

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Outcome of applying a sync-stones snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local stones already matched
    InSync,
    /// Local stones differed and were replaced
    Corrected,
    /// Snapshot could not be decoded; nothing changed
    Rejected,
}

/// Replace the local stone set with a snapshot.
///
/// Full replace, never a merge: applying the same snapshot twice leaves the
/// same stones. A mismatch with the local set is a desync, logged at debug
/// level.
pub fn apply_sync_stones(state: &mut MatchState, snapshot: &StoneSnapshot) -> SyncOutcome {
    let Some(stones) = snapshot.to_stones() else {
        return SyncOutcome::Rejected;
    };

    let local = hex::encode(stones_hash(&state.stones));
    state.stones = stones;

    if local == snapshot.state_hash {
        SyncOutcome::InSync
    } else {
        debug!(
            throw = ?snapshot.throw,
            local = %&local[..16],
            remote = %snapshot.state_hash.get(..16).unwrap_or(&snapshot.state_hash),
            "desync corrected by sync-stones"
        );
        SyncOutcome::Corrected
    }
}

/// Adopt the peer's end-transition record.
///
/// Only taken between ends (`EndOver`/`GameOver`); returns false otherwise.
pub fn apply_game_state(state: &mut MatchState, record: &GameStateRecord) -> bool {
    if !matches!(state.phase, MatchPhase::EndOver | MatchPhase::GameOver) {
        return false;
    }
    let Some(hammer) = record.hammer_team() else {
        return false;
    };

    if state.scores != record.scores || state.hammer != hammer || state.current_end != record.current_end {
        debug!(
            local_scores = ?state.scores,
            remote_scores = ?record.scores,
            "end result differs from peer, adopting peer"
        );
    }
    state.total_ends = record.total_ends;
    state.current_end = record.current_end;
    state.scores = record.scores;
    state.hammer = hammer;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::state::{Stone, Team};
    use crate::game::surface::button;
    use std::time::Instant;

    fn id(end: u32, index: u32) -> ThrowId {
        ThrowId { end, index }
    }

    fn timeout(end: u32, index: u32) -> PeerMessage {
        PeerMessage::Timeout { throw: id(end, index), team: 0 }
    }

    #[test]
    fn test_gate_orders_by_throw() {
        let mut gate = ThrowGate::default();
        let current = id(2, 4);

        assert!(gate.admit(timeout(2, 3), current).is_none());
        assert!(gate.admit(timeout(1, 15), current).is_none());
        assert!(gate.is_empty());

        assert_eq!(gate.admit(timeout(2, 4), current), Some(timeout(2, 4)));

        assert!(gate.admit(timeout(2, 5), current).is_none());
        assert!(gate.admit(timeout(3, 0), current).is_none());
        assert_eq!(gate.len(), 2);

        assert_eq!(gate.release(id(2, 5)), vec![timeout(2, 5)]);
        assert_eq!(gate.len(), 1);
        assert_eq!(gate.release(id(3, 0)), vec![timeout(3, 0)]);
        assert!(gate.is_empty());
    }

    #[test]
    fn test_gate_release_drops_stale() {
        let mut gate = ThrowGate::default();
        gate.defer(timeout(1, 2));
        gate.defer(timeout(1, 3));
        assert_eq!(gate.len(), 2);
        assert!(gate.release(id(1, 4)).is_empty());
        assert!(gate.is_empty());
    }

    #[test]
    fn test_gate_game_state_passes() {
        let mut gate = ThrowGate::default();
        let record = GameStateRecord { total_ends: 8, current_end: 2, scores: [1, 0], hammer: 1 };
        let msg = PeerMessage::GameState(record);
        assert_eq!(gate.admit(msg.clone(), id(5, 0)), Some(msg));
    }

    #[test]
    fn test_gate_cap() {
        let mut gate = ThrowGate::new(3);
        for i in 0..10 {
            gate.defer(timeout(9, i));
        }
        assert_eq!(gate.len(), 3);
    }

    #[test]
    fn test_sync_stones_replace_is_idempotent() {
        let now = Instant::now();
        let authoritative = vec![
            Stone::at_rest(Team::Red, button()),
            Stone::at_rest(Team::Yellow, Vec2::new(170.0, 260.0)),
        ];
        let snapshot = StoneSnapshot::capture(id(1, 1), &authoritative);

        let mut state = MatchState::new(8, Team::Yellow, now);
        state.stones = vec![
            Stone::at_rest(Team::Red, button() + Vec2::new(0.3, -0.2)),
            Stone::at_rest(Team::Yellow, Vec2::new(171.0, 259.0)),
        ];

        assert_eq!(apply_sync_stones(&mut state, &snapshot), SyncOutcome::Corrected);
        assert_eq!(state.stones, authoritative);
        let once = state.compute_hash();

        assert_eq!(apply_sync_stones(&mut state, &snapshot), SyncOutcome::InSync);
        assert_eq!(state.compute_hash(), once);
    }

    #[test]
    fn test_sync_stones_never_merges() {
        let now = Instant::now();
        let snapshot = StoneSnapshot::capture(id(1, 0), &[Stone::at_rest(Team::Red, button())]);
        let mut state = MatchState::new(8, Team::Yellow, now);
        state.stones = vec![
            Stone::at_rest(Team::Yellow, Vec2::new(100.0, 300.0)),
            Stone::at_rest(Team::Yellow, Vec2::new(200.0, 300.0)),
            Stone::at_rest(Team::Yellow, Vec2::new(150.0, 400.0)),
        ];
        apply_sync_stones(&mut state, &snapshot);
        assert_eq!(state.stones.len(), 1);
    }

    #[test]
    fn test_sync_stones_rejects_bad_record() {
        let now = Instant::now();
        let mut snapshot = StoneSnapshot::capture(id(1, 0), &[Stone::at_rest(Team::Red, button())]);
        snapshot.stones[0].team = 4;
        let mut state = MatchState::new(8, Team::Yellow, now);
        state.stones = vec![Stone::at_rest(Team::Yellow, button())];
        assert_eq!(apply_sync_stones(&mut state, &snapshot), SyncOutcome::Rejected);
        assert_eq!(state.stones[0].team, Team::Yellow);
    }

    #[test]
    fn test_game_state_only_between_ends() {
        let now = Instant::now();
        let mut state = MatchState::new(8, Team::Yellow, now);
        let record = GameStateRecord { total_ends: 8, current_end: 2, scores: [2, 0], hammer: 1 };
        assert!(!apply_game_state(&mut state, &record));

        state.set_phase(MatchPhase::EndOver, now);
        assert!(apply_game_state(&mut state, &record));
        assert_eq!(state.scores, [2, 0]);
        assert_eq!(state.hammer, Team::Yellow);
        assert_eq!(state.current_end, 2);
    }
}
