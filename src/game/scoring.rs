//! Scoring
//!
//! Pure function from a stone set to the result of an end. Both peers
//! derive it independently from their own (reconciled) stones.

use serde::{Serialize, Deserialize};

use crate::game::state::{Stone, Team};
use crate::game::surface::{distance_to_button, in_house};

/// Result of scoring an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundResult {
    /// Scoring team, `None` for a blank end
    pub team: Option<Team>,
    /// Points scored
    pub points: u32,
}

impl RoundResult {
    /// A blank end.
    pub const BLANK: Self = Self { team: None, points: 0 };

    /// True if nobody scored.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.team.is_none() || self.points == 0
    }
}

/// Score a stone set.
///
/// Only active stones within house radius + stone radius count. The team
/// with the closest stone scores one point for each of its stones closer
/// than the opponent's closest stone. When the two closest stones of
/// opposite teams are exactly equidistant the end is blank, so the result
/// never depends on the order of `stones`.
pub fn calculate_score(stones: &[Stone]) -> RoundResult {
    let mut candidates: Vec<(f64, Team)> = stones
        .iter()
        .filter(|s| s.active && in_house(s.position))
        .map(|s| (distance_to_button(s.position), s.team))
        .collect();

    if candidates.is_empty() {
        return RoundResult::BLANK;
    }

    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let closest = candidates[0].0;
    let contenders = candidates
        .iter()
        .take_while(|(d, _)| *d == closest)
        .map(|(_, t)| *t);
    let mut scoring_team = None;
    for team in contenders {
        match scoring_team {
            None => scoring_team = Some(team),
            Some(t) if t != team => return RoundResult::BLANK,
            Some(_) => {}
        }
    }
    let Some(team) = scoring_team else {
        return RoundResult::BLANK;
    };

    let cutoff = candidates
        .iter()
        .find(|(_, t)| *t != team)
        .map(|(d, _)| *d)
        .unwrap_or(f64::INFINITY);

    let points = candidates
        .iter()
        .filter(|(d, t)| *t == team && *d < cutoff)
        .count() as u32;

    RoundResult { team: Some(team), points }
}
