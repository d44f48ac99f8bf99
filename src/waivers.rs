use std::collections::HashMap;

use crate::evaluator::PlayerScore;
use crate::lineup::LineupCandidate;
use crate::models::{Player, Position};

/// Minimum improvement before a swap is worth a waiver claim, odds path.
pub const MARKET_IMPROVEMENT_THRESHOLD: f64 = 5.0;
/// Minimum improvement on the projection path, where scores are continuous
/// and smaller.
pub const EVALUATOR_IMPROVEMENT_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct WaiverSuggestion {
    pub add: Player,
    pub add_score: f64,
    pub drop: Player,
    pub drop_score: f64,
    pub improvement: f64,
    pub position: Position,
}

/// One scored player entering waiver comparison.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub player: Player,
    pub score: f64,
}

impl ScoredEntry {
    pub fn from_candidate(candidate: &LineupCandidate) -> Self {
        Self {
            player: candidate.player.clone(),
            score: candidate.analysis.score as f64,
        }
    }

    pub fn from_player_score(score: &PlayerScore) -> Self {
        Self {
            player: score.player.clone(),
            score: score.total_score,
        }
    }
}

/// Compare roster to free-agent pool per position and propose swaps.
///
/// For each position the worst rostered players are walked in ascending
/// score order against the best unclaimed free agents; a free agent must
/// beat the drop candidate by strictly more than `threshold` to qualify,
/// and each qualifying free agent is consumed so one pickup is never
/// suggested against several drops. Results are ordered by improvement,
/// largest first, and truncated to `max_suggestions`.
pub fn find_waiver_moves(
    roster: &[ScoredEntry],
    free_agents: &[ScoredEntry],
    threshold: f64,
    max_suggestions: usize,
) -> Vec<WaiverSuggestion> {
    let mut roster_by_position: HashMap<Position, Vec<&ScoredEntry>> = HashMap::new();
    for entry in roster {
        roster_by_position
            .entry(entry.player.position)
            .or_default()
            .push(entry);
    }

    let mut pool_by_position: HashMap<Position, Vec<&ScoredEntry>> = HashMap::new();
    for entry in free_agents {
        pool_by_position
            .entry(entry.player.position)
            .or_default()
            .push(entry);
    }

    let mut suggestions = Vec::new();

    for position in Position::ALL {
        let Some(drops) = roster_by_position.get_mut(&position) else {
            continue;
        };
        let Some(pool) = pool_by_position.get_mut(&position) else {
            continue;
        };

        // Worst rostered first, best available first.
        drops.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.player.name.cmp(&b.player.name))
        });
        pool.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.player.name.cmp(&b.player.name))
        });

        let mut consumed = vec![false; pool.len()];
        for drop in drops.iter() {
            let Some((index, add)) = pool
                .iter()
                .enumerate()
                .find(|(i, fa)| !consumed[*i] && fa.score > drop.score + threshold)
            else {
                continue;
            };
            consumed[index] = true;
            suggestions.push(WaiverSuggestion {
                add: add.player.clone(),
                add_score: add.score,
                drop: drop.player.clone(),
                drop_score: drop.score,
                improvement: add.score - drop.score,
                position,
            });
        }
    }

    suggestions.sort_by(|a, b| {
        b.improvement
            .total_cmp(&a.improvement)
            .then_with(|| a.add.name.cmp(&b.add.name))
    });
    suggestions.truncate(max_suggestions);
    suggestions
}
