use std::collections::HashMap;

use crate::market_score::MarketAnalysis;
use crate::models::{Lineup, LineupSlot, Player, Position, RiskLevel, SlotKind};

/// One scored player entering lineup assembly.
#[derive(Debug, Clone)]
pub struct LineupCandidate {
    pub player: Player,
    pub analysis: MarketAnalysis,
}

impl LineupCandidate {
    pub fn new(player: Player, analysis: MarketAnalysis) -> Self {
        Self { player, analysis }
    }

    fn score(&self) -> i32 {
        self.analysis.score
    }
}

/// Greedy slot assignment over position buckets. No swapping or
/// backtracking once a slot is filled; an empty bucket leaves its slot
/// unfilled rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct AssembledLineup {
    pub qb: Option<LineupCandidate>,
    pub rb1: Option<LineupCandidate>,
    pub rb2: Option<LineupCandidate>,
    pub wr1: Option<LineupCandidate>,
    pub wr2: Option<LineupCandidate>,
    pub flex: Option<LineupCandidate>,
    pub te: Option<LineupCandidate>,
    pub k: Option<LineupCandidate>,
    pub def: Option<LineupCandidate>,
    pub bench: Vec<LineupCandidate>,
}

impl AssembledLineup {
    /// Starting slots in platform submission order.
    pub fn starting_slots(&self) -> [(SlotKind, Option<&LineupCandidate>); 9] {
        [
            (SlotKind::Qb, self.qb.as_ref()),
            (SlotKind::Rb1, self.rb1.as_ref()),
            (SlotKind::Rb2, self.rb2.as_ref()),
            (SlotKind::Wr1, self.wr1.as_ref()),
            (SlotKind::Wr2, self.wr2.as_ref()),
            (SlotKind::Flex, self.flex.as_ref()),
            (SlotKind::Te, self.te.as_ref()),
            (SlotKind::K, self.k.as_ref()),
            (SlotKind::Def, self.def.as_ref()),
        ]
    }

    pub fn starters(&self) -> impl Iterator<Item = &LineupCandidate> {
        self.starting_slots().into_iter().filter_map(|(_, c)| c)
    }

    pub fn total_score(&self) -> i32 {
        self.starters().map(LineupCandidate::score).sum()
    }

    /// Convert to the submission-shaped lineup. `confidences` maps player id
    /// to evaluator confidence; starters missing from the map count as
    /// unknown for risk purposes.
    pub fn to_lineup(
        &self,
        team_id: &str,
        week: u32,
        season: u32,
        confidences: &HashMap<String, f64>,
    ) -> Lineup {
        let mut slots = Vec::new();
        for (kind, candidate) in self.starting_slots() {
            let mut slot = LineupSlot::empty(kind, true);
            if let Some(candidate) = candidate {
                slot.player = Some(candidate.player.clone());
                slot.is_filled = true;
            }
            slots.push(slot);
        }
        for candidate in &self.bench {
            let mut slot = LineupSlot::empty(SlotKind::Bench, false);
            slot.player = Some(candidate.player.clone());
            slot.is_filled = true;
            slots.push(slot);
        }

        let starter_confidences: Vec<f64> = self
            .starters()
            .filter_map(|c| confidences.get(&c.player.player_id).copied())
            .collect();
        let risk_level = crate::evaluator::assess_risk_level(&starter_confidences);

        Lineup {
            team_id: team_id.to_string(),
            week,
            season,
            slots,
            total_projected_points: self.total_score() as f64,
            risk_level,
        }
    }
}

/// Assemble the best lineup from scored candidates. Fully deterministic:
/// buckets sort by score, then real-market-data flag, then rostered flag,
/// then name ascending.
pub fn assemble_lineup(candidates: Vec<LineupCandidate>) -> AssembledLineup {
    let mut buckets: HashMap<Position, Vec<LineupCandidate>> = HashMap::new();
    let mut excluded: Vec<LineupCandidate> = Vec::new();

    for candidate in candidates {
        // Negative score means injury-excluded; they go straight to the
        // bench pool, never a starting bucket.
        if candidate.score() < 0 {
            excluded.push(candidate);
            continue;
        }
        buckets
            .entry(candidate.player.position)
            .or_default()
            .push(candidate);
    }

    for bucket in buckets.values_mut() {
        sort_bucket(bucket);
    }

    let mut lineup = AssembledLineup::default();
    let mut used: Vec<String> = Vec::new();

    let mut take = |bucket: Option<&Vec<LineupCandidate>>, index: usize, used: &mut Vec<String>| {
        let candidate = bucket.and_then(|b| b.get(index)).cloned();
        if let Some(c) = &candidate {
            used.push(c.player.player_id.clone());
        }
        candidate
    };

    lineup.qb = take(buckets.get(&Position::Qb), 0, &mut used);
    lineup.rb1 = take(buckets.get(&Position::Rb), 0, &mut used);
    lineup.rb2 = take(buckets.get(&Position::Rb), 1, &mut used);
    lineup.wr1 = take(buckets.get(&Position::Wr), 0, &mut used);
    lineup.wr2 = take(buckets.get(&Position::Wr), 1, &mut used);
    lineup.te = take(buckets.get(&Position::Te), 0, &mut used);
    lineup.k = take(buckets.get(&Position::K), 0, &mut used);
    lineup.def = take(buckets.get(&Position::Def), 0, &mut used);

    // Flex pool: everything left beyond the named RB/WR/TE slots.
    let mut flex_pool: Vec<LineupCandidate> = Vec::new();
    if let Some(rbs) = buckets.get(&Position::Rb) {
        flex_pool.extend(rbs.iter().skip(2).cloned());
    }
    if let Some(wrs) = buckets.get(&Position::Wr) {
        flex_pool.extend(wrs.iter().skip(2).cloned());
    }
    if let Some(tes) = buckets.get(&Position::Te) {
        flex_pool.extend(tes.iter().skip(1).cloned());
    }
    sort_bucket(&mut flex_pool);
    lineup.flex = take(Some(&flex_pool), 0, &mut used);

    // Everyone not in a named slot rides the bench, highest score first.
    let mut bench: Vec<LineupCandidate> = buckets
        .into_values()
        .flatten()
        .chain(excluded)
        .filter(|c| !used.contains(&c.player.player_id))
        .collect();
    bench.sort_by(|a, b| {
        b.score()
            .cmp(&a.score())
            .then_with(|| a.player.name.cmp(&b.player.name))
    });
    lineup.bench = bench;

    lineup
}

fn sort_bucket(bucket: &mut [LineupCandidate]) {
    bucket.sort_by(|a, b| {
        b.score()
            .cmp(&a.score())
            .then_with(|| b.analysis.has_betting_data.cmp(&a.analysis.has_betting_data))
            .then_with(|| b.player.is_on_roster.cmp(&a.player.is_on_roster))
            .then_with(|| a.player.name.cmp(&b.player.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;

    fn candidate(name: &str, position: Position, score: i32) -> LineupCandidate {
        candidate_full(name, position, score, true, true)
    }

    fn candidate_full(
        name: &str,
        position: Position,
        score: i32,
        has_data: bool,
        on_roster: bool,
    ) -> LineupCandidate {
        let player = Player {
            player_id: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            position,
            team: "Kansas City Chiefs".to_string(),
            eligible_positions: vec![position],
            injury: None,
            stats: Vec::new(),
            projections: Vec::new(),
            matchup: None,
            bye_week: None,
            is_on_roster: on_roster,
            is_starting: false,
        };
        let mut analysis = crate::market_score::analyze_market(
            name,
            &player.team,
            &crate::odds_api::OddsRecord::empty(&player.team),
            position,
            None,
        );
        analysis.score = score;
        analysis.has_betting_data = has_data;
        LineupCandidate::new(player, analysis)
    }

    fn full_roster() -> Vec<LineupCandidate> {
        vec![
            candidate("Qb One", Position::Qb, 8),
            candidate("Rb One", Position::Rb, 7),
            candidate("Rb Two", Position::Rb, 6),
            candidate("Rb Three", Position::Rb, 5),
            candidate("Wr One", Position::Wr, 7),
            candidate("Wr Two", Position::Wr, 4),
            candidate("Wr Three", Position::Wr, 3),
            candidate("Te One", Position::Te, 4),
            candidate("Te Two", Position::Te, 2),
            candidate("K One", Position::K, 1),
            candidate("Def One", Position::Def, 2),
        ]
    }

    #[test]
    fn fills_all_named_slots() {
        let lineup = assemble_lineup(full_roster());
        assert_eq!(lineup.qb.as_ref().unwrap().player.name, "Qb One");
        assert_eq!(lineup.rb1.as_ref().unwrap().player.name, "Rb One");
        assert_eq!(lineup.rb2.as_ref().unwrap().player.name, "Rb Two");
        assert_eq!(lineup.wr1.as_ref().unwrap().player.name, "Wr One");
        assert_eq!(lineup.wr2.as_ref().unwrap().player.name, "Wr Two");
        assert_eq!(lineup.te.as_ref().unwrap().player.name, "Te One");
        assert_eq!(lineup.k.as_ref().unwrap().player.name, "K One");
        assert_eq!(lineup.def.as_ref().unwrap().player.name, "Def One");
        // Best leftover is the third RB at 5, over WR3 (3) and TE2 (2).
        assert_eq!(lineup.flex.as_ref().unwrap().player.name, "Rb Three");
    }

    #[test]
    fn no_player_fills_two_slots() {
        let lineup = assemble_lineup(full_roster());
        let mut seen = Vec::new();
        for c in lineup.starters() {
            assert!(!seen.contains(&c.player.player_id), "{}", c.player.name);
            seen.push(c.player.player_id.clone());
        }
        for c in &lineup.bench {
            assert!(!seen.contains(&c.player.player_id), "{}", c.player.name);
        }
    }

    #[test]
    fn empty_bucket_leaves_slots_unfilled() {
        let lineup = assemble_lineup(vec![
            candidate("Qb One", Position::Qb, 8),
            candidate("Wr One", Position::Wr, 7),
        ]);
        assert!(lineup.rb1.is_none());
        assert!(lineup.rb2.is_none());
        assert!(lineup.te.is_none());
        assert!(lineup.flex.is_none());
    }

    #[test]
    fn single_rb_fills_rb1_only() {
        let lineup = assemble_lineup(vec![candidate("Lone Back", Position::Rb, 5)]);
        assert_eq!(lineup.rb1.as_ref().unwrap().player.name, "Lone Back");
        assert!(lineup.rb2.is_none());
    }

    #[test]
    fn negative_score_is_excluded_from_slots_but_benched() {
        let lineup = assemble_lineup(vec![
            candidate("Healthy Back", Position::Rb, 3),
            candidate("Injured Back", Position::Rb, -100),
        ]);
        assert_eq!(lineup.rb1.as_ref().unwrap().player.name, "Healthy Back");
        assert!(lineup.rb2.is_none());
        assert!(lineup.flex.is_none());
        assert_eq!(lineup.bench.len(), 1);
        assert_eq!(lineup.bench[0].player.name, "Injured Back");
    }

    #[test]
    fn tie_breaks_are_deterministic() {
        // Equal scores: real data first, then rostered, then name ascending.
        let lineup = assemble_lineup(vec![
            candidate_full("Zeta Receiver", Position::Wr, 4, true, true),
            candidate_full("Alpha Receiver", Position::Wr, 4, true, true),
            candidate_full("Floor Receiver", Position::Wr, 4, false, true),
            candidate_full("Street Receiver", Position::Wr, 4, true, false),
        ]);
        assert_eq!(lineup.wr1.as_ref().unwrap().player.name, "Alpha Receiver");
        assert_eq!(lineup.wr2.as_ref().unwrap().player.name, "Zeta Receiver");
        assert_eq!(lineup.flex.as_ref().unwrap().player.name, "Street Receiver");
    }

    #[test]
    fn assembly_is_idempotent() {
        let a = assemble_lineup(full_roster());
        let b = assemble_lineup(full_roster());
        let names = |l: &AssembledLineup| {
            l.starters()
                .map(|c| c.player.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&a), names(&b));
        assert_eq!(a.total_score(), b.total_score());
    }

    #[test]
    fn conversion_carries_slots_and_risk() {
        let assembled = assemble_lineup(full_roster());
        let confidences: HashMap<String, f64> = assembled
            .starters()
            .map(|c| (c.player.player_id.clone(), 0.9))
            .collect();
        let lineup = assembled.to_lineup("414.l.123.t.4", 5, 2025, &confidences);

        assert_eq!(lineup.week, 5);
        assert_eq!(lineup.risk_level, RiskLevel::Low);
        assert_eq!(lineup.starters().count(), 9);
        assert_eq!(lineup.total_projected_points, assembled.total_score() as f64);
        assert_eq!(lineup.bench().count(), assembled.bench.len());
    }

    #[test]
    fn conversion_without_confidences_is_high_risk() {
        let assembled = assemble_lineup(full_roster());
        let lineup = assembled.to_lineup("414.l.123.t.4", 5, 2025, &HashMap::new());
        assert_eq!(lineup.risk_level, RiskLevel::High);
    }
}
