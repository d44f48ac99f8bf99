use std::collections::HashMap;

use anyhow::Result;
use tracing::error;

use crate::config::Config;
use crate::models::{InjuryStatus, Player, Position, RiskLevel};

/// Matchup swing is capped so a juicy opponent never outweighs player
/// quality.
const MATCHUP_ADJUSTMENT_CAP: f64 = 2.0;

/// Continuous evaluation for one player, with the component breakdown kept
/// for reporting and persistence.
#[derive(Debug, Clone)]
pub struct PlayerScore {
    pub player: Player,
    pub total_score: f64,
    pub base_projection: f64,
    pub matchup_adjustment: f64,
    pub injury_adjustment: f64,
    pub weather_adjustment: f64,
    pub trend_adjustment: f64,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

/// Component weights, all zero unless configured. With zero weights the
/// total collapses to the base projection and the odds-based score is what
/// actually drives decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationWeights {
    pub matchup: f64,
    pub injury: f64,
    pub weather: f64,
    pub trend: f64,
}

impl EvaluationWeights {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            matchup: cfg.matchup_weight,
            injury: cfg.injury_weight,
            weather: cfg.weather_weight,
            trend: cfg.trend_weight,
        }
    }

    fn any_configured(&self) -> bool {
        self.matchup != 0.0 || self.injury != 0.0 || self.weather != 0.0 || self.trend != 0.0
    }
}

/// Projection-path scorer. Pure over its inputs; the odds path lives in
/// `market_score`.
#[derive(Debug, Clone)]
pub struct PlayerEvaluator {
    weights: EvaluationWeights,
}

impl PlayerEvaluator {
    pub fn new(weights: EvaluationWeights) -> Self {
        Self { weights }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(EvaluationWeights::from_config(cfg))
    }

    /// Evaluate one player for a week. Never fails: an evaluation error is
    /// absorbed into a zero-score, zero-confidence result so one bad data
    /// point cannot discard the batch.
    pub fn evaluate_player(&self, player: &Player, week: u32) -> PlayerScore {
        match self.try_evaluate(player, week) {
            Ok(score) => score,
            Err(err) => {
                error!(player = %player.name, %err, "evaluation failed");
                PlayerScore {
                    player: player.clone(),
                    total_score: 0.0,
                    base_projection: 0.0,
                    matchup_adjustment: 0.0,
                    injury_adjustment: 0.0,
                    weather_adjustment: 0.0,
                    trend_adjustment: 0.0,
                    confidence: 0.0,
                    reasoning: vec![format!("Error in evaluation: {err}")],
                }
            }
        }
    }

    fn try_evaluate(&self, player: &Player, week: u32) -> Result<PlayerScore> {
        let base_projection = self.base_projection(player, week);
        let matchup_adjustment = matchup_adjustment(player);
        let injury_adjustment = injury_adjustment(player);
        let weather_adjustment = weather_adjustment(player);
        let trend_adjustment = trend_adjustment(player);

        let total_score = self.total_score(
            base_projection,
            matchup_adjustment,
            injury_adjustment,
            weather_adjustment,
            trend_adjustment,
        );
        let confidence = confidence(player);
        let reasoning = build_reasoning(
            player,
            base_projection,
            matchup_adjustment,
            injury_adjustment,
            weather_adjustment,
            trend_adjustment,
        );

        Ok(PlayerScore {
            player: player.clone(),
            total_score,
            base_projection,
            matchup_adjustment,
            injury_adjustment,
            weather_adjustment,
            trend_adjustment,
            confidence,
            reasoning,
        })
    }

    /// Base projection chain: exact-week projection, then recent scoring
    /// average (blended up when it sits suspiciously below the position
    /// norm), then the position-aware fallback.
    fn base_projection(&self, player: &Player, week: u32) -> f64 {
        if let Some(projection) = player.latest_projection()
            && projection.week == week
        {
            return projection.projected_points;
        }

        let recent_average = player.average_points(4);
        if recent_average > 0.0 {
            let position_avg = position_average(player.position);
            if recent_average < position_avg * 0.5 {
                // A slump this deep is as likely injury noise as true talent.
                return recent_average.max(position_avg * 0.6);
            }
            return recent_average;
        }

        fallback_projection(player)
    }

    fn total_score(
        &self,
        base: f64,
        matchup: f64,
        injury: f64,
        weather: f64,
        trend: f64,
    ) -> f64 {
        let mut total = base;
        if self.weights.any_configured() {
            total += matchup * self.weights.matchup * 10.0;
            total += injury * self.weights.injury;
            total += weather * self.weights.weather * 10.0;
            total += trend * self.weights.trend * 10.0;
        }
        total.max(0.0)
    }

    /// Per-position descending ranking over a candidate set.
    pub fn rank_players_by_position(
        &self,
        players: &[Player],
        week: u32,
    ) -> HashMap<Position, Vec<PlayerScore>> {
        let mut rankings: HashMap<Position, Vec<PlayerScore>> = HashMap::new();
        for player in players {
            rankings
                .entry(player.position)
                .or_default()
                .push(self.evaluate_player(player, week));
        }
        for scores in rankings.values_mut() {
            sort_scores_desc(scores);
        }
        rankings
    }

    /// Top `count` players across all positions.
    pub fn top_players(&self, players: &[Player], week: u32, count: usize) -> Vec<PlayerScore> {
        let mut scores: Vec<PlayerScore> = players
            .iter()
            .map(|p| self.evaluate_player(p, week))
            .collect();
        sort_scores_desc(&mut scores);
        scores.truncate(count);
        scores
    }
}

fn sort_scores_desc(scores: &mut [PlayerScore]) {
    scores.sort_by(|a, b| {
        b.total_score
            .total_cmp(&a.total_score)
            .then_with(|| a.player.name.cmp(&b.player.name))
    });
}

fn position_average(position: Position) -> f64 {
    match position {
        Position::Qb => 18.0,
        Position::Rb => 12.0,
        Position::Wr => 10.0,
        Position::Te => 8.0,
        Position::K => 8.0,
        Position::Def => 7.0,
    }
}

/// Position-aware fallback when no projection or recent average exists.
/// Starts from the position norm, leans on the latest single game when one
/// exists, scales for injury, and clamps to a plausible per-position range.
fn fallback_projection(player: &Player) -> f64 {
    let position_avg = position_average(player.position);
    let mut score = position_avg;

    if let Some(latest) = player.recent_stats(1).first()
        && latest.fantasy_points > 0.0
    {
        let recent = latest.fantasy_points;
        if (recent - position_avg).abs() > 2.0 {
            score = recent * 0.7 + position_avg * 0.3;
        } else {
            score = recent;
        }
    }

    if let Some(injury) = &player.injury {
        match injury.status {
            InjuryStatus::Out | InjuryStatus::InjuredReserve => score = 0.0,
            InjuryStatus::Doubtful => score *= 0.3,
            InjuryStatus::Questionable => score *= 0.7,
            InjuryStatus::Healthy => {}
        }
    }

    let (floor, ceiling) = match player.position {
        Position::Qb => (8.0, 25.0),
        Position::Rb => (3.0, 20.0),
        Position::Wr => (2.0, 18.0),
        Position::Te => (1.0, 15.0),
        Position::K => (5.0, 12.0),
        Position::Def => (2.0, 20.0),
    };
    score.clamp(floor, ceiling).max(0.0)
}

fn matchup_adjustment(player: &Player) -> f64 {
    let Some(matchup) = &player.matchup else {
        return 0.0;
    };

    let mut adjustment: f64 = 0.0;

    if let Some(ranking) = matchup.opponent_defense_ranking {
        if ranking <= 10 {
            adjustment -= 2.0;
        } else if ranking <= 20 {
            adjustment -= 0.5;
        } else if ranking >= 25 {
            adjustment += 1.0;
        }
    }

    if let Some(total) = matchup.game_total {
        if total >= 50.0 {
            adjustment += 1.0;
        } else if total >= 45.0 {
            adjustment += 0.3;
        } else if total <= 40.0 {
            adjustment -= 0.5;
        }
    }

    if let Some(spread) = matchup.spread {
        if matchup.is_home {
            if spread > 3.0 {
                adjustment += 0.3;
            } else if spread < -3.0 {
                adjustment -= 0.5;
            }
        } else if spread < -3.0 {
            adjustment += 0.3;
        } else if spread > 3.0 {
            adjustment -= 0.5;
        }
    }

    adjustment.clamp(-MATCHUP_ADJUSTMENT_CAP, MATCHUP_ADJUSTMENT_CAP)
}

fn injury_adjustment(player: &Player) -> f64 {
    let Some(injury) = &player.injury else {
        return 0.0;
    };

    match injury.status {
        InjuryStatus::Healthy => 0.0,
        InjuryStatus::Out | InjuryStatus::InjuredReserve => -50.0,
        InjuryStatus::Doubtful => -10.0,
        InjuryStatus::Questionable => match injury.probability_of_playing {
            Some(prob) if prob < 0.5 => -5.0,
            Some(prob) if prob < 0.75 => -2.0,
            Some(_) => -0.5,
            None => -3.0,
        },
    }
}

fn weather_adjustment(player: &Player) -> f64 {
    let Some(weather) = player.matchup.as_ref().and_then(|m| m.weather.as_ref()) else {
        return 0.0;
    };
    if weather.is_dome {
        return 0.0;
    }

    let mut adjustment = 0.0;
    let position = player.position;

    if let Some(wind) = weather.wind_speed
        && matches!(position, Position::Qb | Position::K)
    {
        if wind > 20.0 {
            adjustment -= 3.0;
        } else if wind > 15.0 {
            adjustment -= 1.5;
        } else if wind > 10.0 {
            adjustment -= 0.5;
        }
    }

    if let Some(precip) = weather.precipitation_chance
        && precip > 0.7
    {
        if matches!(position, Position::Qb | Position::Wr | Position::Te) {
            adjustment -= 1.0;
        } else if position == Position::K {
            adjustment -= 2.0;
        }
    }

    if let Some(temp) = weather.temperature
        && temp < 20.0
        && matches!(position, Position::Qb | Position::Wr | Position::Te)
    {
        adjustment -= 1.0;
    }

    adjustment
}

fn trend_adjustment(player: &Player) -> f64 {
    let trend = player.trend(4);
    if trend > 2.0 {
        2.0
    } else if trend > 1.0 {
        1.0
    } else if trend > 0.5 {
        0.5
    } else if trend < -2.0 {
        -2.0
    } else if trend < -1.0 {
        -1.0
    } else if trend < -0.5 {
        -0.5
    } else {
        0.0
    }
}

fn confidence(player: &Player) -> f64 {
    let mut confidence: f64 = 0.5;

    let recent = player.recent_stats(4);
    if recent.len() >= 3 {
        confidence += 0.2;
    } else if !recent.is_empty() {
        confidence += 0.1;
    }

    if player.latest_projection().is_some() {
        confidence += 0.2;
    }

    if let Some(injury) = &player.injury
        && matches!(injury.status, InjuryStatus::Healthy | InjuryStatus::Out)
    {
        confidence += 0.1;
    }

    if player.matchup.as_ref().is_some_and(|m| m.weather.is_some()) {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

fn build_reasoning(
    player: &Player,
    base: f64,
    matchup: f64,
    injury: f64,
    weather: f64,
    trend: f64,
) -> Vec<String> {
    let mut reasons = vec![format!("Base projection: {base:.1} points")];

    if matchup > 0.0 {
        reasons.push(format!("Favorable matchup (+{matchup:.1})"));
    } else if matchup < 0.0 {
        reasons.push(format!("Tough matchup ({matchup:.1})"));
    }

    if injury != 0.0
        && let Some(record) = &player.injury
    {
        reasons.push(format!(
            "Injury concern: {} ({injury:.1})",
            record.status.as_str()
        ));
    }

    if weather > 0.0 {
        reasons.push(format!("Favorable weather (+{weather:.1})"));
    } else if weather < 0.0 {
        reasons.push(format!("Weather concern ({weather:.1})"));
    }

    if trend > 0.0 {
        reasons.push(format!("Positive trend (+{trend:.1})"));
    } else if trend < 0.0 {
        reasons.push(format!("Declining trend ({trend:.1})"));
    }

    reasons
}

/// Lineup-wide risk from per-starter confidences: low only when confidence
/// is broadly high, high when it is broadly shaky or absent.
pub fn assess_risk_level(confidences: &[f64]) -> RiskLevel {
    if confidences.is_empty() {
        return RiskLevel::High;
    }

    let avg = confidences.iter().sum::<f64>() / confidences.len() as f64;
    let low_count = confidences.iter().filter(|&&c| c < 0.6).count();
    let low_ratio = low_count as f64 / confidences.len() as f64;

    if avg >= 0.8 && low_ratio <= 0.2 {
        RiskLevel::Low
    } else if avg >= 0.6 && low_ratio <= 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InjuryRecord, MatchupRecord, Projection, WeatherRecord, WeekStats};
    use chrono::Utc;

    fn stub_player(name: &str, position: Position) -> Player {
        Player {
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
            is_on_roster: true,
            is_starting: false,
        }
    }

    fn week_points(week: u32, points: f64) -> WeekStats {
        WeekStats {
            week,
            season: 2025,
            fantasy_points: points,
        }
    }

    fn evaluator() -> PlayerEvaluator {
        PlayerEvaluator::new(EvaluationWeights::default())
    }

    #[test]
    fn exact_week_projection_wins() {
        let mut player = stub_player("Patrick Mahomes", Position::Qb);
        player.projections.push(Projection {
            week: 5,
            season: 2025,
            projected_points: 22.4,
            source: "test".to_string(),
            timestamp: Utc::now(),
        });
        player.stats.push(week_points(4, 10.0));

        let score = evaluator().evaluate_player(&player, 5);
        assert_eq!(score.base_projection, 22.4);
    }

    #[test]
    fn stale_projection_falls_back_to_recent_average() {
        let mut player = stub_player("Josh Jacobs", Position::Rb);
        player.projections.push(Projection {
            week: 3,
            season: 2025,
            projected_points: 18.0,
            source: "test".to_string(),
            timestamp: Utc::now(),
        });
        player.stats.push(week_points(4, 14.0));
        player.stats.push(week_points(3, 10.0));

        let score = evaluator().evaluate_player(&player, 5);
        assert_eq!(score.base_projection, 12.0);
    }

    #[test]
    fn deep_slump_average_is_blended_toward_position_norm() {
        // RB norm is 12.0; an average of 4.0 sits below half of it, so the
        // base becomes max(4.0, 12.0 * 0.6) = 7.2.
        let mut player = stub_player("Slumping Back", Position::Rb);
        player.stats.push(week_points(4, 4.0));
        player.stats.push(week_points(3, 4.0));

        let score = evaluator().evaluate_player(&player, 5);
        assert!((score.base_projection - 7.2).abs() < 1e-9);
    }

    #[test]
    fn fallback_clamps_to_position_range() {
        // No stats, no projections: QB fallback is the 18.0 norm, within
        // the 8..25 clamp.
        let player = stub_player("Unknown Qb", Position::Qb);
        let score = evaluator().evaluate_player(&player, 1);
        assert_eq!(score.base_projection, 18.0);

        let mut out_player = stub_player("Shelved Qb", Position::Qb);
        out_player.injury = Some(InjuryRecord {
            status: InjuryStatus::Out,
            probability_of_playing: None,
            description: String::new(),
            source: String::new(),
            last_updated: None,
        });
        // OUT zeroes the fallback before clamping; the final max(0) keeps it
        // at the clamp floor only for playable players.
        let score = evaluator().evaluate_player(&out_player, 1);
        assert_eq!(score.base_projection, 8.0);
    }

    #[test]
    fn matchup_adjustment_is_clamped() {
        let mut player = stub_player("Stacked Matchup", Position::Wr);
        player.matchup = Some(MatchupRecord {
            opponent: "Carolina Panthers".to_string(),
            opponent_defense_ranking: Some(32),
            game_total: Some(54.0),
            spread: Some(7.0),
            weather: None,
            is_home: true,
        });
        // +1 rank, +1 total, +0.3 spread = 2.3, clamped to 2.0.
        assert_eq!(matchup_adjustment(&player), 2.0);
    }

    #[test]
    fn dome_zeroes_weather() {
        let mut player = stub_player("Dome Qb", Position::Qb);
        player.matchup = Some(MatchupRecord {
            opponent: "Detroit Lions".to_string(),
            opponent_defense_ranking: None,
            game_total: None,
            spread: None,
            weather: Some(WeatherRecord {
                temperature: Some(10.0),
                wind_speed: Some(25.0),
                precipitation_chance: Some(0.9),
                is_dome: true,
            }),
            is_home: false,
        });
        assert_eq!(weather_adjustment(&player), 0.0);
    }

    #[test]
    fn hard_wind_hits_qb_and_kicker_only() {
        let weather = WeatherRecord {
            temperature: Some(50.0),
            wind_speed: Some(22.0),
            precipitation_chance: None,
            is_dome: false,
        };
        for (position, expected) in [(Position::Qb, -3.0), (Position::K, -3.0), (Position::Rb, 0.0)]
        {
            let mut player = stub_player("Windy Player", position);
            player.matchup = Some(MatchupRecord {
                opponent: "Buffalo Bills".to_string(),
                opponent_defense_ranking: None,
                game_total: None,
                spread: None,
                weather: Some(weather.clone()),
                is_home: true,
            });
            assert_eq!(weather_adjustment(&player), expected, "{position:?}");
        }
    }

    #[test]
    fn zero_weights_collapse_to_base_projection() {
        let mut player = stub_player("Weighted Player", Position::Wr);
        player.stats.push(week_points(4, 15.0));
        player.stats.push(week_points(3, 9.0));
        player.matchup = Some(MatchupRecord {
            opponent: "Carolina Panthers".to_string(),
            opponent_defense_ranking: Some(30),
            game_total: Some(52.0),
            spread: None,
            weather: None,
            is_home: true,
        });

        let score = evaluator().evaluate_player(&player, 5);
        assert_eq!(score.total_score, score.base_projection);
        assert!(score.matchup_adjustment > 0.0);
    }

    #[test]
    fn configured_weights_apply_and_floor_at_zero() {
        let weights = EvaluationWeights {
            matchup: 0.0,
            injury: 1.0,
            weather: 0.0,
            trend: 0.0,
        };
        let mut player = stub_player("Hurt Player", Position::Te);
        player.injury = Some(InjuryRecord {
            status: InjuryStatus::Out,
            probability_of_playing: None,
            description: String::new(),
            source: String::new(),
            last_updated: None,
        });
        // Fallback base is 0 for OUT before clamp... clamped to TE floor 1.0,
        // then injury -50 * 1.0 drags the total well below zero.
        let score = PlayerEvaluator::new(weights).evaluate_player(&player, 1);
        assert_eq!(score.total_score, 0.0);
    }

    #[test]
    fn confidence_caps_at_one() {
        let mut player = stub_player("Known Quantity", Position::Rb);
        for week in 1..=4 {
            player.stats.push(week_points(week, 12.0));
        }
        player.projections.push(Projection {
            week: 5,
            season: 2025,
            projected_points: 13.0,
            source: "test".to_string(),
            timestamp: Utc::now(),
        });
        player.injury = Some(InjuryRecord {
            status: InjuryStatus::Healthy,
            probability_of_playing: Some(1.0),
            description: String::new(),
            source: String::new(),
            last_updated: None,
        });
        player.matchup = Some(MatchupRecord {
            opponent: "New York Jets".to_string(),
            opponent_defense_ranking: None,
            game_total: None,
            spread: None,
            weather: Some(WeatherRecord {
                temperature: Some(60.0),
                wind_speed: Some(5.0),
                precipitation_chance: Some(0.1),
                is_dome: false,
            }),
            is_home: true,
        });

        let score = evaluator().evaluate_player(&player, 5);
        assert_eq!(score.confidence, 1.0);
    }

    #[test]
    fn sparse_data_confidence() {
        // One stat week, nothing else: 0.5 + 0.1.
        let mut player = stub_player("Rookie", Position::Wr);
        player.stats.push(week_points(4, 8.0));
        let score = evaluator().evaluate_player(&player, 5);
        assert!((score.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn trend_buckets() {
        for (points, expected) in [
            (vec![(4, 20.0), (3, 12.0), (2, 10.0)], 2.0),
            (vec![(4, 14.0), (3, 12.0), (2, 10.0)], 1.0),
            (vec![(4, 12.0), (3, 11.0), (2, 10.0)], 0.5),
            (vec![(4, 10.0), (3, 12.0), (2, 20.0)], -2.0),
            (vec![(4, 10.0), (3, 10.0), (2, 10.0)], 0.0),
        ] {
            let mut player = stub_player("Trender", Position::Rb);
            for (week, pts) in &points {
                player.stats.push(week_points(*week, *pts));
            }
            assert_eq!(trend_adjustment(&player), expected, "{points:?}");
        }
    }

    #[test]
    fn ranking_groups_and_sorts() {
        let mut hot = stub_player("Hot Back", Position::Rb);
        hot.stats.push(week_points(4, 20.0));
        hot.stats.push(week_points(3, 20.0));
        let mut cold = stub_player("Cold Back", Position::Rb);
        cold.stats.push(week_points(4, 6.5));
        cold.stats.push(week_points(3, 6.5));
        let qb = stub_player("Lone Qb", Position::Qb);

        let rankings =
            evaluator().rank_players_by_position(&[cold.clone(), hot.clone(), qb.clone()], 5);
        let rbs = &rankings[&Position::Rb];
        assert_eq!(rbs[0].player.name, "Hot Back");
        assert_eq!(rbs[1].player.name, "Cold Back");
        assert_eq!(rankings[&Position::Qb].len(), 1);
    }

    #[test]
    fn risk_level_tiers() {
        assert_eq!(assess_risk_level(&[]), RiskLevel::High);
        assert_eq!(assess_risk_level(&[0.9, 0.85, 0.9, 0.8, 0.9]), RiskLevel::Low);
        assert_eq!(assess_risk_level(&[0.7, 0.65, 0.5, 0.7, 0.7]), RiskLevel::Medium);
        assert_eq!(assess_risk_level(&[0.5, 0.4, 0.5, 0.5]), RiskLevel::High);
    }
}
