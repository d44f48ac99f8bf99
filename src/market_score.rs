use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::models::{InjuryRecord, InjuryStatus, Player, Position};
use crate::odds_api::{OddsRecord, team_matches};

/// Score forced onto players who must not start (OUT/IR, or too unlikely to
/// play). Negative enough that the assembler drops them from every bucket.
pub const EXCLUDED_SCORE: i32 = -100;

/// Inclusive week window for commence-time filtering (waiver path).
pub type WeekWindow = (DateTime<Utc>, DateTime<Utc>);

/// Market-derived betting analysis for one player, one run.
#[derive(Debug, Clone)]
pub struct MarketAnalysis {
    pub name: String,
    pub team: String,
    pub position: Position,
    pub game_total: Option<f64>,
    pub spread: Option<f64>,
    pub td_price: Option<i32>,
    pub reception_line: Option<f64>,
    pub rush_line: Option<f64>,
    pub score: i32,
    pub insights: Vec<String>,
    pub has_betting_data: bool,
}

impl MarketAnalysis {
    fn new(name: &str, team: &str, position: Position) -> Self {
        Self {
            name: name.to_string(),
            team: team.to_string(),
            position,
            game_total: None,
            spread: None,
            td_price: None,
            reception_line: None,
            rush_line: None,
            score: 0,
            insights: Vec::new(),
            has_betting_data: false,
        }
    }

    pub fn flex_eligible(&self) -> bool {
        self.position.flex_eligible()
    }
}

/// Full market scoring for one player: market accumulation, then the no-data
/// positional floor, then the injury overlay. Deterministic for identical
/// inputs.
pub fn score_player(
    player: &Player,
    odds: &OddsRecord,
    week_window: Option<WeekWindow>,
) -> MarketAnalysis {
    let mut analysis = analyze_market(&player.name, &player.team, odds, player.position, week_window);
    apply_base_floor(&mut analysis);
    apply_injury_overlay(&mut analysis, player.injury.as_ref());
    analysis
}

/// Order-sensitive accumulation over game lines and deduplicated props.
pub fn analyze_market(
    player_name: &str,
    team: &str,
    odds: &OddsRecord,
    position: Position,
    week_window: Option<WeekWindow>,
) -> MarketAnalysis {
    let mut analysis = MarketAnalysis::new(player_name, team, position);

    if let Some(line) = &odds.game_line {
        // Week filter: a game outside the requested window suppresses every
        // game-based contribution for this run. An unparseable commence time
        // means no filter, never exclusion.
        if let Some((start, end)) = week_window
            && let Some(commence) = line.commence_time.as_deref().and_then(parse_commence_time)
            && !(start <= commence && commence <= end)
        {
            return analysis;
        }

        analysis.game_total = line.total;
        analysis.spread = line.spread;
        analysis.has_betting_data = true;

        if let Some(total) = line.total {
            if total >= 50.0 {
                analysis.score += 3;
                analysis.insights.push("High-scoring game".to_string());
            } else if total >= 45.0 {
                analysis.score += 1;
                analysis.insights.push("Good scoring potential".to_string());
            } else if total <= 40.0 {
                analysis.score -= 2;
                analysis.insights.push("Low-scoring game".to_string());
            }
        }

        if let Some(spread) = line.spread {
            let is_home = team_matches(&line.home_team, team);
            if is_home && spread > 3.0 {
                analysis.score += 2;
                analysis.insights.push("Home favorite".to_string());
            } else if !is_home && spread < -3.0 {
                analysis.score += 2;
                analysis.insights.push("Away favorite".to_string());
            } else if is_home && spread < -3.0 {
                analysis.score -= 1;
                analysis.insights.push("Home underdog".to_string());
            } else if !is_home && spread > 3.0 {
                analysis.score -= 1;
                analysis.insights.push("Away underdog".to_string());
            }
        }
    }

    if !odds.props.is_empty() {
        analysis.has_betting_data = true;
    }

    // One best line per market before any scoring, so several books quoting
    // the same market never double-count.
    let best = collect_best_lines(odds, position);

    if position != Position::Qb {
        score_skill_props(&mut analysis, &best, position);
    } else {
        score_qb_props(&mut analysis, &best);
    }

    analysis
}

/// Best (most favorable to the over/yes side) quote per market.
#[derive(Debug, Clone, Copy, Default)]
struct BestLines {
    td_price: Option<i32>,
    reception_line: Option<f64>,
    rush_line: Option<f64>,
    qb_pass_tds_price: Option<i32>,
    qb_pass_yds_line: Option<f64>,
    qb_completions_line: Option<f64>,
    qb_attempts_line: Option<f64>,
    qb_rush_line: Option<f64>,
}

fn collect_best_lines(odds: &OddsRecord, position: Position) -> BestLines {
    let mut best = BestLines::default();

    for prop in &odds.props {
        match (prop.market.as_str(), prop.outcome.as_str()) {
            ("player_anytime_td", "Yes") => {
                if let Some(price) = prop.price {
                    best.td_price = Some(best.td_price.map_or(price, |p| p.min(price)));
                }
            }
            ("player_receptions", "Over") => {
                if let Some(point) = prop.point {
                    best.reception_line = Some(max_f64(best.reception_line, point));
                }
            }
            ("player_rush_yds", "Over") => {
                if let Some(point) = prop.point {
                    if position == Position::Qb {
                        best.qb_rush_line = Some(max_f64(best.qb_rush_line, point));
                    } else {
                        best.rush_line = Some(max_f64(best.rush_line, point));
                    }
                }
            }
            ("player_pass_tds", "Over") if position == Position::Qb => {
                if let Some(price) = prop.price {
                    best.qb_pass_tds_price =
                        Some(best.qb_pass_tds_price.map_or(price, |p| p.min(price)));
                }
            }
            ("player_pass_yds", "Over") if position == Position::Qb => {
                if let Some(point) = prop.point {
                    best.qb_pass_yds_line = Some(max_f64(best.qb_pass_yds_line, point));
                }
            }
            ("player_pass_completions", "Over") if position == Position::Qb => {
                if let Some(point) = prop.point {
                    best.qb_completions_line = Some(max_f64(best.qb_completions_line, point));
                }
            }
            ("player_pass_attempts", "Over") if position == Position::Qb => {
                if let Some(point) = prop.point {
                    best.qb_attempts_line = Some(max_f64(best.qb_attempts_line, point));
                }
            }
            _ => {}
        }
    }

    best
}

fn max_f64(current: Option<f64>, candidate: f64) -> f64 {
    match current {
        Some(v) if v >= candidate => v,
        _ => candidate,
    }
}

/// A WR rush line above this is a data or name-matching error, not signal.
const WR_RUSH_LINE_SANITY: f64 = 30.0;
const TE_RUSH_LINE_SANITY: f64 = 20.0;

fn score_skill_props(analysis: &mut MarketAnalysis, best: &BestLines, position: Position) {
    if let Some(price) = best.td_price {
        analysis.td_price = Some(price);
        if price < 0 {
            analysis.score += 3;
            analysis.insights.push("TD favorite".to_string());
        } else if price < 200 {
            analysis.score += 1;
            analysis.insights.push("TD contender".to_string());
        } else {
            analysis.insights.push("TD long shot".to_string());
        }
    }

    if let Some(line) = best.reception_line {
        analysis.reception_line = Some(line);
        if line >= 6.0 {
            analysis.score += 2;
            analysis.insights.push("High reception expectation".to_string());
        } else if line >= 4.0 {
            analysis.score += 1;
            analysis.insights.push("Good reception potential".to_string());
        }
    }

    if let Some(line) = best.rush_line {
        let implausible = (position == Position::Wr && line > WR_RUSH_LINE_SANITY)
            || (position == Position::Te && line > TE_RUSH_LINE_SANITY);
        if !implausible {
            analysis.rush_line = Some(line);
            if line >= 80.0 {
                analysis.score += 2;
                analysis.insights.push("High rush expectation".to_string());
            } else if line >= 50.0 {
                analysis.score += 1;
                analysis.insights.push("Good rush potential".to_string());
            }
        }
    }
}

fn score_qb_props(analysis: &mut MarketAnalysis, best: &BestLines) {
    if let Some(price) = best.qb_pass_tds_price {
        if price < 0 {
            analysis.score += 3;
            analysis.insights.push("Pass TDs favored (o1.5)".to_string());
        } else {
            analysis.score += 1;
            analysis.insights.push("Pass TDs viable (o1.5)".to_string());
        }
    }

    if let Some(line) = best.qb_pass_yds_line {
        if line >= 275.0 {
            analysis.score += 3;
            analysis.insights.push("High pass yards expectation".to_string());
        } else if line >= 250.0 {
            analysis.score += 2;
            analysis.insights.push("Good pass yards expectation".to_string());
        } else if line >= 225.0 {
            analysis.score += 1;
            analysis.insights.push("Solid pass yards line".to_string());
        }
    }

    if let Some(line) = best.qb_completions_line {
        if line >= 24.5 {
            analysis.score += 2;
            analysis.insights.push("High completions expectation".to_string());
        } else if line >= 21.5 {
            analysis.score += 1;
            analysis.insights.push("Good completions line".to_string());
        }
    }

    if let Some(line) = best.qb_attempts_line {
        if line >= 36.5 {
            analysis.score += 2;
            analysis.insights.push("High attempts expectation".to_string());
        } else if line >= 33.5 {
            analysis.score += 1;
            analysis.insights.push("Good attempts line".to_string());
        }
    }

    if let Some(line) = best.qb_rush_line {
        analysis.rush_line = Some(line);
        if line >= 35.0 {
            analysis.score += 2;
            analysis.insights.push("QB rushing upside".to_string());
        } else if line >= 20.0 {
            analysis.score += 1;
            analysis.insights.push("QB rushing potential".to_string());
        }
    }
}

/// Data-sparse star players still deserve lineup consideration: with no
/// betting signal at all, fall back to a small positional base score.
pub fn apply_base_floor(analysis: &mut MarketAnalysis) {
    if analysis.score != 0 || analysis.has_betting_data {
        return;
    }
    analysis.score = match analysis.position {
        Position::Qb => 3,
        Position::Rb | Position::Wr => 2,
        Position::Te => 1,
        Position::K | Position::Def => 0,
    };
    analysis
        .insights
        .push("No betting data - using base score".to_string());
}

/// Injury overlay, applied after market scoring. OUT/IR override the score
/// outright; soft statuses subtract.
pub fn apply_injury_overlay(analysis: &mut MarketAnalysis, injury: Option<&InjuryRecord>) {
    let Some(injury) = injury else {
        return;
    };

    match injury.status {
        InjuryStatus::Healthy => {}
        InjuryStatus::Out => {
            analysis.score = EXCLUDED_SCORE;
            analysis.insights.push("OUT - excluded".to_string());
        }
        InjuryStatus::InjuredReserve => {
            analysis.score = EXCLUDED_SCORE;
            analysis.insights.push("IR - excluded".to_string());
        }
        InjuryStatus::Doubtful => match injury.probability_of_playing {
            Some(prob) if prob < 0.5 => {
                analysis.score = EXCLUDED_SCORE;
                analysis.insights.push(format!(
                    "DOUBTFUL ({:.0}% chance) - excluded",
                    prob * 100.0
                ));
            }
            _ => {
                analysis.score -= 5;
                analysis
                    .insights
                    .push("DOUBTFUL - heavy penalty".to_string());
            }
        },
        InjuryStatus::Questionable => match injury.probability_of_playing {
            Some(prob) if prob < 0.5 => {
                analysis.score = EXCLUDED_SCORE;
                analysis.insights.push(format!(
                    "QUESTIONABLE ({:.0}% chance) - excluded",
                    prob * 100.0
                ));
            }
            Some(prob) if prob < 0.75 => {
                analysis.score -= 5;
                analysis.insights.push(format!(
                    "QUESTIONABLE ({:.0}% chance) - heavy penalty",
                    prob * 100.0
                ));
            }
            Some(prob) => {
                analysis.score -= 2;
                analysis.insights.push(format!(
                    "QUESTIONABLE ({:.0}% chance) - moderate penalty",
                    prob * 100.0
                ));
            }
            None => {
                // Probability unknown: be conservative.
                analysis.score -= 4;
                analysis
                    .insights
                    .push("QUESTIONABLE (probability unknown) - heavy penalty".to_string());
            }
        },
    }
}

pub fn parse_commence_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}
