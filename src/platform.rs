use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http_client::http_client;
use crate::models::{
    InjuryRecord, InjuryStatus, Lineup, Player, Position, Projection, WeekStats,
};

const AGENT: &str = "gridiron-optimizer/0.1";

/// Slot labels that never identify a real position.
const VIRTUAL_SLOT_CODES: [&str; 3] = ["W/R", "W/R/T", "Q/W/R/T"];

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RosterResponse {
    #[serde(default)]
    players: Vec<PlayerPayload>,
}

#[derive(Debug, Deserialize)]
struct PlayerPayload {
    player_id: u64,
    name: String,
    #[serde(default)]
    editorial_team_full_name: Option<String>,
    #[serde(default)]
    selected_position: Option<String>,
    #[serde(default)]
    eligible_positions: Vec<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    injury_note: Option<String>,
    #[serde(default)]
    percent_chance_to_play: Option<f64>,
    #[serde(default)]
    bye_week: Option<u32>,
    #[serde(default)]
    weekly_points: Vec<WeeklyPointsPayload>,
    #[serde(default)]
    projected_points: Option<ProjectionPayload>,
}

#[derive(Debug, Deserialize)]
struct WeeklyPointsPayload {
    week: u32,
    #[serde(default)]
    season: Option<u32>,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct ProjectionPayload {
    week: u32,
    #[serde(default)]
    season: Option<u32>,
    total: f64,
}

#[derive(Debug, Deserialize)]
struct LeagueResponse {
    current_week: u32,
    season: u32,
}

#[derive(Debug, Deserialize)]
struct WeekRangeResponse {
    week_start: String,
    week_end: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Fantasy-platform collaborator: roster and free-agent source plus the
/// lineup submission sink. Wire details stay inside this module.
pub struct PlatformClient {
    base_url: String,
    token: String,
    league_id: String,
    team_id: String,
    season: u32,
}

impl PlatformClient {
    /// Missing credentials are fatal: every call needs the token, so the
    /// run aborts up front instead of mid-batch.
    pub fn new(cfg: &Config) -> Result<Self> {
        let token = cfg
            .platform_token
            .clone()
            .ok_or_else(|| anyhow!("PLATFORM_TOKEN missing, cannot authenticate"))?;
        Ok(Self {
            base_url: cfg.platform_base_url.trim_end_matches('/').to_string(),
            token,
            league_id: cfg.league_id.clone(),
            team_id: cfg.team_id.clone(),
            season: cfg.season,
        })
    }

    fn team_key(&self) -> String {
        format!("nfl.l.{}.t.{}", self.league_id, self.team_id)
    }

    fn league_key(&self) -> String {
        format!("nfl.l.{}", self.league_id)
    }

    fn get_json(&self, path: &str) -> Result<String> {
        let url = format!("{}/{path}", self.base_url);
        let client = http_client()?;
        let resp = client
            .get(&url)
            .query(&[("format", "json")])
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(USER_AGENT, AGENT)
            .send()
            .with_context(|| format!("platform request failed: {path}"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading platform body")?;
        if !status.is_success() {
            return Err(anyhow!("platform http {}: {}", status, snippet(&body)));
        }
        Ok(body)
    }

    /// Current roster. Individual player rows that fail to parse are
    /// skipped, not fatal.
    pub fn get_roster(&self) -> Result<Vec<Player>> {
        let body = self.get_json(&format!("team/{}/roster", self.team_key()))?;
        let players = parse_roster_json(&body, true)?;
        info!(count = players.len(), "retrieved roster");
        Ok(players)
    }

    /// Top free agents for one position, up to `count`.
    pub fn get_available_players(&self, position: Position, count: usize) -> Result<Vec<Player>> {
        let body = self.get_json(&format!(
            "league/{}/players;status=FA;position={};count={count}",
            self.league_key(),
            position.as_str()
        ))?;
        let players = parse_roster_json(&body, false)?;
        debug!(count = players.len(), position = position.as_str(), "retrieved free agents");
        Ok(players)
    }

    pub fn current_week(&self) -> Result<u32> {
        let body = self.get_json(&format!("league/{}", self.league_key()))?;
        parse_current_week_json(&body)
    }

    /// Inclusive UTC datetime window covering one fantasy week.
    pub fn week_date_range(&self, week: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let body = self.get_json(&format!("league/{};week={week}", self.league_key()))?;
        parse_week_range_json(&body)
    }

    /// Submit a lineup for its week. The payload assigns every starter its
    /// slot code and parks the rest of the roster on the bench.
    pub fn submit_lineup(&self, lineup: &Lineup, roster: &[Player]) -> Result<()> {
        let payload = build_roster_xml(lineup, roster);
        let url = format!(
            "{}/team/{}/roster;week={}",
            self.base_url,
            self.team_key(),
            lineup.week
        );
        let client = http_client()?;
        let resp = client
            .put(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/xml")
            .header(USER_AGENT, AGENT)
            .body(payload)
            .send()
            .context("lineup submission failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("submission http {}: {}", status, snippet(&body)));
        }
        info!(week = lineup.week, "lineup submitted");
        Ok(())
    }

    pub fn season(&self) -> u32 {
        self.season
    }
}

// ---------------------------------------------------------------------------
// Pure parsing
// ---------------------------------------------------------------------------

pub fn parse_roster_json(body: &str, on_roster: bool) -> Result<Vec<Player>> {
    let parsed: RosterResponse = serde_json::from_str(body).context("invalid roster json")?;
    let mut players = Vec::new();
    for payload in parsed.players {
        match player_from_payload(payload, on_roster) {
            Some(player) => players.push(player),
            None => warn!("skipping unparseable player row"),
        }
    }
    Ok(players)
}

fn player_from_payload(payload: PlayerPayload, on_roster: bool) -> Option<Player> {
    let position = resolve_position(&payload)?;
    let season_default = payload
        .weekly_points
        .iter()
        .filter_map(|w| w.season)
        .next()
        .unwrap_or(0);

    let eligible_positions: Vec<Position> = payload
        .eligible_positions
        .iter()
        .filter_map(|p| Position::parse(p))
        .collect();

    let injury = parse_injury(
        payload.status.as_deref(),
        payload.injury_note.as_deref(),
        payload.percent_chance_to_play,
    );

    let stats = payload
        .weekly_points
        .iter()
        .map(|w| WeekStats {
            week: w.week,
            season: w.season.unwrap_or(season_default),
            fantasy_points: w.total,
        })
        .collect();

    let projections = payload
        .projected_points
        .map(|p| {
            vec![Projection {
                week: p.week,
                season: p.season.unwrap_or(season_default),
                projected_points: p.total,
                source: "platform".to_string(),
                timestamp: Utc::now(),
            }]
        })
        .unwrap_or_default();

    let selected = payload.selected_position.as_deref().unwrap_or("BN");

    Some(Player {
        player_id: payload.player_id.to_string(),
        name: payload.name,
        position,
        team: payload.editorial_team_full_name.unwrap_or_default(),
        eligible_positions,
        injury,
        stats,
        projections,
        matchup: None,
        bye_week: payload.bye_week,
        is_on_roster: on_roster,
        is_starting: on_roster && selected != "BN",
    })
}

/// A player's real position comes from eligibility, never from the slot
/// they happen to occupy: FLEX-style codes are filtered out first.
fn resolve_position(payload: &PlayerPayload) -> Option<Position> {
    let concrete: Vec<Position> = payload
        .eligible_positions
        .iter()
        .filter(|p| !VIRTUAL_SLOT_CODES.contains(&p.as_str()))
        .filter_map(|p| Position::parse(p))
        .collect();
    if !concrete.is_empty() {
        for preferred in Position::ALL {
            if concrete.contains(&preferred) {
                return Some(preferred);
            }
        }
    }
    payload
        .selected_position
        .as_deref()
        .filter(|p| *p != "BN" && !VIRTUAL_SLOT_CODES.contains(p))
        .and_then(Position::parse)
}

fn parse_injury(
    status: Option<&str>,
    note: Option<&str>,
    percent_chance: Option<f64>,
) -> Option<InjuryRecord> {
    let text = status.unwrap_or_default().trim().to_ascii_lowercase();
    if text.is_empty() {
        return None;
    }

    let parsed = if text.contains("injured reserve") || text == "ir" {
        InjuryStatus::InjuredReserve
    } else if text.contains("out") {
        InjuryStatus::Out
    } else if text.contains("doubtful") {
        InjuryStatus::Doubtful
    } else if text.contains("questionable") || text == "q" {
        InjuryStatus::Questionable
    } else {
        return None;
    };

    Some(InjuryRecord {
        status: parsed,
        probability_of_playing: percent_chance.map(|p| if p > 1.0 { p / 100.0 } else { p }),
        description: note.unwrap_or_default().to_string(),
        source: "platform".to_string(),
        last_updated: Some(Utc::now()),
    })
}

pub fn parse_current_week_json(body: &str) -> Result<u32> {
    let parsed: LeagueResponse = serde_json::from_str(body).context("invalid league json")?;
    debug!(season = parsed.season, week = parsed.current_week, "league state");
    Ok(parsed.current_week)
}

pub fn parse_week_range_json(body: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let parsed: WeekRangeResponse = serde_json::from_str(body).context("invalid week range json")?;
    let start = parse_week_date(&parsed.week_start, false)
        .with_context(|| format!("bad week_start {:?}", parsed.week_start))?;
    let end = parse_week_date(&parsed.week_end, true)
        .with_context(|| format!("bad week_end {:?}", parsed.week_end))?;
    Ok((start, end))
}

/// Week boundaries arrive as bare dates or full timestamps; a bare end
/// date extends to the end of that day so Monday-night games stay inside
/// the window.
fn parse_week_date(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&time))
}

/// Roster submission payload. Starters carry their slot code; every
/// rostered player not in a starting slot is explicitly benched.
pub fn build_roster_xml(lineup: &Lineup, roster: &[Player]) -> String {
    let mut parts = vec![
        "<fantasy_content>".to_string(),
        "  <roster>".to_string(),
        "    <coverage_type>week</coverage_type>".to_string(),
        format!("    <week>{}</week>", lineup.week),
        "    <players>".to_string(),
    ];

    let mut used = Vec::new();
    for (slot, player) in lineup.starters() {
        used.push(player.player_id.clone());
        parts.push("      <player>".to_string());
        parts.push(format!(
            "        <player_key>nfl.p.{}</player_key>",
            player.player_id
        ));
        parts.push(format!(
            "        <position>{}</position>",
            slot.kind.platform_code()
        ));
        parts.push("      </player>".to_string());
    }

    for player in roster {
        if used.contains(&player.player_id) {
            continue;
        }
        parts.push("      <player>".to_string());
        parts.push(format!(
            "        <player_key>nfl.p.{}</player_key>",
            player.player_id
        ));
        parts.push("        <position>BN</position>".to_string());
        parts.push("      </player>".to_string());
    }

    parts.push("    </players>".to_string());
    parts.push("  </roster>".to_string());
    parts.push("</fantasy_content>".to_string());
    parts.join("\n")
}

fn snippet(body: &str) -> String {
    body.trim()
        .replace('\n', " ")
        .replace('\r', " ")
        .chars()
        .take(220)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineup::{LineupCandidate, assemble_lineup};
    use std::collections::HashMap;

    const ROSTER_JSON: &str = r#"{
        "players": [
            {
                "player_id": 40899,
                "name": "Justin Fields",
                "editorial_team_full_name": "Pittsburgh Steelers",
                "selected_position": "QB",
                "eligible_positions": ["QB"],
                "weekly_points": [
                    {"week": 3, "season": 2025, "total": 14.2},
                    {"week": 4, "season": 2025, "total": 21.7}
                ],
                "projected_points": {"week": 5, "season": 2025, "total": 18.4}
            },
            {
                "player_id": 33412,
                "name": "Aaron Jones Sr.",
                "editorial_team_full_name": "Minnesota Vikings",
                "selected_position": "W/R/T",
                "eligible_positions": ["RB", "W/R/T"],
                "status": "Questionable",
                "injury_note": "hamstring",
                "percent_chance_to_play": 65
            },
            {
                "player_id": 31006,
                "name": "Baltimore",
                "editorial_team_full_name": "Baltimore Ravens",
                "selected_position": "BN",
                "eligible_positions": ["DEF"]
            }
        ]
    }"#;

    #[test]
    fn parses_roster_players() {
        let players = parse_roster_json(ROSTER_JSON, true).expect("roster");
        assert_eq!(players.len(), 3);

        let qb = &players[0];
        assert_eq!(qb.player_id, "40899");
        assert_eq!(qb.position, Position::Qb);
        assert!(qb.is_starting);
        assert_eq!(qb.stats.len(), 2);
        assert_eq!(qb.projections[0].projected_points, 18.4);
    }

    #[test]
    fn flex_slot_never_becomes_a_position() {
        let players = parse_roster_json(ROSTER_JSON, true).expect("roster");
        let back = &players[1];
        assert_eq!(back.position, Position::Rb);
        assert_eq!(back.eligible_positions, vec![Position::Rb]);
    }

    #[test]
    fn injury_status_and_probability_parse() {
        let players = parse_roster_json(ROSTER_JSON, true).expect("roster");
        let injury = players[1].injury.as_ref().expect("injury");
        assert_eq!(injury.status, InjuryStatus::Questionable);
        assert_eq!(injury.probability_of_playing, Some(0.65));
        assert_eq!(injury.description, "hamstring");
    }

    #[test]
    fn bench_defense_is_not_starting() {
        let players = parse_roster_json(ROSTER_JSON, true).expect("roster");
        let def = &players[2];
        assert_eq!(def.position, Position::Def);
        assert!(!def.is_starting);
    }

    #[test]
    fn free_agents_are_not_rostered() {
        let players = parse_roster_json(ROSTER_JSON, false).expect("pool");
        assert!(players.iter().all(|p| !p.is_on_roster));
        assert!(players.iter().all(|p| !p.is_starting));
    }

    #[test]
    fn injury_parse_variants() {
        assert_eq!(
            parse_injury(Some("Injured Reserve"), None, None).unwrap().status,
            InjuryStatus::InjuredReserve
        );
        assert_eq!(
            parse_injury(Some("O"), None, None).map(|i| i.status),
            None
        );
        assert_eq!(
            parse_injury(Some("Out"), None, None).unwrap().status,
            InjuryStatus::Out
        );
        assert!(parse_injury(None, None, None).is_none());
        // Fractional probability passes through unscaled.
        assert_eq!(
            parse_injury(Some("Doubtful"), None, Some(0.4))
                .unwrap()
                .probability_of_playing,
            Some(0.4)
        );
    }

    #[test]
    fn current_week_parses() {
        let body = r#"{"current_week": 5, "season": 2025}"#;
        assert_eq!(parse_current_week_json(body).unwrap(), 5);
    }

    #[test]
    fn week_range_extends_end_date() {
        let body = r#"{"week_start": "2025-10-07", "week_end": "2025-10-13"}"#;
        let (start, end) = parse_week_range_json(body).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-10-07T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-10-13T23:59:59+00:00");
    }

    #[test]
    fn roster_xml_assigns_slots_and_benches_the_rest() {
        let players = parse_roster_json(ROSTER_JSON, true).expect("roster");
        let candidates: Vec<LineupCandidate> = players
            .iter()
            .map(|p| {
                LineupCandidate::new(
                    p.clone(),
                    crate::market_score::analyze_market(
                        &p.name,
                        &p.team,
                        &crate::odds_api::OddsRecord::empty(&p.team),
                        p.position,
                        None,
                    ),
                )
            })
            .collect();
        let assembled = assemble_lineup(candidates);
        let lineup = assembled.to_lineup("4", 5, 2025, &HashMap::new());

        let xml = build_roster_xml(&lineup, &players);
        assert!(xml.contains("<coverage_type>week</coverage_type>"));
        assert!(xml.contains("<week>5</week>"));
        assert!(xml.contains("<player_key>nfl.p.40899</player_key>"));
        assert!(xml.contains("<position>QB</position>"));
        assert!(xml.contains("<position>DEF</position>"));
        // Everyone appears exactly once.
        assert_eq!(xml.matches("nfl.p.40899").count(), 1);
        assert_eq!(xml.matches("<player>").count(), 3);
    }
}
