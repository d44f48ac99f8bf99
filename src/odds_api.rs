use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::http_client::http_client;

const ODDS_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const NFL_SPORT_KEY: &str = "americanfootball_nfl";
const CLIENT_USER_AGENT: &str = "gridiron-optimizer/0.1 (odds integration)";

/// Prop markets the scorer understands; anything else is ignored at ingest.
const PROP_MARKETS: &[&str] = &[
    "player_pass_tds",
    "player_pass_yds",
    "player_rush_yds",
    "player_receptions",
    "player_anytime_td",
    "player_pass_completions",
    "player_pass_attempts",
];

// -- Wire payloads (The Odds API) --

#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub commence_time: Option<String>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<OddsBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsBookmaker {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<OddsOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsOutcome {
    pub name: String,
    /// Player name on prop markets.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub point: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EventRef {
    id: String,
    #[serde(default)]
    home_team: String,
    #[serde(default)]
    away_team: String,
}

// -- Structured per-player record --

#[derive(Debug, Clone, PartialEq)]
pub struct GameLine {
    pub home_team: String,
    pub away_team: String,
    pub spread: Option<f64>,
    pub total: Option<f64>,
    pub commence_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropEntry {
    pub market: String,
    pub outcome: String,
    /// American odds.
    pub price: Option<i32>,
    pub point: Option<f64>,
    pub bookmaker: String,
}

/// Market signals resolved for one player for one run.
#[derive(Debug, Clone, Default)]
pub struct OddsRecord {
    pub team: String,
    pub game_line: Option<GameLine>,
    pub props: Vec<PropEntry>,
}

impl OddsRecord {
    pub fn empty(team: &str) -> Self {
        Self {
            team: team.to_string(),
            game_line: None,
            props: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.game_line.is_none() && self.props.is_empty()
    }
}

struct CacheEntry {
    fetched_at: Instant,
    events: Vec<OddsEvent>,
}

/// Blocking Odds API client. Bulk responses are cached per request type for a
/// short TTL; filtering down to a single player happens client-side, so no
/// per-player keys are needed. Single-threaded batch use only.
pub struct OddsApiClient {
    api_key: Option<String>,
    regions: String,
    base_url: String,
    ttl: Duration,
    cache: Mutex<HashMap<&'static str, CacheEntry>>,
}

const CACHE_GAME_LINES: &str = "game_lines";
const CACHE_PLAYER_PROPS: &str = "player_props";

impl OddsApiClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            api_key: cfg.odds_api_key.clone(),
            regions: cfg.odds_regions.clone(),
            base_url: ODDS_BASE_URL.to_string(),
            ttl: Duration::from_secs(cfg.odds_cache_ttl_secs),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Full current game-lines list (spread/total per game), for local
    /// filtering by the caller.
    pub fn game_lines(&self) -> Result<Vec<OddsEvent>> {
        self.cached(CACHE_GAME_LINES, || self.fetch_game_lines())
    }

    /// Resolve every market signal we have for one player. Fetch or parse
    /// failures degrade to an empty record; they never abort the batch.
    pub fn player_odds(&self, player_name: &str, team: &str) -> OddsRecord {
        let lines = match self.game_lines() {
            Ok(events) => events,
            Err(err) => {
                warn!(player = player_name, %err, "game lines fetch failed");
                Vec::new()
            }
        };
        let props = match self.player_props() {
            Ok(events) => events,
            Err(err) => {
                warn!(player = player_name, %err, "player props fetch failed");
                Vec::new()
            }
        };
        build_odds_record(player_name, team, &lines, &props)
    }

    fn player_props(&self) -> Result<Vec<OddsEvent>> {
        self.cached(CACHE_PLAYER_PROPS, || self.fetch_player_props())
    }

    fn cached(
        &self,
        kind: &'static str,
        fetch: impl FnOnce() -> Result<Vec<OddsEvent>>,
    ) -> Result<Vec<OddsEvent>> {
        {
            let cache = self.cache.lock().expect("odds cache lock poisoned");
            if let Some(entry) = cache.get(kind)
                && entry.fetched_at.elapsed() < self.ttl
            {
                debug!(kind, "odds cache hit");
                return Ok(entry.events.clone());
            }
        }

        let events = fetch()?;
        let mut cache = self.cache.lock().expect("odds cache lock poisoned");
        cache.insert(
            kind,
            CacheEntry {
                fetched_at: Instant::now(),
                events: events.clone(),
            },
        );
        Ok(events)
    }

    fn fetch_game_lines(&self) -> Result<Vec<OddsEvent>> {
        let Some(api_key) = self.api_key.as_ref() else {
            warn!("ODDS_API_KEY not configured, skipping game lines");
            return Ok(Vec::new());
        };

        let url = format!("{}/sports/{NFL_SPORT_KEY}/odds", self.base_url);
        let client = http_client()?;
        let resp = client
            .get(&url)
            .query(&[
                ("apiKey", api_key.as_str()),
                ("regions", self.regions.as_str()),
                ("markets", "spreads,totals"),
                ("oddsFormat", "american"),
                ("dateFormat", "iso"),
            ])
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .context("odds request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading odds body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("odds http {}: {}", status, snippet(&body)));
        }
        parse_events_json(&body)
    }

    fn fetch_player_props(&self) -> Result<Vec<OddsEvent>> {
        let Some(api_key) = self.api_key.as_ref() else {
            warn!("ODDS_API_KEY not configured, skipping player props");
            return Ok(Vec::new());
        };

        let client = http_client()?;
        let events_url = format!("{}/sports/{NFL_SPORT_KEY}/events", self.base_url);
        let resp = client
            .get(&events_url)
            .query(&[("apiKey", api_key.as_str()), ("dateFormat", "iso")])
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .context("events request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading events body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "events http {}: {}",
                status,
                snippet(&body)
            ));
        }
        let events: Vec<EventRef> = serde_json::from_str(&body).context("invalid events json")?;

        // One odds call per event; a failed event is skipped, not fatal.
        let markets = PROP_MARKETS.join(",");
        let mut out = Vec::new();
        for event in &events {
            let props_url = format!(
                "{}/sports/{NFL_SPORT_KEY}/events/{}/odds",
                self.base_url, event.id
            );
            let result = client
                .get(&props_url)
                .query(&[
                    ("apiKey", api_key.as_str()),
                    ("regions", self.regions.as_str()),
                    ("markets", markets.as_str()),
                    ("oddsFormat", "american"),
                    ("dateFormat", "iso"),
                ])
                .header(USER_AGENT, CLIENT_USER_AGENT)
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(anyhow::Error::from)
                .and_then(|r| {
                    let body = r.text().context("failed reading props body")?;
                    serde_json::from_str::<OddsEvent>(&body).context("invalid props json")
                });
            match result {
                Ok(event_odds) => out.push(event_odds),
                Err(err) => {
                    debug!(event = %event.id, home = %event.home_team, away = %event.away_team,
                        %err, "skipping props for event");
                }
            }
        }
        Ok(out)
    }
}

/// Parse a bulk odds payload (game lines or per-event props both share the
/// event shape).
pub fn parse_events_json(body: &str) -> Result<Vec<OddsEvent>> {
    serde_json::from_str(body).context("invalid odds json")
}

/// Pure compute phase: resolve one player's game line and props from already
/// fetched bulk payloads.
pub fn build_odds_record(
    player_name: &str,
    team: &str,
    lines: &[OddsEvent],
    props: &[OddsEvent],
) -> OddsRecord {
    let mut record = OddsRecord::empty(team);

    if let Some(event) = lines
        .iter()
        .find(|e| team_matches(&e.home_team, team) || team_matches(&e.away_team, team))
    {
        let (spread, total) = extract_lines(&event.bookmakers);
        record.game_line = Some(GameLine {
            home_team: event.home_team.clone(),
            away_team: event.away_team.clone(),
            spread,
            total,
            commence_time: event.commence_time.clone(),
        });
    }

    for event in props {
        for bookmaker in &event.bookmakers {
            for market in &bookmaker.markets {
                if !PROP_MARKETS.contains(&market.key.as_str()) {
                    continue;
                }
                for outcome in &market.outcomes {
                    let described = outcome.description.as_deref().unwrap_or("");
                    if !player_matches(described, player_name) {
                        continue;
                    }
                    record.props.push(PropEntry {
                        market: market.key.clone(),
                        outcome: outcome.name.clone(),
                        price: outcome.price.map(|p| p as i32),
                        point: outcome.point,
                        bookmaker: bookmaker.title.clone(),
                    });
                }
            }
        }
    }

    record
}

/// First spread and total found across all bookmaker entries; no averaging
/// across books. The home side is the second outcome in the API's spreads
/// ordering.
pub fn extract_lines(bookmakers: &[OddsBookmaker]) -> (Option<f64>, Option<f64>) {
    let mut spread = None;
    let mut total = None;

    for bookmaker in bookmakers {
        for market in &bookmaker.markets {
            match market.key.as_str() {
                "spreads" if spread.is_none() => {
                    if let Some(outcome) = market.outcomes.get(1) {
                        spread = outcome.point;
                    }
                }
                "totals" if total.is_none() => {
                    if let Some(outcome) = market.outcomes.first() {
                        total = outcome.point;
                    }
                }
                _ => {}
            }
        }
        if spread.is_some() && total.is_some() {
            break;
        }
    }

    (spread, total)
}

/// Fixed abbreviation aliases the containment rule cannot resolve.
const TEAM_ALIASES: &[(&str, &str)] = &[
    ("kc", "kansas city chiefs"),
    ("gb", "green bay packers"),
    ("ne", "new england patriots"),
    ("sf", "san francisco 49ers"),
    ("la", "los angeles rams"),
    ("lv", "las vegas raiders"),
    ("nyg", "new york giants"),
    ("nyj", "new york jets"),
    ("tb", "tampa bay buccaneers"),
    ("wsh", "washington commanders"),
    ("ari", "arizona cardinals"),
    ("atl", "atlanta falcons"),
    ("car", "carolina panthers"),
    ("cin", "cincinnati bengals"),
    ("cle", "cleveland browns"),
    ("jax", "jacksonville jaguars"),
    ("no", "new orleans saints"),
    ("sea", "seattle seahawks"),
];

pub fn team_matches(api_team: &str, our_team: &str) -> bool {
    if api_team.trim().is_empty() || our_team.trim().is_empty() {
        return false;
    }

    let api = api_team.trim().to_lowercase();
    let ours = our_team.trim().to_lowercase();

    if api == ours {
        return true;
    }
    // Abbreviation contained in the full name, either direction.
    if ours.len() <= 4 && api.contains(&ours) {
        return true;
    }
    if api.len() <= 4 && ours.contains(&api) {
        return true;
    }

    TEAM_ALIASES
        .iter()
        .any(|(abbrev, full)| ours == *abbrev && api.contains(full))
}

const NAME_SUFFIXES: &[&str] = &["sr.", "jr.", "sr", "jr", "ii", "iii", "iv"];

fn name_tokens(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .split_whitespace()
        .filter(|part| !NAME_SUFFIXES.contains(part))
        .map(|part| part.to_string())
        .collect()
}

/// Last-name-only is the primary rule; first+last confirms when both names
/// carry at least two tokens.
pub fn player_matches(api_player: &str, our_player: &str) -> bool {
    let api = name_tokens(api_player);
    let ours = name_tokens(our_player);

    if api.len() < 2 || ours.len() < 2 {
        return false;
    }
    api.last() == ours.last()
}

fn snippet(body: &str) -> String {
    body.trim()
        .replace('\n', " ")
        .replace('\r', " ")
        .chars()
        .take(220)
        .collect()
}
