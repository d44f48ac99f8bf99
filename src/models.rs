use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A player's real position. Lineup-slot identity is a separate concept
/// (`SlotKind`); a player is never "a FLEX".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
    K,
    Def,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Qb,
        Position::Rb,
        Position::Wr,
        Position::Te,
        Position::K,
        Position::Def,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::K => "K",
            Position::Def => "DEF",
        }
    }

    pub fn parse(raw: &str) -> Option<Position> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QB" => Some(Position::Qb),
            "RB" => Some(Position::Rb),
            "WR" => Some(Position::Wr),
            "TE" => Some(Position::Te),
            "K" => Some(Position::K),
            "DEF" | "DST" | "D/ST" => Some(Position::Def),
            _ => None,
        }
    }

    pub fn flex_eligible(self) -> bool {
        matches!(self, Position::Rb | Position::Wr | Position::Te)
    }
}

/// Identity of a lineup slot. FLEX and BENCH exist only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Qb,
    Rb1,
    Rb2,
    Wr1,
    Wr2,
    Flex,
    SuperFlex,
    Te,
    K,
    Def,
    Bench,
}

impl SlotKind {
    /// Platform position code the submission sink maps slots with.
    pub fn platform_code(self) -> &'static str {
        match self {
            SlotKind::Qb => "QB",
            SlotKind::Rb1 | SlotKind::Rb2 => "RB",
            SlotKind::Wr1 | SlotKind::Wr2 => "WR",
            SlotKind::Flex => "W/R/T",
            SlotKind::SuperFlex => "Q/W/R/T",
            SlotKind::Te => "TE",
            SlotKind::K => "K",
            SlotKind::Def => "DEF",
            SlotKind::Bench => "BN",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SlotKind::Qb => "QB",
            SlotKind::Rb1 => "RB1",
            SlotKind::Rb2 => "RB2",
            SlotKind::Wr1 => "WR1",
            SlotKind::Wr2 => "WR2",
            SlotKind::Flex => "FLEX",
            SlotKind::SuperFlex => "SFLEX",
            SlotKind::Te => "TE",
            SlotKind::K => "K",
            SlotKind::Def => "DEF",
            SlotKind::Bench => "BN",
        }
    }
}

/// Whether a player of `position` may legally occupy `slot`.
pub fn is_eligible(position: Position, slot: SlotKind) -> bool {
    match slot {
        SlotKind::Qb => position == Position::Qb,
        SlotKind::Rb1 | SlotKind::Rb2 => position == Position::Rb,
        SlotKind::Wr1 | SlotKind::Wr2 => position == Position::Wr,
        SlotKind::Te => position == Position::Te,
        SlotKind::K => position == Position::K,
        SlotKind::Def => position == Position::Def,
        SlotKind::Flex => position.flex_eligible(),
        SlotKind::SuperFlex => position == Position::Qb || position.flex_eligible(),
        SlotKind::Bench => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InjuryStatus {
    Healthy,
    Questionable,
    Doubtful,
    Out,
    InjuredReserve,
}

impl InjuryStatus {
    pub fn parse(raw: &str) -> Option<InjuryStatus> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "HEALTHY" | "H" => Some(InjuryStatus::Healthy),
            "QUESTIONABLE" | "Q" => Some(InjuryStatus::Questionable),
            "DOUBTFUL" | "D" => Some(InjuryStatus::Doubtful),
            "OUT" | "O" => Some(InjuryStatus::Out),
            "IR" | "IR-R" | "INJURED RESERVE" => Some(InjuryStatus::InjuredReserve),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InjuryStatus::Healthy => "HEALTHY",
            InjuryStatus::Questionable => "QUESTIONABLE",
            InjuryStatus::Doubtful => "DOUBTFUL",
            InjuryStatus::Out => "OUT",
            InjuryStatus::InjuredReserve => "IR",
        }
    }

    /// OUT and IR are hard exclusions; everything else is a soft penalty.
    pub fn is_hard_exclusion(self) -> bool {
        matches!(self, InjuryStatus::Out | InjuryStatus::InjuredReserve)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjuryRecord {
    pub status: InjuryStatus,
    /// Estimated likelihood the player participates, in [0, 1].
    pub probability_of_playing: Option<f64>,
    pub description: String,
    pub source: String,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    /// Chance of precipitation in [0, 1].
    pub precipitation_chance: Option<f64>,
    pub is_dome: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchupRecord {
    pub opponent: String,
    /// 1 = best defense in the league.
    pub opponent_defense_ranking: Option<u32>,
    pub game_total: Option<f64>,
    /// Signed, home-team-relative by convention.
    pub spread: Option<f64>,
    pub weather: Option<WeatherRecord>,
    pub is_home: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekStats {
    pub week: u32,
    pub season: u32,
    pub fantasy_points: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub week: u32,
    pub season: u32,
    pub projected_points: f64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub team: String,
    #[serde(default)]
    pub eligible_positions: Vec<Position>,
    #[serde(default)]
    pub injury: Option<InjuryRecord>,
    #[serde(default)]
    pub stats: Vec<WeekStats>,
    #[serde(default)]
    pub projections: Vec<Projection>,
    #[serde(default)]
    pub matchup: Option<MatchupRecord>,
    #[serde(default)]
    pub bye_week: Option<u32>,
    #[serde(default)]
    pub is_on_roster: bool,
    #[serde(default)]
    pub is_starting: bool,
}

impl Player {
    /// Most recent `weeks` stat rows, newest first.
    pub fn recent_stats(&self, weeks: usize) -> Vec<&WeekStats> {
        let mut rows: Vec<&WeekStats> = self.stats.iter().collect();
        rows.sort_by(|a, b| b.week.cmp(&a.week));
        rows.truncate(weeks);
        rows
    }

    pub fn average_points(&self, weeks: usize) -> f64 {
        let recent = self.recent_stats(weeks);
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(|s| s.fantasy_points).sum::<f64>() / recent.len() as f64
    }

    /// Linear point trend over recent weeks, positive when improving
    /// (newest-minus-oldest over sample size).
    pub fn trend(&self, weeks: usize) -> f64 {
        let recent = self.recent_stats(weeks);
        if recent.len() < 2 {
            return 0.0;
        }
        let newest = recent.first().map(|s| s.fantasy_points).unwrap_or(0.0);
        let oldest = recent.last().map(|s| s.fantasy_points).unwrap_or(0.0);
        (newest - oldest) / recent.len() as f64
    }

    pub fn latest_projection(&self) -> Option<&Projection> {
        self.projections.iter().max_by_key(|p| p.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupSlot {
    pub kind: SlotKind,
    pub player: Option<Player>,
    pub is_filled: bool,
    pub is_required: bool,
}

impl LineupSlot {
    pub fn empty(kind: SlotKind, required: bool) -> Self {
        Self {
            kind,
            player: None,
            is_filled: false,
            is_required: required,
        }
    }
}

/// One team-week lineup. Built fresh each run from the roster snapshot; the
/// platform stays the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineup {
    pub team_id: String,
    pub week: u32,
    pub season: u32,
    pub slots: Vec<LineupSlot>,
    pub total_projected_points: f64,
    pub risk_level: RiskLevel,
}

impl Lineup {
    pub fn starters(&self) -> impl Iterator<Item = (&LineupSlot, &Player)> {
        self.slots.iter().filter_map(|slot| {
            if slot.kind == SlotKind::Bench {
                return None;
            }
            slot.player.as_ref().map(|p| (slot, p))
        })
    }

    pub fn bench(&self) -> impl Iterator<Item = &Player> {
        self.slots
            .iter()
            .filter(|s| s.kind == SlotKind::Bench)
            .filter_map(|s| s.player.as_ref())
    }
}

/// Write-only run artifact for the persistence sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionLog {
    pub timestamp: DateTime<Utc>,
    pub week: u32,
    pub season: u32,
    pub decision_type: String,
    pub description: String,
    pub reasoning: String,
    pub confidence: f64,
    pub players_involved: Vec<String>,
    pub was_executed: bool,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub week: u32,
    pub season: u32,
    pub projected_points: f64,
    pub actual_points: f64,
    pub accuracy: f64,
    pub decision_quality: f64,
    pub notes: String,
}
