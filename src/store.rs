use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::models::{DecisionLog, Lineup, PerformanceMetrics};

const DB_DIR: &str = "gridiron_optimizer";
const DB_FILE: &str = "optimizer.sqlite";

/// Write-only persistence sink for run artifacts: decisions, metrics, and
/// submitted lineups. Nothing here is read back during a run.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Store> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    fn open_in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Store { conn })
    }

    pub fn save_decision(&self, decision: &DecisionLog) -> Result<()> {
        let players = serde_json::to_string(&decision.players_involved)
            .context("serialize players_involved")?;
        self.conn
            .execute(
                "INSERT INTO decisions(timestamp, week, season, decision_type, description,
                                       players_involved, reasoning, confidence, was_executed, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    decision.timestamp.to_rfc3339(),
                    decision.week,
                    decision.season,
                    decision.decision_type,
                    decision.description,
                    players,
                    decision.reasoning,
                    decision.confidence,
                    decision.was_executed,
                    decision.outcome,
                ],
            )
            .context("insert decision")?;
        Ok(())
    }

    pub fn save_metrics(&self, metrics: &PerformanceMetrics) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO performance_metrics(week, season, projected_points, actual_points,
                                                 accuracy, decision_quality, notes, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    metrics.week,
                    metrics.season,
                    metrics.projected_points,
                    metrics.actual_points,
                    metrics.accuracy,
                    metrics.decision_quality,
                    metrics.notes,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("insert performance metrics")?;
        Ok(())
    }

    pub fn save_lineup(&self, lineup: &Lineup) -> Result<()> {
        let lineup_data = serde_json::to_string(lineup).context("serialize lineup")?;
        self.conn
            .execute(
                "INSERT INTO lineup_history(team_id, week, season, lineup_data,
                                            total_projected_points, risk_level, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    lineup.team_id,
                    lineup.week,
                    lineup.season,
                    lineup_data,
                    lineup.total_projected_points,
                    lineup.risk_level.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("insert lineup history")?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS decisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            week INTEGER NOT NULL,
            season INTEGER NOT NULL,
            decision_type TEXT NOT NULL,
            description TEXT NOT NULL,
            players_involved TEXT,
            reasoning TEXT NOT NULL,
            confidence REAL NOT NULL,
            was_executed INTEGER NOT NULL,
            outcome TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_week ON decisions(season, week);

        CREATE TABLE IF NOT EXISTS performance_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week INTEGER NOT NULL,
            season INTEGER NOT NULL,
            projected_points REAL NOT NULL,
            actual_points REAL NOT NULL,
            accuracy REAL NOT NULL,
            decision_quality REAL NOT NULL,
            notes TEXT,
            timestamp TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lineup_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id TEXT NOT NULL,
            week INTEGER NOT NULL,
            season INTEGER NOT NULL,
            lineup_data TEXT NOT NULL,
            total_projected_points REAL NOT NULL,
            risk_level TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lineup_history_team ON lineup_history(team_id, season, week);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DB_DIR).join(DB_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DB_DIR)
            .join(DB_FILE),
    )
}
