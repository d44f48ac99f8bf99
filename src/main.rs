use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gridiron_optimizer::config::Config;
use gridiron_optimizer::evaluator::{PlayerEvaluator, PlayerScore};
use gridiron_optimizer::lineup::{AssembledLineup, LineupCandidate, assemble_lineup};
use gridiron_optimizer::market_score::{self, MarketAnalysis, WeekWindow};
use gridiron_optimizer::models::{DecisionLog, PerformanceMetrics, Player, Position};
use gridiron_optimizer::odds_api::OddsApiClient;
use gridiron_optimizer::platform::PlatformClient;
use gridiron_optimizer::store::{self, Store};
use gridiron_optimizer::waivers::{
    EVALUATOR_IMPROVEMENT_THRESHOLD, MARKET_IMPROVEMENT_THRESHOLD, ScoredEntry, WaiverSuggestion,
    find_waiver_moves,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Optimize,
    Waivers,
}

#[derive(Debug, Clone)]
struct CliArgs {
    command: Command,
    week: Option<u32>,
    submit: bool,
    dry_run: bool,
    db_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1).collect())?;
    let mut cfg = Config::from_env();
    if let Some(week) = args.week {
        cfg.week_override = Some(week);
    }
    if args.submit {
        cfg.auto_submit = true;
    }
    if args.dry_run {
        cfg.dry_run = true;
    }
    if args.db_path.is_some() {
        cfg.db_path = args.db_path.clone();
    }

    let platform = PlatformClient::new(&cfg).context("platform initialization failed")?;
    let odds = OddsApiClient::new(&cfg);

    match args.command {
        Command::Optimize => run_optimize(&cfg, &platform, &odds),
        Command::Waivers => run_waivers(&cfg, &platform, &odds),
    }
}

fn parse_args(args: Vec<String>) -> Result<CliArgs> {
    let mut out = CliArgs {
        command: Command::Optimize,
        week: None,
        submit: false,
        dry_run: false,
        db_path: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "optimize" => out.command = Command::Optimize,
            "waivers" => out.command = Command::Waivers,
            "--submit" => out.submit = true,
            "--dry-run" => out.dry_run = true,
            "--week" => {
                let value = iter.next().ok_or_else(|| anyhow!("--week needs a value"))?;
                out.week = Some(value.parse().context("invalid --week value")?);
            }
            "--db" => {
                let value = iter.next().ok_or_else(|| anyhow!("--db needs a path"))?;
                out.db_path = Some(PathBuf::from(value));
            }
            other => {
                if let Some(value) = other.strip_prefix("--week=") {
                    out.week = Some(value.parse().context("invalid --week value")?);
                } else if let Some(value) = other.strip_prefix("--db=") {
                    out.db_path = Some(PathBuf::from(value));
                } else {
                    return Err(anyhow!("unknown argument: {other}"));
                }
            }
        }
    }
    Ok(out)
}

/// One run's worth of fetched inputs, before any scoring.
struct RunInputs {
    week: u32,
    window: Option<WeekWindow>,
    roster: Vec<Player>,
    free_agents: Vec<Player>,
}

fn fetch_inputs(cfg: &Config, platform: &PlatformClient) -> Result<RunInputs> {
    let roster = platform.get_roster()?;
    println!("Roster: {} players", roster.len());

    let mut free_agents = Vec::new();
    for position in Position::ALL {
        match platform.get_available_players(position, cfg.free_agents_per_position) {
            Ok(mut players) => {
                println!("  {} free agents: {}", position.as_str(), players.len());
                free_agents.append(&mut players);
            }
            Err(err) => {
                warn!(position = position.as_str(), %err, "free agent fetch failed");
            }
        }
    }

    let week = match cfg.week_override {
        Some(week) => week,
        None => platform.current_week()?,
    };
    let window = match platform.week_date_range(week) {
        Ok(range) => Some(range),
        Err(err) => {
            warn!(week, %err, "week date range unavailable, scoring unfiltered");
            None
        }
    };

    Ok(RunInputs {
        week,
        window,
        roster,
        free_agents,
    })
}

/// Market-score every distinct player once, keyed by id.
fn score_all(
    odds: &OddsApiClient,
    inputs: &RunInputs,
) -> HashMap<String, MarketAnalysis> {
    let mut analyses: HashMap<String, MarketAnalysis> = HashMap::new();
    for player in inputs.roster.iter().chain(inputs.free_agents.iter()) {
        if analyses.contains_key(&player.player_id) {
            continue;
        }
        let record = odds.player_odds(&player.name, &player.team);
        let analysis = market_score::score_player(player, &record, inputs.window);
        analyses.insert(player.player_id.clone(), analysis);
    }
    info!(count = analyses.len(), "scored players");
    analyses
}

fn run_optimize(cfg: &Config, platform: &PlatformClient, odds: &OddsApiClient) -> Result<()> {
    let inputs = fetch_inputs(cfg, platform)?;
    println!("Optimizing week {}", inputs.week);

    let analyses = score_all(odds, &inputs);
    print_player_insights(&inputs.roster, &analyses);

    let suggestions = waiver_suggestions(cfg, &inputs, &analyses);
    print_waiver_report("Waiver opportunities", &suggestions);

    let candidates: Vec<LineupCandidate> = inputs
        .roster
        .iter()
        .filter_map(|p| {
            analyses
                .get(&p.player_id)
                .map(|a| LineupCandidate::new(p.clone(), a.clone()))
        })
        .collect();
    let assembled = assemble_lineup(candidates);
    print_lineup_report(&assembled);

    // Projection cross-check; confidences feed the risk classification on
    // the final lineup.
    let evaluator = PlayerEvaluator::from_config(cfg);
    let projections = evaluator.top_players(&inputs.roster, inputs.week, inputs.roster.len());
    print_projection_report(&projections);
    let confidences: HashMap<String, f64> = projections
        .iter()
        .map(|s| (s.player.player_id.clone(), s.confidence))
        .collect();
    let lineup = assembled.to_lineup(&cfg.team_id, inputs.week, cfg.season, &confidences);
    println!(
        "Projected total: {:.0}  risk: {}",
        lineup.total_projected_points,
        lineup.risk_level.as_str()
    );

    persist_run(cfg, &lineup, &assembled, &suggestions)?;

    if cfg.auto_submit && !cfg.dry_run {
        platform
            .submit_lineup(&lineup, &inputs.roster)
            .context("lineup submission failed")?;
        println!("Lineup submitted for week {}", inputs.week);
    } else if cfg.dry_run {
        println!("Dry run: lineup not submitted");
    }

    Ok(())
}

fn run_waivers(cfg: &Config, platform: &PlatformClient, odds: &OddsApiClient) -> Result<()> {
    let inputs = fetch_inputs(cfg, platform)?;
    println!("Waiver scan for week {}", inputs.week);

    let analyses = score_all(odds, &inputs);
    let mut suggestions = waiver_suggestions(cfg, &inputs, &analyses);
    print_waiver_report("Waiver opportunities", &suggestions);

    // Projection path as a second opinion, on its own tighter threshold.
    let evaluator = PlayerEvaluator::from_config(cfg);
    let evaluate = |players: &[Player]| -> Vec<ScoredEntry> {
        players
            .iter()
            .map(|p| ScoredEntry::from_player_score(&evaluator.evaluate_player(p, inputs.week)))
            .collect()
    };
    let projected = find_waiver_moves(
        &evaluate(&inputs.roster),
        &evaluate(&inputs.free_agents),
        EVALUATOR_IMPROVEMENT_THRESHOLD,
        cfg.max_waiver_suggestions,
    );
    print_waiver_report("Projection-based second opinion", &projected);
    suggestions.extend(projected);

    if let Some(path) = cfg.db_path.clone().or_else(store::default_db_path) {
        let db = Store::open(&path)?;
        for suggestion in &suggestions {
            db.save_decision(&DecisionLog {
                timestamp: chrono::Utc::now(),
                week: inputs.week,
                season: cfg.season,
                decision_type: "waiver_suggestion".to_string(),
                description: format!(
                    "Add {} ({:+.0}), drop {} ({:+.0})",
                    suggestion.add.name,
                    suggestion.add_score,
                    suggestion.drop.name,
                    suggestion.drop_score
                ),
                reasoning: format!(
                    "Better {} option (+{:.0} points)",
                    suggestion.position.as_str(),
                    suggestion.improvement
                ),
                confidence: 0.0,
                players_involved: vec![
                    suggestion.add.player_id.clone(),
                    suggestion.drop.player_id.clone(),
                ],
                was_executed: false,
                outcome: None,
            })?;
        }
    }

    Ok(())
}

fn waiver_suggestions(
    cfg: &Config,
    inputs: &RunInputs,
    analyses: &HashMap<String, MarketAnalysis>,
) -> Vec<WaiverSuggestion> {
    let entry = |player: &Player| -> Option<ScoredEntry> {
        analyses.get(&player.player_id).map(|a| ScoredEntry {
            player: player.clone(),
            score: a.score as f64,
        })
    };
    let roster: Vec<ScoredEntry> = inputs.roster.iter().filter_map(entry).collect();
    let pool: Vec<ScoredEntry> = inputs.free_agents.iter().filter_map(entry).collect();
    find_waiver_moves(
        &roster,
        &pool,
        MARKET_IMPROVEMENT_THRESHOLD,
        cfg.max_waiver_suggestions,
    )
}

fn print_player_insights(roster: &[Player], analyses: &HashMap<String, MarketAnalysis>) {
    println!();
    println!("Roster betting signals");
    println!("----------------------");
    for player in roster {
        let Some(analysis) = analyses.get(&player.player_id) else {
            continue;
        };
        println!(
            "{} ({}, {})  score {:+}",
            player.name,
            player.position.as_str(),
            player.team,
            analysis.score
        );
        for insight in &analysis.insights {
            println!("    {insight}");
        }
    }
}

fn print_projection_report(scores: &[PlayerScore]) {
    println!();
    println!("Projection check (top 5)");
    println!("------------------------");
    for score in scores.iter().take(5) {
        println!(
            "{} ({})  {:.1} pts  confidence {:.0}%",
            score.player.name,
            score.player.position.as_str(),
            score.total_score,
            score.confidence * 100.0
        );
        if let Some(first) = score.reasoning.first() {
            println!("    {first}");
        }
    }
}

fn print_waiver_report(title: &str, suggestions: &[WaiverSuggestion]) {
    println!();
    println!("{title}");
    println!("{}", "-".repeat(title.len()));
    if suggestions.is_empty() {
        println!("No clear waiver improvements found.");
        return;
    }
    for suggestion in suggestions {
        println!(
            "{}: add {} ({:+.0}) drop {} ({:+.0}) net {:+.0}",
            suggestion.position.as_str(),
            suggestion.add.name,
            suggestion.add_score,
            suggestion.drop.name,
            suggestion.drop_score,
            suggestion.improvement
        );
    }
}

fn print_lineup_report(lineup: &AssembledLineup) {
    println!();
    println!("Optimal starting lineup");
    println!("-----------------------");
    for (kind, candidate) in lineup.starting_slots() {
        match candidate {
            Some(c) => println!(
                "{:<5} {} ({}, score {:+})",
                kind.label(),
                c.player.name,
                c.player.position.as_str(),
                c.analysis.score
            ),
            None => println!("{:<5} (unfilled)", kind.label()),
        }
    }
    for candidate in &lineup.bench {
        println!(
            "{:<5} {} (score {:+})",
            "BN",
            candidate.player.name,
            candidate.analysis.score
        );
    }
}

fn persist_run(
    cfg: &Config,
    lineup: &gridiron_optimizer::models::Lineup,
    assembled: &AssembledLineup,
    suggestions: &[WaiverSuggestion],
) -> Result<()> {
    let Some(path) = cfg.db_path.clone().or_else(store::default_db_path) else {
        warn!("no database path resolved, skipping persistence");
        return Ok(());
    };
    let db = Store::open(&path)?;

    db.save_lineup(lineup)?;

    let starters: Vec<String> = assembled
        .starters()
        .map(|c| c.player.player_id.clone())
        .collect();
    let unique: HashSet<&String> = starters.iter().collect();
    db.save_decision(&DecisionLog {
        timestamp: chrono::Utc::now(),
        week: lineup.week,
        season: lineup.season,
        decision_type: "lineup".to_string(),
        description: format!(
            "Weekly lineup with {} starters, {} waiver suggestions",
            unique.len(),
            suggestions.len()
        ),
        reasoning: format!("Market score total {:+}", assembled.total_score()),
        confidence: 0.0,
        players_involved: starters,
        was_executed: cfg.auto_submit && !cfg.dry_run,
        outcome: None,
    })?;

    db.save_metrics(&PerformanceMetrics {
        week: lineup.week,
        season: lineup.season,
        projected_points: lineup.total_projected_points,
        actual_points: 0.0,
        accuracy: 0.0,
        decision_quality: 0.0,
        notes: "pre-game projection".to_string(),
    })?;

    info!(db = %path.display(), "run persisted");
    Ok(())
}
