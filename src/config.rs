use std::env;
use std::path::PathBuf;

/// All run configuration, resolved once in `main` and passed by reference
/// into each component. There is no process-wide config instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub league_id: String,
    pub team_id: String,
    pub season: u32,
    /// Supersedes the platform's current week for what-if runs.
    pub week_override: Option<u32>,

    pub platform_base_url: String,
    pub platform_token: Option<String>,

    pub odds_api_key: Option<String>,
    pub odds_regions: String,
    pub odds_cache_ttl_secs: u64,

    pub auto_submit: bool,
    pub dry_run: bool,
    pub free_agents_per_position: usize,
    pub max_waiver_suggestions: usize,

    // Evaluator decision weights. All default to zero: the market-odds score
    // is the primary signal and the evaluator path only blends these in when
    // explicitly configured.
    pub matchup_weight: f64,
    pub injury_weight: f64,
    pub weather_weight: f64,
    pub trend_weight: f64,

    pub db_path: Option<PathBuf>,
}

const DEFAULT_PLATFORM_BASE_URL: &str = "https://fantasysports.yahooapis.com/fantasy/v2";
const DEFAULT_ODDS_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_FREE_AGENTS_PER_POSITION: usize = 10;
const DEFAULT_MAX_WAIVER_SUGGESTIONS: usize = 5;

impl Config {
    pub fn from_env() -> Self {
        let league_id = env_string("LEAGUE_ID").unwrap_or_default();
        let team_id = env_string("TEAM_ID").unwrap_or_default();
        let season = env_parse("SEASON").unwrap_or(2025);
        let week_override = env_parse::<u32>("WEEK_OVERRIDE");

        let platform_base_url = env_string("PLATFORM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PLATFORM_BASE_URL.to_string());
        let platform_token = env_string("PLATFORM_TOKEN");

        let odds_api_key = env_string("ODDS_API_KEY");
        let odds_regions = env_string("ODDS_REGIONS")
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "us".to_string());
        let odds_cache_ttl_secs = env_parse("ODDS_CACHE_TTL_SECS")
            .unwrap_or(DEFAULT_ODDS_CACHE_TTL_SECS)
            .clamp(30, 3600);

        Self {
            league_id,
            team_id,
            season,
            week_override,
            platform_base_url,
            platform_token,
            odds_api_key,
            odds_regions,
            odds_cache_ttl_secs,
            auto_submit: env_bool("AUTO_SUBMIT", false),
            dry_run: env_bool("DRY_RUN", false),
            free_agents_per_position: env_parse("FREE_AGENTS_PER_POSITION")
                .unwrap_or(DEFAULT_FREE_AGENTS_PER_POSITION)
                .clamp(1, 50),
            max_waiver_suggestions: env_parse("MAX_WAIVER_SUGGESTIONS")
                .unwrap_or(DEFAULT_MAX_WAIVER_SUGGESTIONS)
                .clamp(1, 25),
            matchup_weight: env_parse("MATCHUP_WEIGHT").unwrap_or(0.0),
            injury_weight: env_parse("INJURY_WEIGHT").unwrap_or(0.0),
            weather_weight: env_parse("WEATHER_WEIGHT").unwrap_or(0.0),
            trend_weight: env_parse("TREND_WEIGHT").unwrap_or(0.0),
            db_path: env_string("DB_PATH").map(PathBuf::from),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}
