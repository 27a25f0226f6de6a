use std::env;

/// Application configuration loaded from environment variables. Parsing
/// failures here are fatal at boot; nothing here is re-read mid-run.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,

    pub scrape_interval_seconds: f64,
    pub request_timeout_seconds: f64,
    pub max_concurrent_requests: usize,

    pub match_time_window_minutes: i64,
    pub match_similarity_threshold: f64,

    pub min_profit_percentage: f64,
    pub arbitrage_dedup_hours: i64,

    pub enable_odds_history: bool,
    pub history_retention_days: i64,

    pub meridian_landing_url: String,
    pub mozzart_base_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            scrape_interval_seconds: parse_env("SCRAPE_INTERVAL_SECONDS", 2.0),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS", 30.0),
            max_concurrent_requests: parse_env("MAX_CONCURRENT_REQUESTS", 10usize),

            match_time_window_minutes: parse_env("MATCH_TIME_WINDOW_MINUTES", 120i64),
            match_similarity_threshold: parse_env("MATCH_SIMILARITY_THRESHOLD", 75.0),

            min_profit_percentage: parse_env("MIN_PROFIT_PERCENTAGE", 1.0),
            arbitrage_dedup_hours: parse_env("ARBITRAGE_DEDUP_HOURS", 24i64),

            enable_odds_history: parse_env("ENABLE_ODDS_HISTORY", true),
            history_retention_days: parse_env("HISTORY_RETENTION_DAYS", 7i64),

            meridian_landing_url: env_or(
                "MERIDIAN_LANDING_URL",
                "https://meridianbet.rs/sr/kladjenje/fudbal",
            ),
            mozzart_base_url: env_or("MOZZART_BASE_URL", "https://www.mozzartbet.com"),
        }
    }
}
