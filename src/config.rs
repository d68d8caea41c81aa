use std::{
    env::{self, VarError},
    time::Duration,
};

const DEFAULT_API_FOOTBALL_BASE_URL: &str = "https://v3.football.api-sports.io";
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;
const DEFAULT_REQUESTS_PER_DAY: u32 = 100;
const DEFAULT_CACHE_TTL_FIXTURES: u64 = 300;
const DEFAULT_CACHE_TTL_LEAGUES: u64 = 86_400;
const DEFAULT_CACHE_TTL_TEAMS: u64 = 86_400;
const DEFAULT_CACHE_TTL_STANDINGS: u64 = 3_600;
const DEFAULT_CACHE_TTL_PLAYERS: u64 = 86_400;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 128;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_INITIAL_DELAY_SECS: u64 = 1;
const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Represents the application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The API key for the sports-data API.
    pub api_football_key: String,
    /// The base URL of the sports-data API.
    pub api_football_base_url: String,
    /// The URL of the hosted backend.
    pub supabase_url: String,
    /// The service key for the hosted backend.
    pub supabase_key: String,
    /// The number of sports-data API calls admitted per minute.
    pub requests_per_minute: u32,
    /// The number of sports-data API calls admitted per day.
    pub requests_per_day: u32,
    /// The freshness window for cached fixture responses.
    pub cache_ttl_fixtures: Duration,
    /// The freshness window for cached league responses.
    pub cache_ttl_leagues: Duration,
    /// The freshness window for cached team responses.
    pub cache_ttl_teams: Duration,
    /// The freshness window for cached standings responses.
    pub cache_ttl_standings: Duration,
    /// The freshness window for cached player responses.
    pub cache_ttl_players: Duration,
    /// The number of entries kept per cache before the oldest insertion is
    /// evicted.
    pub cache_max_entries: usize,
    /// The maximum number of invocations per wrapped call.
    pub retry_max_attempts: u32,
    /// The delay before the first retry.
    pub retry_initial_delay: Duration,
    /// The multiplier applied to the retry delay after each attempt.
    pub retry_backoff_multiplier: f64,
    /// The timeout applied to every outbound HTTP request.
    pub request_timeout: Duration,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    pub fn from_env() -> Result<Self, VarError> {
        Ok(Self {
            api_football_key: env::var("API_FOOTBALL_KEY")?,
            api_football_base_url: env::var("API_FOOTBALL_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_FOOTBALL_BASE_URL.to_string()),
            supabase_url: env::var("SUPABASE_URL")?,
            supabase_key: env::var("SUPABASE_KEY")?,
            requests_per_minute: env::var("REQUESTS_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            requests_per_day: env::var("REQUESTS_PER_DAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REQUESTS_PER_DAY),
            cache_ttl_fixtures: Duration::from_secs(
                env::var("CACHE_TTL_FIXTURES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_FIXTURES),
            ),
            cache_ttl_leagues: Duration::from_secs(
                env::var("CACHE_TTL_LEAGUES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_LEAGUES),
            ),
            cache_ttl_teams: Duration::from_secs(
                env::var("CACHE_TTL_TEAMS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_TEAMS),
            ),
            cache_ttl_standings: Duration::from_secs(
                env::var("CACHE_TTL_STANDINGS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_STANDINGS),
            ),
            cache_ttl_players: Duration::from_secs(
                env::var("CACHE_TTL_PLAYERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CACHE_TTL_PLAYERS),
            ),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            retry_max_attempts: env::var("RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            retry_initial_delay: Duration::from_secs(
                env::var("RETRY_INITIAL_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_INITIAL_DELAY_SECS),
            ),
            retry_backoff_multiplier: env::var("RETRY_BACKOFF_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_BACKOFF_MULTIPLIER),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use temp_env::with_vars;

    use super::*;

    #[test]
    fn test_from_env() {
        with_vars(
            [
                ("API_FOOTBALL_KEY", Some("test api key")),
                ("API_FOOTBALL_BASE_URL", Some("https://api.example.com")),
                ("SUPABASE_URL", Some("https://project.supabase.co")),
                ("SUPABASE_KEY", Some("test supabase key")),
                ("REQUESTS_PER_MINUTE", Some("25")),
                ("REQUESTS_PER_DAY", Some("2900")),
                ("CACHE_TTL_FIXTURES", Some("60")),
                ("RETRY_MAX_ATTEMPTS", Some("5")),
                ("REQUEST_TIMEOUT_SECS", Some("10")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.api_football_key, "test api key");
                assert_eq!(config.api_football_base_url, "https://api.example.com");
                assert_eq!(config.supabase_url, "https://project.supabase.co");
                assert_eq!(config.supabase_key, "test supabase key");
                assert_eq!(config.requests_per_minute, 25);
                assert_eq!(config.requests_per_day, 2900);
                assert_eq!(config.cache_ttl_fixtures, Duration::from_secs(60));
                assert_eq!(config.retry_max_attempts, 5);
                assert_eq!(config.request_timeout, Duration::from_secs(10));
            },
        );
    }

    #[test]
    fn test_missing_api_key_error() {
        with_vars(
            [
                ("API_FOOTBALL_KEY", None),
                ("SUPABASE_URL", Some("https://project.supabase.co")),
                ("SUPABASE_KEY", Some("test supabase key")),
            ],
            || {
                let config = Config::from_env();
                assert!(config.is_err());
            },
        );
    }

    #[test]
    fn test_missing_supabase_url_error() {
        with_vars(
            [
                ("API_FOOTBALL_KEY", Some("test api key")),
                ("SUPABASE_URL", None),
                ("SUPABASE_KEY", Some("test supabase key")),
            ],
            || {
                let config = Config::from_env();
                assert!(config.is_err());
            },
        );
    }

    #[test]
    fn test_missing_base_url_default() {
        with_vars(
            [
                ("API_FOOTBALL_KEY", Some("test api key")),
                ("SUPABASE_URL", Some("https://project.supabase.co")),
                ("SUPABASE_KEY", Some("test supabase key")),
                ("API_FOOTBALL_BASE_URL", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.api_football_base_url, DEFAULT_API_FOOTBALL_BASE_URL);
            },
        );
    }

    #[test]
    fn test_missing_limits_default() {
        with_vars(
            [
                ("API_FOOTBALL_KEY", Some("test api key")),
                ("SUPABASE_URL", Some("https://project.supabase.co")),
                ("SUPABASE_KEY", Some("test supabase key")),
                ("REQUESTS_PER_MINUTE", None),
                ("REQUESTS_PER_DAY", None),
                ("CACHE_MAX_ENTRIES", None),
                ("RETRY_MAX_ATTEMPTS", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
                assert_eq!(config.requests_per_day, DEFAULT_REQUESTS_PER_DAY);
                assert_eq!(config.cache_max_entries, DEFAULT_CACHE_MAX_ENTRIES);
                assert_eq!(config.retry_max_attempts, DEFAULT_RETRY_MAX_ATTEMPTS);
            },
        );
    }

    #[test]
    fn test_missing_ttls_default() {
        with_vars(
            [
                ("API_FOOTBALL_KEY", Some("test api key")),
                ("SUPABASE_URL", Some("https://project.supabase.co")),
                ("SUPABASE_KEY", Some("test supabase key")),
                ("CACHE_TTL_FIXTURES", None),
                ("CACHE_TTL_LEAGUES", None),
                ("CACHE_TTL_STANDINGS", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(
                    config.cache_ttl_fixtures,
                    Duration::from_secs(DEFAULT_CACHE_TTL_FIXTURES)
                );
                assert_eq!(config.cache_ttl_leagues, Duration::from_secs(DEFAULT_CACHE_TTL_LEAGUES));
                assert_eq!(
                    config.cache_ttl_standings,
                    Duration::from_secs(DEFAULT_CACHE_TTL_STANDINGS)
                );
            },
        );
    }
}
