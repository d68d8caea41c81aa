
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    cache::TtlCache,
    config::Config,
    limiter::{OnExhaustion, RateLimited, RateLimiter},
    models::{
        ApiEnvelope, ApiStatus, LeagueEntry, Match, PlayerEntry, Standing, TeamEntry,
        error_payload,
    },
    retry::{RetryPolicy, Retryable},
};

const API_KEY_HEADER: &str = "x-apisports-key";

/// The longest minute-window stall worth sleeping through before a call is
/// rejected instead.
const MAX_BLOCKING_WAIT: Duration = Duration::from_secs(60);

/// Represents errors that can occur while talking to the sports-data API.
#[derive(Debug, Error)]
pub enum FootballApiError {
    /// The API rejected our key.
    #[error("Sports-data API rejected the configured key")]
    Authentication,

    /// The local rate limiter refused the call.
    #[error("Local request quota exhausted: {0}")]
    QuotaExhausted(#[from] RateLimited),

    /// The remote side throttled us despite the local limiter.
    #[error("Sports-data API throttled the request to {endpoint}")]
    RemoteRateLimited {
        /// Endpoint the throttled call targeted.
        endpoint: String,
    },

    /// The API answered with a server-side failure.
    #[error("Sports-data API returned server error {status} for {endpoint}")]
    Server {
        /// Endpoint the failed call targeted.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request ran past the configured timeout.
    #[error("Request to {endpoint} timed out")]
    Timeout {
        /// Endpoint the timed-out call targeted.
        endpoint: String,
    },

    /// The request failed below HTTP, e.g. DNS or a connection reset.
    #[error("Request to {endpoint} failed: {message}")]
    Transport {
        /// Endpoint the failed call targeted.
        endpoint: String,
        /// Underlying failure description.
        message: String,
    },

    /// The API answered 200 but reported an error payload.
    #[error("Sports-data API error for {endpoint}: {message}")]
    Api {
        /// Endpoint the failed call targeted.
        endpoint: String,
        /// Error payload reported by the API.
        message: String,
    },

    /// The API answered with a status this client does not handle.
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus {
        /// Endpoint the call targeted.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// A parameter failed local validation before any request was made.
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The response body was not the JSON shape we expect.
    #[error("Failed to decode response from {endpoint}")]
    Decode {
        /// Endpoint the call targeted.
        endpoint: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build the HTTP client: {0}")]
    ClientBuild(String),
}

impl Retryable for FootballApiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteRateLimited { .. }
                | Self::Server { .. }
                | Self::Timeout { .. }
                | Self::Transport { .. }
        )
    }
}

type Result<T> = std::result::Result<T, FootballApiError>;

/// Which side of today a team's fixture list covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureWindow {
    /// The next scheduled matches.
    Upcoming,
    /// The most recently played matches.
    Recent,
}

impl FixtureWindow {
    fn param(self) -> &'static str {
        match self {
            Self::Upcoming => "next",
            Self::Recent => "last",
        }
    }
}

/// Represents a client for the sports-data API.
#[automock]
#[async_trait]
pub trait FootballApi: Send + Sync {
    /// Fetches the matches scheduled on a `YYYY-MM-DD` date, optionally
    /// narrowed to one league and season.
    async fn fixtures_by_date(
        &self,
        date: &str,
        league: Option<i64>,
        season: Option<i32>,
    ) -> Result<Vec<Match>>;

    /// Fetches all matches currently in play.
    async fn live_fixtures(&self) -> Result<Vec<Match>>;

    /// Fetches a single match by its fixture id.
    async fn fixture_by_id(&self, fixture_id: i64) -> Result<Option<Match>>;

    /// Fetches `count` matches of a team, upcoming or recently played.
    async fn fixtures_by_team(
        &self,
        team_id: i64,
        window: FixtureWindow,
        count: u32,
    ) -> Result<Vec<Match>>;

    /// Fetches past meetings between two teams, most recent first.
    async fn head_to_head(&self, first_team: i64, second_team: i64) -> Result<Vec<Match>>;

    /// Fetches competitions, optionally narrowed to one country and season.
    async fn leagues(&self, country: Option<String>, season: Option<i32>)
    -> Result<Vec<LeagueEntry>>;

    /// Fetches a single competition by id.
    async fn league_by_id(&self, league_id: i64) -> Result<Option<LeagueEntry>>;

    /// Fetches the list of season years the API holds data for.
    async fn seasons(&self) -> Result<Vec<i32>>;

    /// Fetches the teams of a competition season.
    async fn teams(&self, league_id: i64, season: i32) -> Result<Vec<TeamEntry>>;

    /// Fetches a single team by id.
    async fn team_by_id(&self, team_id: i64) -> Result<Option<TeamEntry>>;

    /// Searches teams by name.
    async fn search_teams(&self, query: &str) -> Result<Vec<TeamEntry>>;

    /// Fetches the table of a competition season. The outer vector carries
    /// one table per group; single-table leagues yield exactly one.
    async fn standings(&self, league_id: i64, season: i32) -> Result<Vec<Vec<Standing>>>;

    /// Fetches the squad of a team for a season, with raw statistics.
    async fn players(&self, team_id: i64, season: i32) -> Result<Vec<PlayerEntry>>;

    /// Fetches subscription and daily-quota usage. Never cached, so the
    /// numbers are current.
    async fn api_status(&self) -> Result<ApiStatus>;
}

/// Sports-data API client combining a local rate limiter, retry with
/// exponential backoff, and per-category response caches.
pub struct ApiFootballClient {
    http: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
    retry: RetryPolicy,
    fixtures_cache: TtlCache<Value>,
    leagues_cache: TtlCache<Value>,
    teams_cache: TtlCache<Value>,
    standings_cache: TtlCache<Value>,
    players_cache: TtlCache<Value>,
}

/// Builds a stable cache key from an endpoint and its parameters.
/// Parameter order must not matter, so they are sorted by name.
fn cache_key(endpoint: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);
    let query: Vec<String> = sorted.iter().map(|(name, value)| format!("{name}={value}")).collect();
    format!("{endpoint}?{}", query.join("&"))
}

fn validate_date(name: &'static str, value: &str) -> Result<()> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        FootballApiError::InvalidParameter { name, value: value.to_owned() }
    })?;
    Ok(())
}

fn validate_id(name: &'static str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(FootballApiError::InvalidParameter { name, value: value.to_string() });
    }
    Ok(())
}

/// Maps a decoded body to an error for non-success outcomes, or extracts the
/// typed response items.
fn response_items<T: DeserializeOwned>(endpoint: &str, body: Value) -> Result<Vec<T>> {
    let envelope: ApiEnvelope<T> = serde_json::from_value(body)
        .map_err(|source| FootballApiError::Decode { endpoint: endpoint.to_owned(), source })?;
    Ok(envelope.response)
}

/// Wire shape of one standings response item: the tables sit nested inside
/// the league block.
#[derive(Debug, Deserialize)]
struct StandingsItem {
    league: StandingsLeague,
}

#[derive(Debug, Deserialize)]
struct StandingsLeague {
    #[serde(default)]
    standings: Vec<Vec<Standing>>,
}

impl ApiFootballClient {
    /// Creates a new client from the application configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_football_key)
            .map_err(|err| FootballApiError::ClientBuild(err.to_string()))?;
        headers.insert(API_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| FootballApiError::ClientBuild(err.to_string()))?;

        let limiter = RateLimiter::new(OnExhaustion::Block { max_wait: MAX_BLOCKING_WAIT })
            .with_window("per-minute", config.requests_per_minute, Duration::from_secs(60))
            .with_window("per-day", config.requests_per_day, Duration::from_secs(86_400));

        let retry = RetryPolicy::new(
            config.retry_max_attempts,
            config.retry_initial_delay,
            config.retry_backoff_multiplier,
        );

        Ok(Self {
            http,
            base_url: config.api_football_base_url.trim_end_matches('/').to_owned(),
            limiter,
            retry,
            fixtures_cache: TtlCache::new(config.cache_ttl_fixtures, config.cache_max_entries),
            leagues_cache: TtlCache::new(config.cache_ttl_leagues, config.cache_max_entries),
            teams_cache: TtlCache::new(config.cache_ttl_teams, config.cache_max_entries),
            standings_cache: TtlCache::new(config.cache_ttl_standings, config.cache_max_entries),
            players_cache: TtlCache::new(config.cache_ttl_players, config.cache_max_entries),
        })
    }

    /// Drops every cached response, across all categories.
    pub async fn clear_caches(&self) {
        self.fixtures_cache.invalidate_all().await;
        self.leagues_cache.invalidate_all().await;
        self.teams_cache.invalidate_all().await;
        self.standings_cache.invalidate_all().await;
        self.players_cache.invalidate_all().await;
    }

    /// One admitted pass through the pipeline: limiter, then HTTP, then
    /// status and payload mapping.
    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        self.limiter.acquire().await?;

        let url = format!("{}/{endpoint}", self.base_url);
        debug!("GET {url}");
        let response = self.http.get(&url).query(params).send().await.map_err(|err| {
            if err.is_timeout() {
                FootballApiError::Timeout { endpoint: endpoint.to_owned() }
            } else {
                FootballApiError::Transport { endpoint: endpoint.to_owned(), message: err.to_string() }
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let text = response.text().await.map_err(|err| FootballApiError::Transport {
                    endpoint: endpoint.to_owned(),
                    message: err.to_string(),
                })?;
                let body: Value = serde_json::from_str(&text).map_err(|source| {
                    FootballApiError::Decode { endpoint: endpoint.to_owned(), source }
                })?;
                // A 200 can still carry an application-level error payload.
                if let Some(message) = error_payload(&body) {
                    return Err(FootballApiError::Api { endpoint: endpoint.to_owned(), message });
                }
                Ok(body)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FootballApiError::Authentication),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(FootballApiError::RemoteRateLimited { endpoint: endpoint.to_owned() })
            }
            status if status.is_server_error() => Err(FootballApiError::Server {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
            }),
            status => Err(FootballApiError::UnexpectedStatus {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
            }),
        }
    }

    /// The full pipeline for a cacheable read: serve from `cache` while
    /// fresh, otherwise fetch with retries and store the raw body.
    async fn request(
        &self,
        cache: &TtlCache<Value>,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value> {
        let key = cache_key(endpoint, params);
        cache
            .get_or_compute(&key, || async move {
                self.retry.execute(endpoint, move || self.fetch(endpoint, params)).await
            })
            .await
    }
}

#[async_trait]
impl FootballApi for ApiFootballClient {
    #[instrument(skip(self))]
    async fn fixtures_by_date(
        &self,
        date: &str,
        league: Option<i64>,
        season: Option<i32>,
    ) -> Result<Vec<Match>> {
        validate_date("date", date)?;
        let mut params = vec![("date", date.to_owned())];
        if let Some(league) = league {
            validate_id("league", league)?;
            params.push(("league", league.to_string()));
        }
        if let Some(season) = season {
            params.push(("season", season.to_string()));
        }
        let body = self.request(&self.fixtures_cache, "fixtures", &params).await?;
        response_items("fixtures", body)
    }

    #[instrument(skip(self))]
    async fn live_fixtures(&self) -> Result<Vec<Match>> {
        let params = [("live", "all".to_owned())];
        let body = self.request(&self.fixtures_cache, "fixtures", &params).await?;
        response_items("fixtures", body)
    }

    #[instrument(skip(self))]
    async fn fixture_by_id(&self, fixture_id: i64) -> Result<Option<Match>> {
        validate_id("fixture_id", fixture_id)?;
        let params = [("id", fixture_id.to_string())];
        let body = self.request(&self.fixtures_cache, "fixtures", &params).await?;
        let mut items: Vec<Match> = response_items("fixtures", body)?;
        Ok(if items.is_empty() { None } else { Some(items.swap_remove(0)) })
    }

    #[instrument(skip(self))]
    async fn fixtures_by_team(
        &self,
        team_id: i64,
        window: FixtureWindow,
        count: u32,
    ) -> Result<Vec<Match>> {
        validate_id("team_id", team_id)?;
        let params = [("team", team_id.to_string()), (window.param(), count.to_string())];
        let body = self.request(&self.fixtures_cache, "fixtures", &params).await?;
        response_items("fixtures", body)
    }

    #[instrument(skip(self))]
    async fn head_to_head(&self, first_team: i64, second_team: i64) -> Result<Vec<Match>> {
        validate_id("first_team", first_team)?;
        validate_id("second_team", second_team)?;
        let params = [("h2h", format!("{first_team}-{second_team}"))];
        let body = self.request(&self.fixtures_cache, "fixtures/headtohead", &params).await?;
        response_items("fixtures/headtohead", body)
    }

    #[instrument(skip(self))]
    async fn leagues(
        &self,
        country: Option<String>,
        season: Option<i32>,
    ) -> Result<Vec<LeagueEntry>> {
        let mut params = Vec::new();
        if let Some(country) = country {
            params.push(("country", country));
        }
        if let Some(season) = season {
            params.push(("season", season.to_string()));
        }
        let body = self.request(&self.leagues_cache, "leagues", &params).await?;
        response_items("leagues", body)
    }

    #[instrument(skip(self))]
    async fn league_by_id(&self, league_id: i64) -> Result<Option<LeagueEntry>> {
        validate_id("league_id", league_id)?;
        let params = [("id", league_id.to_string())];
        let body = self.request(&self.leagues_cache, "leagues", &params).await?;
        let mut items: Vec<LeagueEntry> = response_items("leagues", body)?;
        Ok(if items.is_empty() { None } else { Some(items.swap_remove(0)) })
    }

    #[instrument(skip(self))]
    async fn seasons(&self) -> Result<Vec<i32>> {
        let body = self.request(&self.leagues_cache, "leagues/seasons", &[]).await?;
        response_items("leagues/seasons", body)
    }

    #[instrument(skip(self))]
    async fn teams(&self, league_id: i64, season: i32) -> Result<Vec<TeamEntry>> {
        validate_id("league_id", league_id)?;
        let params = [("league", league_id.to_string()), ("season", season.to_string())];
        let body = self.request(&self.teams_cache, "teams", &params).await?;
        response_items("teams", body)
    }

    #[instrument(skip(self))]
    async fn team_by_id(&self, team_id: i64) -> Result<Option<TeamEntry>> {
        validate_id("team_id", team_id)?;
        let params = [("id", team_id.to_string())];
        let body = self.request(&self.teams_cache, "teams", &params).await?;
        let mut items: Vec<TeamEntry> = response_items("teams", body)?;
        Ok(if items.is_empty() { None } else { Some(items.swap_remove(0)) })
    }

    #[instrument(skip(self))]
    async fn search_teams(&self, query: &str) -> Result<Vec<TeamEntry>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FootballApiError::InvalidParameter {
                name: "query",
                value: String::new(),
            });
        }
        let params = [("search", query.to_owned())];
        let body = self.request(&self.teams_cache, "teams", &params).await?;
        response_items("teams", body)
    }

    #[instrument(skip(self))]
    async fn standings(&self, league_id: i64, season: i32) -> Result<Vec<Vec<Standing>>> {
        validate_id("league_id", league_id)?;
        let params = [("league", league_id.to_string()), ("season", season.to_string())];
        let body = self.request(&self.standings_cache, "standings", &params).await?;
        let items: Vec<StandingsItem> = response_items("standings", body)?;
        Ok(items.into_iter().flat_map(|item| item.league.standings).collect())
    }

    #[instrument(skip(self))]
    async fn players(&self, team_id: i64, season: i32) -> Result<Vec<PlayerEntry>> {
        validate_id("team_id", team_id)?;
        let params = [("team", team_id.to_string()), ("season", season.to_string())];
        let body = self.request(&self.players_cache, "players", &params).await?;
        response_items("players", body)
    }

    #[instrument(skip(self))]
    async fn api_status(&self) -> Result<ApiStatus> {
        // Quota numbers must be current, so this bypasses every cache.
        let body = self.retry.execute("status", move || self.fetch("status", &[])).await?;
        // The status endpoint answers with a single object, not an array.
        match body.get("response") {
            None | Some(Value::Null) => Ok(ApiStatus::default()),
            Some(response) => serde_json::from_value(response.clone()).map_err(|source| {
                FootballApiError::Decode { endpoint: "status".to_owned(), source }
            }),
        }
    }
}
