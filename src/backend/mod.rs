#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    config::Config,
    retry::{RetryPolicy, Retryable},
};

const API_KEY_HEADER: &str = "apikey";

/// Represents errors that can occur while talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend rejected our service key.
    #[error("Backend rejected the configured service key")]
    Authentication,

    /// The backend answered with a server-side failure.
    #[error("Backend returned server error {status} during {target}")]
    Server {
        /// Operation that failed.
        target: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The request ran past the configured timeout.
    #[error("Backend request timed out during {target}")]
    Timeout {
        /// Operation that failed.
        target: &'static str,
    },

    /// The request failed below HTTP, e.g. DNS or a connection reset.
    #[error("Backend request failed during {target}: {message}")]
    Transport {
        /// Operation that failed.
        target: &'static str,
        /// Underlying failure description.
        message: String,
    },

    /// The backend rejected the request itself, e.g. a constraint violation.
    #[error("Backend rejected {target} with status {status}: {body}")]
    Rejected {
        /// Operation that failed.
        target: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body as returned.
        body: String,
    },

    /// The response body was not the JSON shape we expect.
    #[error("Failed to decode backend response during {target}")]
    Decode {
        /// Operation that failed.
        target: &'static str,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The backend answered with no rows where one was required.
    #[error("Backend returned no rows during {target}")]
    EmptyResult {
        /// Operation that failed.
        target: &'static str,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build the backend client: {0}")]
    ClientBuild(String),
}

impl Retryable for BackendError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Timeout { .. } | Self::Transport { .. })
    }
}

type Result<T> = std::result::Result<T, BackendError>;

/// A registered user row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserRecord {
    /// Row identifier.
    pub id: i64,
    /// Telegram account identifier.
    pub telegram_id: i64,
    /// Telegram username, when set.
    #[serde(default)]
    pub username: Option<String>,
    /// Display name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Preferred language code.
    #[serde(default)]
    pub language: Option<String>,
    /// Free request points remaining.
    #[serde(default)]
    pub free_points: i32,
    /// Purchased request points remaining.
    #[serde(default)]
    pub premium_points: i32,
    /// Code others can use to be referred by this user.
    #[serde(default)]
    pub referral_code: Option<String>,
    /// When the row was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields for registering a user. Absent fields are left to their backend
/// defaults, so they are skipped rather than sent as nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewUser {
    /// Telegram account identifier.
    pub telegram_id: i64,
    /// Telegram username, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Preferred language code, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A partial update to a user row. Only the present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserChanges {
    /// New username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// New language code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// New free-point balance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_points: Option<i32>,
    /// New premium-point balance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_points: Option<i32>,
}

/// Which point balance a deduction was charged against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsType {
    /// Charged against the free balance.
    Free,
    /// Charged against the purchased balance.
    Premium,
    /// Nothing was charged.
    #[default]
    None,
}

/// Outcome of charging one request point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsDeduction {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Which balance was charged.
    pub points_type: PointsType,
    /// Free points left after the charge.
    pub free_remaining: i32,
    /// Premium points left after the charge.
    pub premium_remaining: i32,
    /// Whether the user should be warned about a low balance.
    pub show_warning: bool,
}

impl PointsDeduction {
    /// The outcome for a user with no balance left.
    pub fn denied() -> Self {
        Self {
            allowed: false,
            points_type: PointsType::None,
            free_remaining: 0,
            premium_remaining: 0,
            show_warning: false,
        }
    }
}

/// Row shape of the point-deduction stored procedure.
#[derive(Debug, Deserialize)]
struct DeductPointRow {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    points_type: PointsType,
    #[serde(default)]
    remaining_free: i32,
    #[serde(default)]
    remaining_premium: i32,
    #[serde(default)]
    show_warning: bool,
}

impl From<DeductPointRow> for PointsDeduction {
    fn from(row: DeductPointRow) -> Self {
        Self {
            allowed: row.success,
            points_type: row.points_type,
            free_remaining: row.remaining_free,
            premium_remaining: row.remaining_premium,
            show_warning: row.show_warning,
        }
    }
}

/// Outcome of crediting a referral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferralOutcome {
    /// Whether the referral was accepted and credited.
    pub success: bool,
    /// Telegram id of the referring user, when accepted.
    pub referrer_id: Option<i64>,
    /// Points granted to the new user.
    pub new_user_points: Option<i32>,
    /// Points granted to the referrer.
    pub referrer_points: Option<i32>,
}

impl ReferralOutcome {
    /// The outcome for a rejected or unknown referral code.
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Row shape of the referral stored procedure.
#[derive(Debug, Deserialize)]
struct ProcessReferralRow {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    referrer_id: Option<i64>,
    #[serde(default)]
    new_user_points: Option<i32>,
    #[serde(default)]
    referrer_points: Option<i32>,
}

impl From<ProcessReferralRow> for ReferralOutcome {
    fn from(row: ProcessReferralRow) -> Self {
        Self {
            success: row.success,
            referrer_id: row.referrer_id,
            new_user_points: row.new_user_points,
            referrer_points: row.referrer_points,
        }
    }
}

/// A credited referral row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReferralRecord {
    /// Telegram id of the referring user.
    pub referrer_id: i64,
    /// Telegram id of the referred user.
    pub referred_id: i64,
    /// When the referral was credited.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Per-user display preferences.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserPreferences {
    /// Telegram account identifier.
    pub telegram_id: i64,
    /// Favorite team id, when chosen.
    #[serde(default)]
    pub favorite_team: Option<i64>,
    /// Favorite league id, when chosen.
    #[serde(default)]
    pub favorite_league: Option<i64>,
    /// Whether match notifications are wanted.
    #[serde(default)]
    pub notifications: bool,
}

/// An audit entry for one served request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestLog {
    /// Telegram account identifier.
    pub telegram_id: i64,
    /// The command that was served.
    pub command: String,
    /// Which balance the request was charged against.
    pub points_type: PointsType,
}

/// Represents a client for the hosted backend holding users, points,
/// referrals and preferences.
#[automock]
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Looks up a user by Telegram id.
    async fn user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<UserRecord>>;

    /// Registers a new user and returns the created row.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    /// Applies a partial update to a user, returning whether a row matched.
    async fn update_user(&self, telegram_id: i64, changes: UserChanges) -> Result<bool>;

    /// Atomically charges one request point, premium balance first.
    async fn deduct_point(&self, telegram_id: i64) -> Result<PointsDeduction>;

    /// Atomically credits a referral code to a newly registered user.
    async fn process_referral(
        &self,
        new_user_id: i64,
        referral_code: String,
    ) -> Result<ReferralOutcome>;

    /// Lists the referrals credited to a user.
    async fn referrals_of(&self, referrer_id: i64) -> Result<Vec<ReferralRecord>>;

    /// Looks up the display preferences of a user.
    async fn preferences(&self, telegram_id: i64) -> Result<Option<UserPreferences>>;

    /// Creates or replaces the display preferences of a user.
    async fn upsert_preferences(&self, preferences: UserPreferences) -> Result<()>;

    /// Records one served request for auditing.
    async fn log_request(&self, entry: RequestLog) -> Result<()>;
}

/// Supabase-hosted implementation of [`DataStore`], speaking the PostgREST
/// wire protocol.
///
/// Reads and idempotent writes are retried; plain inserts and the stored
/// procedures are not, since a lost response would make a second attempt
/// double-apply them.
pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

/// Decodes the rows of a response body. Stored procedures returning a single
/// record answer with a bare object, which counts as one row.
fn rows<T: DeserializeOwned>(target: &'static str, body: Value) -> Result<Vec<T>> {
    match body {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(body)
            .map_err(|source| BackendError::Decode { target, source }),
        single => serde_json::from_value(single)
            .map(|row| vec![row])
            .map_err(|source| BackendError::Decode { target, source }),
    }
}

impl SupabaseStore {
    /// Creates a new store from the application configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.supabase_key)
            .map_err(|err| BackendError::ClientBuild(err.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.supabase_key))
            .map_err(|err| BackendError::ClientBuild(err.to_string()))?;
        headers.insert(API_KEY_HEADER, key);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| BackendError::ClientBuild(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_owned(),
            retry: RetryPolicy::new(
                config.retry_max_attempts,
                config.retry_initial_delay,
                config.retry_backoff_multiplier,
            ),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{function}", self.base_url)
    }

    /// Sends one request and maps the outcome. An empty success body decodes
    /// to JSON null.
    async fn execute(&self, target: &'static str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                BackendError::Timeout { target }
            } else {
                BackendError::Transport { target, message: err.to_string() }
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Authentication);
        }
        if status.is_server_error() {
            return Err(BackendError::Server { target, status: status.as_u16() });
        }

        let text = response.text().await.map_err(|err| BackendError::Transport {
            target,
            message: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(BackendError::Rejected { target, status: status.as_u16(), body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| BackendError::Decode { target, source })
    }

    /// Runs a retried select against a table.
    async fn select(
        &self,
        target: &'static str,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Value> {
        let url = self.table_url(table);
        self.retry
            .execute(target, move || self.execute(target, self.http.get(&url).query(filters)))
            .await
    }
}

#[async_trait]
impl DataStore for SupabaseStore {
    #[instrument(skip(self))]
    async fn user_by_telegram_id(&self, telegram_id: i64) -> Result<Option<UserRecord>> {
        let filters =
            [("select", "*".to_owned()), ("telegram_id", format!("eq.{telegram_id}"))];
        let body = self.select("user_by_telegram_id", "users", &filters).await?;
        let mut users: Vec<UserRecord> = rows("user_by_telegram_id", body)?;
        Ok(if users.is_empty() { None } else { Some(users.swap_remove(0)) })
    }

    #[instrument(skip(self, user), fields(telegram_id = user.telegram_id))]
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        // Not retried: a lost response would register the user twice.
        let request = self
            .http
            .post(self.table_url("users"))
            .header("Prefer", "return=representation")
            .json(&user);
        let body = self.execute("create_user", request).await?;
        let mut created: Vec<UserRecord> = rows("create_user", body)?;
        if created.is_empty() {
            return Err(BackendError::EmptyResult { target: "create_user" });
        }
        debug!("Registered user {}", user.telegram_id);
        Ok(created.swap_remove(0))
    }

    #[instrument(skip(self, changes))]
    async fn update_user(&self, telegram_id: i64, changes: UserChanges) -> Result<bool> {
        let url = self.table_url("users");
        let filter = [("telegram_id", format!("eq.{telegram_id}"))];
        let body = self
            .retry
            .execute("update_user", move || {
                self.execute(
                    "update_user",
                    self.http
                        .patch(&url)
                        .query(&filter)
                        .header("Prefer", "return=representation")
                        .json(&changes),
                )
            })
            .await?;
        let updated: Vec<UserRecord> = rows("update_user", body)?;
        Ok(!updated.is_empty())
    }

    #[instrument(skip(self))]
    async fn deduct_point(&self, telegram_id: i64) -> Result<PointsDeduction> {
        // Not retried: a lost response would charge the user twice.
        let request = self
            .http
            .post(self.rpc_url("deduct_point"))
            .json(&json!({ "user_telegram_id": telegram_id }));
        let body = self.execute("deduct_point", request).await?;
        let result: Vec<DeductPointRow> = rows("deduct_point", body)?;
        Ok(result.into_iter().next().map_or_else(PointsDeduction::denied, Into::into))
    }

    #[instrument(skip(self, referral_code))]
    async fn process_referral(
        &self,
        new_user_id: i64,
        referral_code: String,
    ) -> Result<ReferralOutcome> {
        // Not retried: a lost response would credit the referral twice.
        let request = self.http.post(self.rpc_url("process_referral")).json(&json!({
            "new_user_id": new_user_id,
            "referral_code_input": referral_code,
        }));
        let body = self.execute("process_referral", request).await?;
        let result: Vec<ProcessReferralRow> = rows("process_referral", body)?;
        Ok(result.into_iter().next().map_or_else(ReferralOutcome::failed, Into::into))
    }

    #[instrument(skip(self))]
    async fn referrals_of(&self, referrer_id: i64) -> Result<Vec<ReferralRecord>> {
        let filters =
            [("select", "*".to_owned()), ("referrer_id", format!("eq.{referrer_id}"))];
        let body = self.select("referrals_of", "referrals", &filters).await?;
        rows("referrals_of", body)
    }

    #[instrument(skip(self))]
    async fn preferences(&self, telegram_id: i64) -> Result<Option<UserPreferences>> {
        let filters =
            [("select", "*".to_owned()), ("telegram_id", format!("eq.{telegram_id}"))];
        let body = self.select("preferences", "user_preferences", &filters).await?;
        let mut found: Vec<UserPreferences> = rows("preferences", body)?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }

    #[instrument(skip(self, preferences), fields(telegram_id = preferences.telegram_id))]
    async fn upsert_preferences(&self, preferences: UserPreferences) -> Result<()> {
        // Replaying an upsert converges on the same row, so retrying is safe.
        let url = self.table_url("user_preferences");
        self.retry
            .execute("upsert_preferences", move || {
                self.execute(
                    "upsert_preferences",
                    self.http
                        .post(&url)
                        .header("Prefer", "resolution=merge-duplicates,return=minimal")
                        .json(&preferences),
                )
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, entry), fields(telegram_id = entry.telegram_id))]
    async fn log_request(&self, entry: RequestLog) -> Result<()> {
        // Not retried: duplicate audit rows would skew usage numbers.
        let request = self.http.post(self.table_url("request_logs")).json(&entry);
        self.execute("log_request", request).await?;
        Ok(())
    }
}
