
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire shape of every sports-data API response: a `response` array plus an
/// `errors` field that is empty on success.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Error payload; an empty array or object when the call succeeded.
    #[serde(default)]
    pub errors: Value,
    /// The result items.
    #[serde(default = "Vec::new")]
    pub response: Vec<T>,
}

/// Extracts the error payload from a raw response body, if any. The API
/// reports success as either an empty `errors` array or an empty object.
pub fn error_payload(body: &Value) -> Option<String> {
    match body.get("errors") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) if items.is_empty() => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Short status codes reported for a fixture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum MatchStatus {
    /// Date and time still to be confirmed.
    #[serde(rename = "TBD")]
    ToBeDefined,
    /// Scheduled but not kicked off.
    #[default]
    #[serde(rename = "NS")]
    NotStarted,
    /// First half in play.
    #[serde(rename = "1H")]
    FirstHalf,
    /// Halftime break.
    #[serde(rename = "HT")]
    Halftime,
    /// Second half in play.
    #[serde(rename = "2H")]
    SecondHalf,
    /// Extra time in play.
    #[serde(rename = "ET")]
    ExtraTime,
    /// Break before extra time.
    #[serde(rename = "BT")]
    BreakTime,
    /// Penalty shootout in play.
    #[serde(rename = "P")]
    Penalty,
    /// Suspended mid-game.
    #[serde(rename = "SUSP")]
    Suspended,
    /// Interrupted mid-game.
    #[serde(rename = "INT")]
    Interrupted,
    /// Finished after regular time.
    #[serde(rename = "FT")]
    Finished,
    /// Finished after extra time.
    #[serde(rename = "AET")]
    FinishedAfterExtraTime,
    /// Finished after a penalty shootout.
    #[serde(rename = "PEN")]
    FinishedAfterPenalties,
    /// Postponed to a later date.
    #[serde(rename = "PST")]
    Postponed,
    /// Cancelled outright.
    #[serde(rename = "CANC")]
    Cancelled,
    /// Abandoned mid-game.
    #[serde(rename = "ABD")]
    Abandoned,
    /// Awarded as a technical loss.
    #[serde(rename = "AWD")]
    TechnicalLoss,
    /// Decided by walkover.
    #[serde(rename = "WO")]
    Walkover,
    /// Generic in-play marker.
    #[serde(rename = "LIVE")]
    Live,
    /// Any status code this client does not know.
    #[serde(other)]
    Unknown,
}

impl MatchStatus {
    /// Whether the match is currently in play (including breaks and
    /// stoppages within a live game).
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Self::FirstHalf
                | Self::Halftime
                | Self::SecondHalf
                | Self::ExtraTime
                | Self::BreakTime
                | Self::Penalty
                | Self::Suspended
                | Self::Interrupted
                | Self::Live
        )
    }

    /// Whether the match reached a final result.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::Finished
                | Self::FinishedAfterExtraTime
                | Self::FinishedAfterPenalties
                | Self::TechnicalLoss
                | Self::Walkover
        )
    }

    /// Whether the match has not started yet.
    pub fn is_scheduled(self) -> bool {
        matches!(self, Self::NotStarted | Self::ToBeDefined)
    }

    /// Whether the match was called off.
    pub fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled | Self::Postponed | Self::Abandoned)
    }
}

/// A football team.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Team {
    /// Stable team identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Short code, e.g. "MUN".
    #[serde(default)]
    pub code: Option<String>,
    /// Country the team plays in.
    #[serde(default)]
    pub country: Option<String>,
    /// Founding year.
    #[serde(default)]
    pub founded: Option<i32>,
    /// Whether this is a national side.
    #[serde(default)]
    pub national: Option<bool>,
    /// Logo URL.
    #[serde(default)]
    pub logo: Option<String>,
}

/// A match venue.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Venue {
    /// Stable venue identifier.
    #[serde(default)]
    pub id: Option<i64>,
    /// Stadium name.
    #[serde(default)]
    pub name: Option<String>,
    /// City the stadium is in.
    #[serde(default)]
    pub city: Option<String>,
    /// Country the stadium is in.
    #[serde(default)]
    pub country: Option<String>,
    /// Seating capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Playing surface.
    #[serde(default)]
    pub surface: Option<String>,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
}

/// A league or competition, as attached to fixtures and standings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct League {
    /// Stable league identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Country the league belongs to.
    #[serde(default)]
    pub country: Option<String>,
    /// Logo URL.
    #[serde(default)]
    pub logo: Option<String>,
    /// Country flag URL.
    #[serde(default)]
    pub flag: Option<String>,
    /// Season year this payload refers to.
    #[serde(default)]
    pub season: Option<i32>,
    /// Round within the season, e.g. "Regular Season - 21".
    #[serde(default)]
    pub round: Option<String>,
    /// League or Cup.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Goals for one side each. `None` means "not played yet", never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Score {
    /// Home side goals.
    #[serde(default)]
    pub home: Option<u32>,
    /// Away side goals.
    #[serde(default)]
    pub away: Option<u32>,
}

/// Per-period score breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScoreBreakdown {
    /// Score at halftime.
    #[serde(default)]
    pub halftime: Score,
    /// Score at full time.
    #[serde(default)]
    pub fulltime: Score,
    /// Score after extra time, if played.
    #[serde(default)]
    pub extratime: Score,
    /// Penalty shootout score, if taken.
    #[serde(default)]
    pub penalty: Score,
}

/// Status block attached to a fixture.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FixtureStatus {
    /// Long human-readable form.
    #[serde(default)]
    pub long: Option<String>,
    /// Short status code.
    #[serde(default)]
    pub short: MatchStatus,
    /// Minutes elapsed, when in play.
    #[serde(default)]
    pub elapsed: Option<u32>,
}

/// Scheduling details of a match.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fixture {
    /// Stable fixture identifier.
    pub id: i64,
    /// Referee name, when assigned.
    #[serde(default)]
    pub referee: Option<String>,
    /// Timezone of the kickoff time.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Kickoff time.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Kickoff as a unix timestamp.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Venue the match is played at.
    #[serde(default)]
    pub venue: Option<Venue>,
    /// Current status.
    #[serde(default)]
    pub status: FixtureStatus,
}

/// The two sides of a match.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MatchTeams {
    /// Home side.
    pub home: Team,
    /// Away side.
    pub away: Team,
}

/// A complete match: scheduling, competition, sides and scores.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Match {
    /// Scheduling details.
    pub fixture: Fixture,
    /// Competition the match belongs to.
    pub league: League,
    /// The two sides.
    pub teams: MatchTeams,
    /// Current goals.
    #[serde(default)]
    pub goals: Score,
    /// Per-period breakdown.
    #[serde(default)]
    pub score: ScoreBreakdown,
}

impl Match {
    /// Short status code of the match.
    pub fn status(&self) -> MatchStatus {
        self.fixture.status.short
    }

    /// Whether the match is currently in play.
    pub fn is_live(&self) -> bool {
        self.status().is_live()
    }

    /// Whether the match reached a final result.
    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Whether the match has not started yet.
    pub fn is_scheduled(&self) -> bool {
        self.status().is_scheduled()
    }

    /// Whether the match was called off.
    pub fn is_cancelled(&self) -> bool {
        self.status().is_cancelled()
    }

    /// "2 - 1" once goals exist, "vs" before kickoff.
    pub fn score_display(&self) -> String {
        match (self.goals.home, self.goals.away) {
            (Some(home), Some(away)) => format!("{home} - {away}"),
            _ => "vs".to_owned(),
        }
    }

    /// One-line summary, e.g. "Arsenal 2 - 1 Chelsea".
    pub fn summary(&self) -> String {
        format!("{} {} {}", self.teams.home.name, self.score_display(), self.teams.away.name)
    }
}

/// Win/draw/loss record within a standings row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StandingRecord {
    /// Matches played.
    #[serde(default)]
    pub played: u32,
    /// Matches won.
    #[serde(default)]
    pub win: u32,
    /// Matches drawn.
    #[serde(default)]
    pub draw: u32,
    /// Matches lost.
    #[serde(default)]
    pub lose: u32,
    /// Goals scored and conceded.
    #[serde(default)]
    pub goals: GoalsRecord,
}

/// Goals scored and conceded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GoalsRecord {
    /// Goals scored.
    #[serde(default, rename = "for")]
    pub scored: u32,
    /// Goals conceded.
    #[serde(default)]
    pub against: u32,
}

/// One row of a league table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Standing {
    /// Position in the table.
    pub rank: u32,
    /// The ranked team.
    pub team: Team,
    /// Points accumulated.
    pub points: i32,
    /// Goal difference.
    #[serde(default, rename = "goalsDiff")]
    pub goals_diff: i32,
    /// Group name, for group-stage tables.
    #[serde(default)]
    pub group: Option<String>,
    /// Recent form string, e.g. "WWDLW".
    #[serde(default)]
    pub form: Option<String>,
    /// Promotion/relegation annotation.
    #[serde(default)]
    pub description: Option<String>,
    /// Overall record.
    #[serde(default)]
    pub all: StandingRecord,
}

/// A league with its country and known seasons, as returned by the leagues
/// endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LeagueEntry {
    /// The league itself.
    pub league: League,
    /// Country the league belongs to.
    #[serde(default)]
    pub country: Option<Country>,
    /// Seasons the API holds data for.
    #[serde(default)]
    pub seasons: Vec<Season>,
}

/// A country, as attached to league entries.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Country {
    /// Display name.
    pub name: String,
    /// Two-letter code.
    #[serde(default)]
    pub code: Option<String>,
    /// Flag URL.
    #[serde(default)]
    pub flag: Option<String>,
}

/// One season of a league.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Season {
    /// Season year.
    pub year: i32,
    /// First match date, ISO formatted.
    #[serde(default)]
    pub start: Option<String>,
    /// Last match date, ISO formatted.
    #[serde(default)]
    pub end: Option<String>,
    /// Whether this is the running season.
    #[serde(default)]
    pub current: bool,
}

/// A team with its home venue, as returned by the teams endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TeamEntry {
    /// The team itself.
    pub team: Team,
    /// Home venue.
    #[serde(default)]
    pub venue: Option<Venue>,
}

/// A player.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Player {
    /// Stable player identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// First name.
    #[serde(default)]
    pub firstname: Option<String>,
    /// Last name.
    #[serde(default)]
    pub lastname: Option<String>,
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Nationality.
    #[serde(default)]
    pub nationality: Option<String>,
    /// Height, e.g. "180 cm".
    #[serde(default)]
    pub height: Option<String>,
    /// Weight, e.g. "74 kg".
    #[serde(default)]
    pub weight: Option<String>,
    /// Photo URL.
    #[serde(default)]
    pub photo: Option<String>,
}

/// A player with per-competition statistics, as returned by the players
/// endpoint. Statistics are kept raw; rendering picks what it needs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerEntry {
    /// The player itself.
    pub player: Player,
    /// Raw per-competition statistics blocks.
    #[serde(default)]
    pub statistics: Vec<Value>,
}

/// Daily quota usage, part of the API status response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RequestsQuota {
    /// Calls made today.
    #[serde(default)]
    pub current: u32,
    /// Calls allowed per day.
    #[serde(default)]
    pub limit_day: u32,
}

/// Subscription and quota information from the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStatus {
    /// Raw account block.
    #[serde(default)]
    pub account: Value,
    /// Raw subscription block.
    #[serde(default)]
    pub subscription: Value,
    /// Daily quota usage.
    #[serde(default)]
    pub requests: RequestsQuota,
}
