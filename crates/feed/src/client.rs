//! Statistics feed REST client with rate limiting.
//!
//! Wraps the three feed endpoints the settlement scheduler needs and
//! converts their PascalCase payloads into core stat types.
//!
//! # Example
//!
//! ```ignore
//! use duel_feed::{FeedClient, FeedClientConfig};
//!
//! let config = FeedClientConfig::new("https://feed.example/v3/nfl", "secret");
//! let client = FeedClient::new(config)?;
//! let games = client.current_week_schedule().await?;
//! ```

use crate::error::{FeedError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use duel_core::{FeedConfig, GameSchedule, GameStatus, PlayerProjection, PlayerResult, StatsFeed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

/// Header carrying the feed subscription key.
pub const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub requests_per_minute: NonZeroU32,
    pub timeout_secs: u64,
}

impl FeedClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: SecretString::from(api_key.into()),
            requests_per_minute: nonzero!(60u32),
            timeout_secs: 30,
        }
    }

    /// Builds a client configuration from application settings.
    ///
    /// # Errors
    /// Returns [`FeedError::Configuration`] if the API key is missing or the
    /// rate limit is zero.
    pub fn from_settings(settings: &FeedConfig) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FeedError::Configuration("feed.api_key is not set".to_string()))?;

        let requests_per_minute = NonZeroU32::new(settings.requests_per_minute).ok_or_else(|| {
            FeedError::Configuration("feed.requests_per_minute must be positive".to_string())
        })?;

        Ok(Self::new(settings.base_url.clone(), api_key)
            .with_rate_limit(requests_per_minute)
            .with_timeout_secs(settings.timeout_secs))
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// Raw API types
// =============================================================================

/// Fantasy points arrive as JSON numbers from some endpoints and strings from others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPoints {
    Number(serde_json::Number),
    Text(String),
}

impl RawPoints {
    fn to_decimal(&self) -> Result<Decimal> {
        let text = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| FeedError::Serialization(format!("invalid fantasy points {text:?}: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawGame {
    game_key: String,
    status: String,
    home_team: String,
    away_team: String,
    #[serde(default)]
    date_time: Option<String>,
}

impl From<RawGame> for GameSchedule {
    fn from(raw: RawGame) -> Self {
        let status = match raw.status.as_str() {
            "InProgress" => GameStatus::InProgress,
            "Final" | "F/OT" => GameStatus::Final,
            "Postponed" | "Suspended" => GameStatus::Postponed,
            "Canceled" | "Cancelled" | "Forfeit" => GameStatus::Canceled,
            _ => GameStatus::Scheduled,
        };

        let starts_at = raw.date_time.as_deref().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        });

        Self {
            game_id: raw.game_key,
            status,
            home_team: raw.home_team,
            away_team: raw.away_team,
            starts_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPlayerGame {
    #[serde(rename = "PlayerID")]
    player_id: i64,
    #[serde(default)]
    is_game_over: bool,
    fantasy_points: Option<RawPoints>,
}

impl TryFrom<RawPlayerGame> for PlayerResult {
    type Error = FeedError;

    fn try_from(raw: RawPlayerGame) -> Result<Self> {
        let points = match raw.fantasy_points {
            Some(points) => points.to_decimal()?,
            None => Decimal::ZERO,
        };

        Ok(Self {
            player_id: raw.player_id.to_string(),
            is_final: raw.is_game_over,
            points,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawProjection {
    #[serde(rename = "PlayerID")]
    player_id: i64,
    fantasy_points: Option<RawPoints>,
    #[serde(default)]
    opponent: Option<String>,
}

impl TryFrom<RawProjection> for PlayerProjection {
    type Error = FeedError;

    fn try_from(raw: RawProjection) -> Result<Self> {
        let projected_points = match raw.fantasy_points {
            Some(points) => points.to_decimal()?,
            None => Decimal::ZERO,
        };

        Ok(Self {
            player_id: raw.player_id.to_string(),
            projected_points,
            opponent: raw.opponent.filter(|o| !o.is_empty()),
        })
    }
}

// =============================================================================
// FeedClient
// =============================================================================

/// Statistics feed REST client.
///
/// All requests wait on a shared rate limiter and carry the subscription key.
pub struct FeedClient {
    config: FeedClientConfig,
    http: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_minute", &self.config.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: FeedClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Schedule for the current league week.
    ///
    /// # Errors
    /// Returns error if the request or decoding fails.
    pub async fn current_week_schedule(&self) -> Result<Vec<GameSchedule>> {
        let raw: Vec<RawGame> = self.get("/schedule/current-week").await?;
        Ok(raw.into_iter().map(GameSchedule::from).collect())
    }

    /// Final (or in-progress) fantasy points for every player on a date.
    ///
    /// # Errors
    /// Returns error if the request fails or a points value cannot be parsed.
    pub async fn final_points(&self, date: NaiveDate) -> Result<Vec<PlayerResult>> {
        let path = format!("/fantasy/final/{}", date.format(DATE_FORMAT));
        let raw: Vec<RawPlayerGame> = self.get(&path).await?;
        raw.into_iter().map(PlayerResult::try_from).collect()
    }

    /// Projected fantasy points for every player on a date.
    ///
    /// # Errors
    /// Returns error if the request fails or a points value cannot be parsed.
    pub async fn projected_points(&self, date: NaiveDate) -> Result<Vec<PlayerProjection>> {
        let path = format!("/fantasy/projected/{}", date.format(DATE_FORMAT));
        let raw: Vec<RawProjection> = self.get(&path).await?;
        raw.into_iter().map(PlayerProjection::try_from).collect()
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(FeedError::rate_limit(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeedError::api(status.as_u16(), text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }
}

#[async_trait]
impl StatsFeed for FeedClient {
    async fn schedule_for_current_week(&self) -> anyhow::Result<Vec<GameSchedule>> {
        Ok(self.current_week_schedule().await?)
    }

    async fn final_fantasy_points(&self, date: NaiveDate) -> anyhow::Result<Vec<PlayerResult>> {
        Ok(self.final_points(date).await?)
    }

    async fn projected_fantasy_points(
        &self,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<PlayerProjection>> {
        Ok(self.projected_points(date).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FeedClient {
        FeedClient::new(FeedClientConfig::new(server.uri(), "test-key")).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 8).unwrap()
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_config_from_settings_requires_key() {
        let settings = FeedConfig {
            base_url: "https://feed.example".to_string(),
            api_key: None,
            requests_per_minute: 30,
            timeout_secs: 5,
        };
        assert!(matches!(
            FeedClientConfig::from_settings(&settings),
            Err(FeedError::Configuration(_))
        ));

        let settings = FeedConfig {
            api_key: Some("key".to_string()),
            ..settings
        };
        let config = FeedClientConfig::from_settings(&settings).unwrap();
        assert_eq!(config.requests_per_minute.get(), 30);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.api_key.expose_secret(), "key");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = FeedClient::new(FeedClientConfig::new("https://feed.example", "hunter2")).unwrap();
        assert!(!format!("{client:?}").contains("hunter2"));
    }

    // ==================== Conversion Tests ====================

    #[test]
    fn test_points_accept_numbers_and_strings() {
        let number: RawPoints = serde_json::from_value(json!(18.7)).unwrap();
        let text: RawPoints = serde_json::from_value(json!("18.70")).unwrap();
        assert_eq!(number.to_decimal().unwrap(), dec!(18.7));
        assert_eq!(text.to_decimal().unwrap(), dec!(18.7));

        let garbage: RawPoints = serde_json::from_value(json!("n/a")).unwrap();
        assert!(garbage.to_decimal().is_err());
    }

    #[test]
    fn test_game_status_mapping() {
        let raw = RawGame {
            game_key: "202410108".to_string(),
            status: "F/OT".to_string(),
            home_team: "KC".to_string(),
            away_team: "BAL".to_string(),
            date_time: Some("2024-09-05T20:20:00".to_string()),
        };
        let game = GameSchedule::from(raw);
        assert_eq!(game.status, GameStatus::Final);
        assert!(game.starts_at.is_some());
    }

    // ==================== HTTP Tests ====================

    #[tokio::test]
    async fn test_final_points_sends_key_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fantasy/final/2024-09-08"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"PlayerID": 101, "IsGameOver": true, "FantasyPoints": 24.5},
                {"PlayerID": 202, "IsGameOver": false, "FantasyPoints": "7.1"},
                {"PlayerID": 303, "IsGameOver": true, "FantasyPoints": null}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let results = client_for(&server).final_points(date()).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].player_id, "101");
        assert!(results[0].is_final);
        assert_eq!(results[0].points, dec!(24.5));
        assert!(!results[1].is_final);
        assert_eq!(results[2].points, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_projected_points() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fantasy/projected/2024-09-08"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"PlayerID": 101, "FantasyPoints": 19.25, "Opponent": "DAL"},
                {"PlayerID": 202, "FantasyPoints": 11, "Opponent": ""}
            ])))
            .mount(&server)
            .await;

        let projections = client_for(&server).projected_points(date()).await.unwrap();
        assert_eq!(projections[0].projected_points, dec!(19.25));
        assert_eq!(projections[0].opponent.as_deref(), Some("DAL"));
        assert_eq!(projections[1].opponent, None);
    }

    #[tokio::test]
    async fn test_schedule_through_trait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/schedule/current-week"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"GameKey": "1", "Status": "Scheduled", "HomeTeam": "NYG", "AwayTeam": "MIN"}
            ])))
            .mount(&server)
            .await;

        let feed: Arc<dyn StatsFeed> = Arc::new(client_for(&server));
        let games = feed.schedule_for_current_week().await.unwrap();
        assert_eq!(games[0].status, GameStatus::Scheduled);
        assert_eq!(games[0].starts_at, None);
    }

    #[tokio::test]
    async fn test_rate_limit_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
            .mount(&server)
            .await;

        let err = client_for(&server).final_points(date()).await.unwrap_err();
        assert!(matches!(err, FeedError::RateLimit { retry_after_secs: 12 }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = client_for(&server).projected_points(date()).await.unwrap_err();
        match err {
            FeedError::Api { status_code, message } => {
                assert_eq!(status_code, 401);
                assert_eq!(message, "invalid key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).current_week_schedule().await.unwrap_err();
        assert!(matches!(err, FeedError::Serialization(_)));
        assert!(!err.is_transient());
    }
}
