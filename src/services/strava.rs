// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and the collaborator traits ingestion depends on.
//!
//! Handles:
//! - Activity listing and detail fetching
//! - Athlete profile, heart-rate zones and stats
//! - OAuth code exchange and token refresh
//! - Error classification (401 → authorization, everything else → transport)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::ActivityTotals;
use crate::time_utils::parse_local_datetime;

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Remote source of activity records.
///
/// Every call may fail with `AppError::Transport` or
/// `AppError::Authorization`.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// One page of activity summaries, newest first. Empty past the end.
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError>;

    async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError>;

    async fn get_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<StravaAthleteStats, AppError>;

    /// Profile of the athlete owning `access_token`.
    async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError>;

    /// Heart-rate (and power) zones of the athlete owning `access_token`.
    async fn get_zones(&self, access_token: &str) -> Result<StravaZones, AppError>;
}

/// OAuth token operations.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError>;

    /// Exchange an authorization code from the OAuth redirect.
    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: STRAVA_API_BASE.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        check_response_json(response).await
    }

    /// POST a form to the OAuth token endpoint.
    async fn post_token_form<T: for<'de> Deserialize<'de>>(
        &self,
        grant: (&str, &str),
        grant_type: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(STRAVA_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                grant,
                ("grant_type", grant_type),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Token request failed: {}", e)))?;

        check_response_json(response).await
    }
}

#[async_trait]
impl ActivitySource for StravaClient {
    async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        self.get_json(
            &url,
            access_token,
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }

    async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token, &[]).await
    }

    async fn get_stats(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<StravaAthleteStats, AppError> {
        let url = format!("{}/athletes/{}/stats", self.base_url, athlete_id);
        self.get_json(&url, access_token, &[]).await
    }

    async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError> {
        let url = format!("{}/athlete", self.base_url);
        self.get_json(&url, access_token, &[]).await
    }

    async fn get_zones(&self, access_token: &str) -> Result<StravaZones, AppError> {
        let url = format!("{}/athlete/zones", self.base_url);
        self.get_json(&url, access_token, &[]).await
    }
}

#[async_trait]
impl TokenProvider for StravaClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        self.post_token_form(("refresh_token", refresh_token), "refresh_token")
            .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        self.post_token_form(("code", code), "authorization_code")
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Strava token exchange failed"))
    }
}

/// Map a Strava response to a typed body or a classified error.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status.as_u16(), &body));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Transport(format!("JSON parse error: {}", e)))
}

fn classify_status(status: u16, body: &str) -> AppError {
    match status {
        401 => AppError::Authorization(AppError::STRAVA_TOKEN_ERROR.to_string()),
        429 => {
            tracing::warn!("Strava rate limit hit (429)");
            AppError::Transport(AppError::STRAVA_RATE_LIMIT.to_string())
        }
        _ => AppError::Transport(format!("HTTP {}: {}", status, body)),
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange and `GET /athlete`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// "M", "F" or absent
    #[serde(default)]
    pub sex: Option<String>,
    /// Kilograms; Strava reports 0 when unset
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Response of `GET /athlete/zones`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaZones {
    #[serde(default)]
    pub heart_rate: Option<StravaHeartRateZones>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaHeartRateZones {
    #[serde(default)]
    pub custom_zones: bool,
    #[serde(default)]
    pub zones: Vec<StravaZoneRange>,
}

/// One zone in bpm. The top zone is open-ended and reports `max` as -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StravaZoneRange {
    pub min: i32,
    pub max: i32,
}

/// Detailed Strava activity response.
///
/// Only the fields the pipeline models are typed; everything else lands in
/// `extra` and is stored untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    /// Wall-clock start in the activity's own timezone
    #[serde(default, deserialize_with = "deserialize_local_start")]
    pub start_date_local: Option<NaiveDateTime>,
    pub distance: f64,
    pub moving_time: u64,
    pub elapsed_time: u64,
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_local_start<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_local_datetime))
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sport_type: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub distance: f64,
}

/// Response of `GET /athletes/{id}/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaAthleteStats {
    #[serde(default)]
    pub recent_run_totals: ActivityTotals,
    #[serde(default)]
    pub all_run_totals: ActivityTotals,
    #[serde(default)]
    pub all_ride_totals: ActivityTotals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, ""),
            AppError::Authorization(msg) if msg == AppError::STRAVA_TOKEN_ERROR
        ));
        assert!(matches!(
            classify_status(429, ""),
            AppError::Transport(msg) if msg == AppError::STRAVA_RATE_LIMIT
        ));
        let err = classify_status(500, "boom");
        assert!(err.is_fetch_failure());
        assert!(!err.is_strava_token_error());
    }

    #[test]
    fn test_stats_ignores_unknown_fields() {
        let stats: StravaAthleteStats = serde_json::from_str(
            r#"{
                "biggest_ride_distance": 100000.0,
                "recent_run_totals": {"count": 3, "distance": 21000.0, "moving_time": 6300,
                                      "elapsed_time": 6500, "elevation_gain": 120.0,
                                      "achievement_count": 2},
                "all_run_totals": {"count": 250, "distance": 2500000.0}
            }"#,
        )
        .unwrap();

        assert_eq!(stats.recent_run_totals.count, 3);
        assert_eq!(stats.all_run_totals.moving_time, 0);
        assert_eq!(stats.all_ride_totals, ActivityTotals::default());
    }

    #[test]
    fn test_activity_keeps_local_start() {
        let activity: StravaActivity = serde_json::from_str(
            r#"{
                "id": 7, "sport_type": "Run",
                "start_date": "2024-01-14T22:00:00Z",
                "start_date_local": "2024-01-15T09:00:00Z",
                "timezone": "(GMT+10:00) Australia/Sydney",
                "distance": 10000.0, "moving_time": 3000, "elapsed_time": 3100
            }"#,
        )
        .unwrap();

        assert_eq!(
            activity.start_date_local.map(|t| t.to_string()),
            Some("2024-01-15 09:00:00".to_string())
        );
        assert!(!activity.extra.contains_key("start_date_local"));
        assert!(activity.extra.contains_key("timezone"));
    }

    #[test]
    fn test_zones_top_zone_open_ended() {
        let zones: StravaZones = serde_json::from_str(
            r#"{
                "heart_rate": {"custom_zones": false, "zones": [
                    {"min": 0, "max": 115}, {"min": 115, "max": 152},
                    {"min": 152, "max": 171}, {"min": 171, "max": 190},
                    {"min": 190, "max": -1}
                ]},
                "power": {"zones": []}
            }"#,
        )
        .unwrap();

        let hr = zones.heart_rate.unwrap();
        assert!(!hr.custom_zones);
        assert_eq!(hr.zones.len(), 5);
        assert_eq!(hr.zones[4], StravaZoneRange { min: 190, max: -1 });
    }

    #[test]
    fn test_athlete_profile_fields_optional() {
        let athlete: StravaAthlete =
            serde_json::from_str(r#"{"id": 9, "firstname": "A", "sex": "F", "weight": 58.5}"#)
                .unwrap();
        assert_eq!(athlete.sex.as_deref(), Some("F"));
        assert_eq!(athlete.weight, Some(58.5));

        let bare: StravaAthlete = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert_eq!(bare.sex, None);
    }

    #[test]
    fn test_summary_tolerates_sparse_entries() {
        let page: Vec<StravaActivitySummary> =
            serde_json::from_str(r#"[{"id": 1}, {"id": 2, "sport_type": "Run", "distance": 5000.0}]"#)
                .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].start_date, None);
        assert_eq!(page[1].sport_type, "Run");
    }
}
