// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity models: raw Strava records and their normalized form.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::strava::StravaActivity;

/// Sport type that the feature pipeline accepts.
pub const RUNNING_SPORT_TYPE: &str = "Run";

/// Stored activity record, as fetched from Strava.
///
/// Immutable once stored. Fields the pipeline does not model are kept in
/// `payload` so they survive for later use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawActivity {
    /// Strava activity ID (also used as document ID)
    pub id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Activity name/title
    #[serde(default)]
    pub name: String,
    /// Sport type (Run, Ride, Hike, etc.)
    pub sport_type: String,
    /// Start date/time
    pub start_date: DateTime<Utc>,
    /// Start in the athlete's local timezone, without offset
    #[serde(default)]
    pub start_date_local: Option<NaiveDateTime>,
    /// Distance in meters
    pub distance_meters: f64,
    /// Moving time in seconds
    pub moving_time_secs: u64,
    /// Elapsed time in seconds
    pub elapsed_time_secs: u64,
    /// Elevation gain in meters
    pub total_elevation_gain: Option<f64>,
    /// Average heart rate (bpm)
    pub average_heartrate: Option<f64>,
    /// Max heart rate (bpm)
    pub max_heartrate: Option<f64>,
    /// Average speed (m/s)
    pub average_speed: Option<f64>,
    /// Max speed (m/s)
    pub max_speed: Option<f64>,
    /// When this activity was fetched
    pub fetched_at: DateTime<Utc>,
    /// Remaining Strava fields, untouched
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl RawActivity {
    /// Build a stored record from a detailed Strava response.
    pub fn from_strava(athlete_id: u64, detail: StravaActivity, fetched_at: DateTime<Utc>) -> Self {
        let StravaActivity {
            id,
            name,
            sport_type,
            start_date,
            start_date_local,
            distance,
            moving_time,
            elapsed_time,
            total_elevation_gain,
            average_heartrate,
            max_heartrate,
            average_speed,
            max_speed,
            extra,
        } = detail;

        // Older API responses only carry the legacy `type` field.
        let sport_type = if sport_type.is_empty() {
            extra
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            sport_type
        };

        Self {
            id,
            athlete_id,
            name,
            sport_type,
            start_date,
            start_date_local,
            distance_meters: distance,
            moving_time_secs: moving_time,
            elapsed_time_secs: elapsed_time,
            total_elevation_gain,
            average_heartrate,
            max_heartrate,
            average_speed,
            max_speed,
            fetched_at,
            payload: extra,
        }
    }

    /// Local wall-clock start, falling back to UTC for records that lack it.
    pub fn local_start(&self) -> NaiveDateTime {
        self.start_date_local
            .unwrap_or_else(|| self.start_date.naive_utc())
    }

    /// Whether the feature pipeline processes this activity.
    pub fn is_running(&self) -> bool {
        self.sport_type == RUNNING_SPORT_TYPE
    }

    /// Strava's relative effort score, read from the extension payload.
    pub fn suffer_score(&self) -> Option<f64> {
        self.payload.get("suffer_score").and_then(Value::as_f64)
    }
}

/// A normalized running activity with derived training metrics.
///
/// Unknown source values stay `None`; they are never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub activity_id: u64,
    pub timestamp: DateTime<Utc>,
    /// 0 = Monday
    pub day_of_week: u32,
    pub month: u32,
    pub year: i32,
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// None when the distance is zero
    pub pace_min_per_km: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    /// Fraction of the rest-to-max heart-rate range used
    pub heart_rate_reserve_used: Option<f64>,
    pub training_impulse: Option<f64>,
    pub elevation_gain: Option<f64>,
    pub elevation_per_km: Option<f64>,
}
