// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Athlete totals as reported by Strava's stats endpoint.
//!
//! Stored once per ingestion cycle so the dashboard can show lifetime
//! volume without reading every activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::strava::StravaAthleteStats;

/// Totals for one activity category and period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTotals {
    #[serde(default)]
    pub count: u32,
    /// Meters
    #[serde(default)]
    pub distance: f64,
    /// Seconds
    #[serde(default)]
    pub moving_time: u64,
    /// Seconds
    #[serde(default)]
    pub elapsed_time: u64,
    /// Meters
    #[serde(default)]
    pub elevation_gain: f64,
}

/// Stored athlete stats, keyed by athlete_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteStats {
    pub athlete_id: u64,
    /// Last four weeks
    #[serde(default)]
    pub recent_run_totals: ActivityTotals,
    #[serde(default)]
    pub all_run_totals: ActivityTotals,
    #[serde(default)]
    pub all_ride_totals: ActivityTotals,
    pub fetched_at: DateTime<Utc>,
}

impl AthleteStats {
    pub fn from_strava(athlete_id: u64, stats: StravaAthleteStats, fetched_at: DateTime<Utc>) -> Self {
        Self {
            athlete_id,
            recent_run_totals: stats.recent_run_totals,
            all_run_totals: stats.all_run_totals,
            all_ride_totals: stats.all_ride_totals,
            fetched_at,
        }
    }

    /// Lifetime average run distance in km, if any runs are recorded.
    pub fn average_run_km(&self) -> Option<f64> {
        let totals = &self.all_run_totals;
        (totals.count > 0).then(|| totals.distance / 1000.0 / totals.count as f64)
    }
}
