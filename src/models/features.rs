// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feature table rows and point-in-time feature vectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CanonicalRecord;

/// Aggregates over one trailing window ending at a row's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub window_days: u32,
    /// Sum of distance (km)
    pub distance_km: f64,
    /// Number of runs in the window
    pub runs: u32,
    /// Mean pace over runs with a known pace
    pub avg_pace: Option<f64>,
    /// Fastest (minimum) pace
    pub best_pace: Option<f64>,
    /// Mean of known average heart rates
    pub avg_heart_rate: Option<f64>,
    /// Exponentially decayed distance, weighted by age relative to the row
    pub load: f64,
    /// Sum of known elevation gains (m)
    pub elevation_gain: f64,
}

/// One row of the feature table: a canonical record plus rolling windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub athlete_id: u64,
    pub record: CanonicalRecord,
    pub windows: Vec<WindowFeatures>,
    /// Gap to the previous run in days; None for the first run
    pub days_since_last_run: Option<f64>,
}

impl FeatureRow {
    /// Document key: one row per athlete and activity.
    pub fn key(&self) -> String {
        format!("{}_{}", self.athlete_id, self.record.activity_id)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }

    /// Look up the aggregates for a configured window length.
    pub fn window(&self, days: u32) -> Option<&WindowFeatures> {
        self.windows.iter().find(|w| w.window_days == days)
    }
}

/// Summary of all runs in a lookback horizon ending at a query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointInTimeFeatures {
    // ─── Volume ──────────────────────────────────────────────────
    pub total_distance: f64,
    pub avg_weekly_distance: f64,
    pub num_runs: usize,
    pub max_distance: f64,

    // ─── Pace ────────────────────────────────────────────────────
    pub avg_pace: Option<f64>,
    pub best_pace: Option<f64>,
    pub pace_std: Option<f64>,

    // ─── Recent load (taken from the last row's rolling windows) ─
    pub recent_7d_distance: Option<f64>,
    pub recent_30d_distance: Option<f64>,
    pub recent_7d_load: Option<f64>,
    pub recent_30d_load: Option<f64>,

    // ─── Intensity ───────────────────────────────────────────────
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub avg_hr_reserve_used: Option<f64>,

    // ─── Elevation ───────────────────────────────────────────────
    pub total_elevation: f64,
    pub avg_elevation_per_km: Option<f64>,

    // ─── Consistency ─────────────────────────────────────────────
    pub avg_days_between_runs: Option<f64>,
    pub longest_break: Option<f64>,
    pub days_in_training: i64,
}

/// A historical run close to a target race distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceRelevantRun {
    pub activity_id: u64,
    pub timestamp: DateTime<Utc>,
    pub distance_km: f64,
    pub pace_min_per_km: Option<f64>,
    /// Pace relative to the 30-day average pace (< 1 is faster than usual)
    pub relative_performance: Option<f64>,
}
