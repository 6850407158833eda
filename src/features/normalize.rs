// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw activity → canonical record.

use chrono::Datelike;

use crate::config::FeatureConfig;
use crate::features::units::{calculate_pace, pace_to_speed};
use crate::models::{AthleteMetadata, CanonicalRecord, RawActivity};

/// Scale from Strava's suffer score to training impulse.
pub const TRAINING_IMPULSE_SCALE: f64 = 1.3;

/// Resting and maximum heart rate used for heart-rate reserve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartRateBounds {
    pub rest: f64,
    pub max: f64,
}

impl Default for HeartRateBounds {
    fn default() -> Self {
        Self {
            rest: 51.0,
            max: 195.0,
        }
    }
}

impl From<&FeatureConfig> for HeartRateBounds {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            rest: config.hr_rest,
            max: config.hr_max,
        }
    }
}

impl HeartRateBounds {
    /// Configured bounds, with max taken from the athlete's zones when
    /// they imply one above the resting rate.
    pub fn for_athlete(config: &FeatureConfig, metadata: Option<&AthleteMetadata>) -> Self {
        let mut bounds = Self::from(config);
        if let Some(max) = metadata.and_then(AthleteMetadata::max_heart_rate) {
            if max > bounds.rest {
                bounds.max = max;
            }
        }
        bounds
    }

    /// Fraction of the rest-to-max range used at `heart_rate`.
    pub fn reserve_used(&self, heart_rate: f64) -> Option<f64> {
        let range = self.max - self.rest;
        (range > 0.0).then(|| (heart_rate - self.rest) / range)
    }
}

/// Why an activity did not produce a canonical record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Skip {
    #[error("not a running activity: {0}")]
    NotRunning(String),
}

/// Normalize one activity. Non-running activities are skipped, not errors.
pub fn normalize(raw: &RawActivity, bounds: HeartRateBounds) -> Result<CanonicalRecord, Skip> {
    if !raw.is_running() {
        return Err(Skip::NotRunning(raw.sport_type.clone()));
    }

    let distance_km = raw.distance_meters / 1000.0;
    let duration_minutes = raw.moving_time_secs as f64 / 60.0;
    // A zero-length run or zero moving time has no meaningful pace.
    let pace_min_per_km = calculate_pace(distance_km, duration_minutes).filter(|p| *p > 0.0);
    let speed_kmh = pace_min_per_km.map(pace_to_speed);

    let elevation_per_km = raw
        .total_elevation_gain
        .filter(|_| distance_km > 0.0)
        .map(|gain| gain / distance_km);

    // Windows run on UTC; calendar fields follow the athlete's clock.
    let local = raw.local_start();
    Ok(CanonicalRecord {
        activity_id: raw.id,
        timestamp: raw.start_date,
        day_of_week: local.weekday().num_days_from_monday(),
        month: local.month(),
        year: local.year(),
        distance_km,
        duration_minutes,
        pace_min_per_km,
        speed_kmh,
        avg_heart_rate: raw.average_heartrate,
        max_heart_rate: raw.max_heartrate,
        heart_rate_reserve_used: raw
            .average_heartrate
            .and_then(|hr| bounds.reserve_used(hr)),
        training_impulse: raw.suffer_score().map(|s| s * TRAINING_IMPULSE_SCALE),
        elevation_gain: raw.total_elevation_gain,
        elevation_per_km,
    })
}

/// Normalize every running activity and sort by timestamp (ties by id).
pub fn normalize_all(raws: &[RawActivity], bounds: HeartRateBounds) -> Vec<CanonicalRecord> {
    let mut skipped = 0usize;
    let mut records: Vec<CanonicalRecord> = raws
        .iter()
        .filter_map(|raw| match normalize(raw, bounds) {
            Ok(record) => Some(record),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();

    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.activity_id.cmp(&b.activity_id))
    });

    tracing::debug!(
        records = records.len(),
        skipped,
        "Normalized activities"
    );
    records
}
