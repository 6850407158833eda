// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point-in-time feature vectors and race-relevant run selection.
//!
//! Unlike the rolling aggregates, a snapshot is computed on demand for an
//! arbitrary query time. Recent-load values are read from the last row's
//! precomputed windows instead of being recomputed.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

use crate::features::{max_known, mean_known, min_known};
use crate::models::{FeatureRow, PointInTimeFeatures, RaceRelevantRun};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 90;

/// Default race-distance tolerance, as a fraction of the target.
pub const DEFAULT_RACE_TOLERANCE: f64 = 0.1;

/// Summarize all rows in (at − lookback_days, at].
///
/// Returns None when no run falls in the horizon. `rows` must be sorted
/// ascending by timestamp, as stored.
pub fn extract(
    rows: &[FeatureRow],
    at: DateTime<Utc>,
    lookback_days: u32,
) -> Option<PointInTimeFeatures> {
    let cutoff = at - Duration::days(i64::from(lookback_days));
    let selected: Vec<&FeatureRow> = rows
        .iter()
        .filter(|row| row.timestamp() > cutoff && row.timestamp() <= at)
        .collect();

    let (first, last) = (*selected.first()?, *selected.last()?);

    let total_distance: f64 = selected.iter().map(|r| r.record.distance_km).sum();
    let max_distance = selected
        .iter()
        .map(|r| r.record.distance_km)
        .fold(0.0, f64::max);

    let paces: Vec<f64> = selected
        .iter()
        .filter_map(|r| r.record.pace_min_per_km)
        .collect();

    Some(PointInTimeFeatures {
        total_distance,
        avg_weekly_distance: total_distance * 7.0 / f64::from(lookback_days.max(1)),
        num_runs: selected.len(),
        max_distance,

        avg_pace: mean_known(paces.iter().copied().map(Some)),
        best_pace: min_known(paces.iter().copied().map(Some)),
        pace_std: sample_std_dev(&paces),

        recent_7d_distance: last.window(7).map(|w| w.distance_km),
        recent_30d_distance: last.window(30).map(|w| w.distance_km),
        recent_7d_load: last.window(7).map(|w| w.load),
        recent_30d_load: last.window(30).map(|w| w.load),

        avg_heart_rate: mean_known(selected.iter().map(|r| r.record.avg_heart_rate)),
        max_heart_rate: max_known(selected.iter().map(|r| r.record.max_heart_rate)),
        avg_hr_reserve_used: mean_known(
            selected.iter().map(|r| r.record.heart_rate_reserve_used),
        ),

        total_elevation: selected.iter().filter_map(|r| r.record.elevation_gain).sum(),
        avg_elevation_per_km: mean_known(selected.iter().map(|r| r.record.elevation_per_km)),

        // Gaps come from the stored rows, so the first selected run still
        // counts the break since the run before the horizon.
        avg_days_between_runs: mean_known(selected.iter().map(|r| r.days_since_last_run)),
        longest_break: max_known(selected.iter().map(|r| r.days_since_last_run)),
        days_in_training: (last.timestamp() - first.timestamp()).num_days(),
    })
}

fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Runs within `target_km * (1 ± tolerance)`, fastest first.
pub fn race_relevant_runs(
    rows: &[FeatureRow],
    target_km: f64,
    tolerance: f64,
) -> Vec<RaceRelevantRun> {
    let (low, high) = (target_km * (1.0 - tolerance), target_km * (1.0 + tolerance));
    let mut runs: Vec<RaceRelevantRun> = rows
        .iter()
        .filter(|row| (low..=high).contains(&row.record.distance_km))
        .map(|row| {
            let pace = row.record.pace_min_per_km;
            let baseline = row.window(30).and_then(|w| w.avg_pace);
            RaceRelevantRun {
                activity_id: row.record.activity_id,
                timestamp: row.timestamp(),
                distance_km: row.record.distance_km,
                pace_min_per_km: pace,
                relative_performance: pace.zip(baseline).map(|(p, b)| p / b),
            }
        })
        .collect();

    runs.sort_by(|a, b| match (a.pace_min_per_km, b.pace_min_per_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    runs
}
