// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-record trailing-window aggregates.
//!
//! The window for a record at time T covers every record with timestamp in
//! (T − W, T]. Records sharing T are all inside, whatever their index.

use chrono::Duration;

use crate::features::units::{decayed_load, DEFAULT_DECAY_DAYS};
use crate::features::{mean_known, min_known};
use crate::models::{CanonicalRecord, FeatureRow, WindowFeatures};
use crate::time_utils::days_between;

/// Compute one feature row per record.
///
/// `records` must be sorted by timestamp ascending.
pub fn compute_rolling(
    athlete_id: u64,
    records: &[CanonicalRecord],
    windows: &[u32],
) -> Vec<FeatureRow> {
    debug_assert!(
        records.windows(2).all(|p| p[0].timestamp <= p[1].timestamp),
        "records must be sorted by timestamp"
    );

    // Window bounds per configured length; both pointers only move forward.
    let mut bounds = vec![(0usize, 0usize); windows.len()];

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let now = record.timestamp;

            let window_features = windows
                .iter()
                .zip(bounds.iter_mut())
                .map(|(&days, (start, end))| {
                    let cutoff = now - Duration::days(i64::from(days));
                    while *start < records.len() && records[*start].timestamp <= cutoff {
                        *start += 1;
                    }
                    while *end < records.len() && records[*end].timestamp <= now {
                        *end += 1;
                    }
                    aggregate(days, &records[*start..*end], record)
                })
                .collect();

            let days_since_last_run = i
                .checked_sub(1)
                .map(|prev| days_between(records[prev].timestamp, now));

            FeatureRow {
                athlete_id,
                record: record.clone(),
                windows: window_features,
                days_since_last_run,
            }
        })
        .collect()
}

fn aggregate(window_days: u32, window: &[CanonicalRecord], anchor: &CanonicalRecord) -> WindowFeatures {
    let distances: Vec<f64> = window.iter().map(|r| r.distance_km).collect();
    let ages: Vec<f64> = window
        .iter()
        .map(|r| days_between(r.timestamp, anchor.timestamp))
        .collect();

    WindowFeatures {
        window_days,
        distance_km: distances.iter().sum(),
        runs: window.len() as u32,
        avg_pace: mean_known(window.iter().map(|r| r.pace_min_per_km)),
        best_pace: min_known(window.iter().map(|r| r.pace_min_per_km)),
        avg_heart_rate: mean_known(window.iter().map(|r| r.avg_heart_rate)),
        load: decayed_load(&distances, &ages, DEFAULT_DECAY_DAYS),
        elevation_gain: window.iter().filter_map(|r| r.elevation_gain).sum(),
    }
}
