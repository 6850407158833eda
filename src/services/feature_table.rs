// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored activities → stored feature table, and queries over it.

use chrono::{DateTime, Utc};

use crate::config::FeatureConfig;
use crate::db::RecordStore;
use crate::error::Result;
use crate::features::{compute_rolling, extract, normalize_all, race_relevant_runs, HeartRateBounds};
use crate::models::{PointInTimeFeatures, RaceRelevantRun};

/// Recompute an athlete's feature table from every stored activity.
///
/// Heart-rate reserve uses the athlete's zones when stored. Returns the
/// number of rows written.
pub async fn rebuild_feature_table(
    store: &dyn RecordStore,
    athlete_id: u64,
    config: &FeatureConfig,
) -> Result<usize> {
    let activities = store.get_activities(athlete_id).await?;
    let metadata = store.get_athlete_metadata(athlete_id).await?;
    let bounds = HeartRateBounds::for_athlete(config, metadata.as_ref());
    let records = normalize_all(&activities, bounds);
    let rows = compute_rolling(athlete_id, &records, &config.windows);

    store.replace_feature_rows(athlete_id, &rows).await?;

    tracing::info!(
        athlete_id,
        activities = activities.len(),
        rows = rows.len(),
        hr_max = bounds.max,
        "Feature table rebuilt"
    );
    Ok(rows.len())
}

/// Point-in-time features for `(at − lookback_days, at]`, or None if the
/// athlete has no runs in that horizon.
pub async fn point_in_time(
    store: &dyn RecordStore,
    athlete_id: u64,
    at: DateTime<Utc>,
    lookback_days: u32,
) -> Result<Option<PointInTimeFeatures>> {
    let rows = store.get_feature_rows(athlete_id).await?;
    Ok(extract(&rows, at, lookback_days))
}

/// Stored runs within a fractional `tolerance` of a race distance,
/// fastest first.
pub async fn race_history(
    store: &dyn RecordStore,
    athlete_id: u64,
    target_km: f64,
    tolerance: f64,
) -> Result<Vec<RaceRelevantRun>> {
    let rows = store.get_feature_rows(athlete_id).await?;
    Ok(race_relevant_runs(&rows, target_km, tolerance))
}
