// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only API over ingestion status and the feature table.

use crate::error::{AppError, Result};
use crate::features::units::{estimate_race_time, RaceEstimate};
use crate::features::{DEFAULT_LOOKBACK_DAYS, DEFAULT_RACE_TOLERANCE};
use crate::models::{AthleteStats, PointInTimeFeatures, ProcessingState, RaceRelevantRun};
use crate::services::feature_table;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_LOOKBACK_DAYS: u32 = 3650;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/athletes/{athlete_id}/status", get(get_status))
        .route("/api/athletes/{athlete_id}/features", get(get_features))
        .route("/api/athletes/{athlete_id}/races", get(get_races))
}

// ─── Status ──────────────────────────────────────────────────

/// Ingestion status without the tokens.
#[derive(Serialize)]
pub struct StatusResponse {
    pub athlete_id: u64,
    pub status: ProcessingState,
    pub registered_at: String,
    pub updated_at: String,
    pub stats: Option<AthleteStats>,
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
) -> Result<Json<StatusResponse>> {
    let status = state
        .store
        .get_status(athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("athlete {}", athlete_id)))?;
    let stats = state.store.get_athlete_stats(athlete_id).await?;

    Ok(Json(StatusResponse {
        athlete_id,
        status: status.status,
        registered_at: format_utc_rfc3339(status.registered_at),
        updated_at: format_utc_rfc3339(status.updated_at),
        stats,
    }))
}

// ─── Point-in-time features ──────────────────────────────────

#[derive(Deserialize)]
struct FeaturesQuery {
    /// Query time (RFC3339); defaults to now
    at: Option<String>,
    #[serde(default = "default_lookback_days")]
    lookback_days: u32,
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

#[derive(Serialize)]
pub struct FeaturesResponse {
    pub athlete_id: u64,
    pub at: String,
    pub lookback_days: u32,
    /// Null when no runs fall in the horizon
    pub features: Option<PointInTimeFeatures>,
}

async fn get_features(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
    Query(params): Query<FeaturesQuery>,
) -> Result<Json<FeaturesResponse>> {
    if !(1..=MAX_LOOKBACK_DAYS).contains(&params.lookback_days) {
        return Err(AppError::BadRequest(format!(
            "lookback_days must be between 1 and {}",
            MAX_LOOKBACK_DAYS
        )));
    }

    let at = match params.at.as_deref() {
        Some(raw) => parse_utc_rfc3339(raw).ok_or_else(|| {
            AppError::BadRequest("Invalid 'at' parameter: must be RFC3339 datetime".to_string())
        })?,
        None => Utc::now(),
    };

    let features =
        feature_table::point_in_time(state.store.as_ref(), athlete_id, at, params.lookback_days)
            .await?;

    Ok(Json(FeaturesResponse {
        athlete_id,
        at: format_utc_rfc3339(at),
        lookback_days: params.lookback_days,
        features,
    }))
}

// ─── Race history ────────────────────────────────────────────

#[derive(Deserialize)]
struct RacesQuery {
    distance_km: f64,
    /// Fraction of `distance_km` either side
    #[serde(default = "default_tolerance")]
    tolerance: f64,
    /// Base fitness score in [0, 1]
    #[serde(default = "default_fitness")]
    fitness: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_RACE_TOLERANCE
}
fn default_fitness() -> f64 {
    0.5
}

#[derive(Serialize)]
pub struct RacesResponse {
    pub athlete_id: u64,
    pub distance_km: f64,
    pub runs: Vec<RaceRelevantRun>,
    /// Riegel estimate from the last 90 days; null without a known pace
    pub estimate: Option<RaceEstimate>,
}

async fn get_races(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
    Query(params): Query<RacesQuery>,
) -> Result<Json<RacesResponse>> {
    if !(params.distance_km.is_finite() && params.distance_km > 0.0) {
        return Err(AppError::BadRequest("distance_km must be positive".to_string()));
    }
    if !(0.0..1.0).contains(&params.tolerance) {
        return Err(AppError::BadRequest(
            "tolerance must be at least 0 and below 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&params.fitness) {
        return Err(AppError::BadRequest("fitness must be between 0 and 1".to_string()));
    }

    let runs = feature_table::race_history(
        state.store.as_ref(),
        athlete_id,
        params.distance_km,
        params.tolerance,
    )
    .await?;

    let recent = feature_table::point_in_time(
        state.store.as_ref(),
        athlete_id,
        Utc::now(),
        DEFAULT_LOOKBACK_DAYS,
    )
    .await?;
    let estimate = recent.and_then(|f| {
        f.avg_pace.map(|pace| {
            estimate_race_time(pace, params.distance_km, f.avg_weekly_distance, params.fitness)
        })
    });

    Ok(Json(RacesResponse {
        athlete_id,
        distance_km: params.distance_km,
        runs,
        estimate,
    }))
}
