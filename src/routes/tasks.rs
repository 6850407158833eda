// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for the scheduler.
//!
//! These endpoints are called by a scheduled job, not directly by users.
//! They are protected by the shared tasks token in `require_tasks_auth`.

use crate::error::Result;
use crate::services::ingest::{reset_processing, BatchOutcome};
use crate::services::tokens::{refresh_tokens, RefreshSummary};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Task handler routes (called by the scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/process-data", post(process_data))
        .route("/tasks/refresh-tokens", post(refresh))
        .route("/tasks/reset-processing", post(reset))
        .route("/tasks/delete-athlete/{athlete_id}", post(delete_athlete))
}

/// Run one ingestion batch over every eligible athlete. Answers
/// `already_running` while an earlier batch is still in flight.
async fn process_data(State(state): State<Arc<AppState>>) -> Result<Json<BatchOutcome>> {
    tracing::info!("Starting ingestion batch");
    let outcome = state.ingestion().run_batch().await?;
    Ok(Json(outcome))
}

async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshSummary>> {
    let summary = refresh_tokens(state.store.as_ref(), state.token_provider.as_ref()).await?;
    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub reset: usize,
}

/// Put every athlete back in line for the next batch.
async fn reset(State(state): State<Arc<AppState>>) -> Result<Json<ResetResponse>> {
    let reset = reset_processing(state.store.as_ref()).await?;
    Ok(Json(ResetResponse { reset }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub athlete_id: u64,
    pub deleted: usize,
}

/// Remove an athlete's status, activities, feature rows, stats and
/// metadata.
async fn delete_athlete(
    State(state): State<Arc<AppState>>,
    Path(athlete_id): Path<u64>,
) -> Result<Json<DeleteResponse>> {
    tracing::info!(athlete_id, "Deleting athlete data");
    let deleted = state.store.delete_athlete_data(athlete_id).await?;
    Ok(Json(DeleteResponse {
        athlete_id,
        deleted,
    }))
}
