// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled token refresh for athletes waiting to be ingested.

use serde::Serialize;

use crate::db::RecordStore;
use crate::error::Result;
use crate::models::ProcessingState;
use crate::services::strava::TokenProvider;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
}

/// Refresh the token pair of every athlete in state `none`.
///
/// A failed refresh is logged and counted; the athlete keeps its old
/// tokens and the cycle moves on. Only the token fields are written, so a
/// batch that claims the athlete meanwhile keeps its state.
pub async fn refresh_tokens(
    store: &dyn RecordStore,
    provider: &dyn TokenProvider,
) -> Result<RefreshSummary> {
    let mut summary = RefreshSummary::default();

    for status in store.list_statuses().await? {
        if status.status != ProcessingState::None {
            continue;
        }
        let athlete_id = status.athlete_id;

        let tokens = match provider.refresh_token(&status.refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(athlete_id, error = %e, "Token refresh failed");
                summary.failed += 1;
                continue;
            }
        };

        match store
            .update_tokens(athlete_id, &tokens.access_token, &tokens.refresh_token)
            .await?
        {
            Some(_) => summary.refreshed += 1,
            None => tracing::info!(athlete_id, "Athlete removed during token refresh"),
        }
    }

    tracing::info!(
        refreshed = summary.refreshed,
        failed = summary.failed,
        "Token refresh cycle complete"
    );
    Ok(summary)
}
