// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-athlete ingestion status and the shared daily call budget.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ingestion state of one athlete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    /// Eligible for the next cycle
    None,
    /// A cycle is in flight
    Processing,
    /// Up to date as of the last cycle
    Processed,
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingState::None => "none",
            ProcessingState::Processing => "processing",
            ProcessingState::Processed => "processed",
        };
        f.write_str(s)
    }
}

/// Ingestion status document, one per athlete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionStatus {
    /// Strava athlete ID (also used as document ID)
    pub athlete_id: u64,
    pub status: ProcessingState,
    /// Current Strava access token
    pub bearer_token: String,
    /// Current Strava refresh token
    pub refresh_token: String,
    /// First authorization; defines batch iteration order
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestionStatus {
    /// New athlete, eligible for processing.
    pub fn new(athlete_id: u64, bearer_token: String, refresh_token: String) -> Self {
        let now = Utc::now();
        Self {
            athlete_id,
            status: ProcessingState::None,
            bearer_token,
            refresh_token,
            registered_at: now,
            updated_at: now,
        }
    }

    /// Copy of this status moved to `state`.
    pub fn with_state(&self, state: ProcessingState) -> Self {
        Self {
            status: state,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Process-wide count of remote calls since the last external reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBudget {
    #[serde(default)]
    pub consumed: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
