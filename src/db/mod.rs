// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Ingestion and the HTTP layer talk to a [`RecordStore`]; Firestore backs
//! it in production and [`MemoryStore`] in tests and local runs. Absent
//! documents read as empty or default so a fresh project bootstraps
//! without setup.
//!
//! Status moves, token updates and budget increments are read-modify-write
//! operations that each backend performs atomically, so concurrent
//! batches and token refreshes never overwrite each other's changes.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AthleteMetadata, AthleteStats, DailyBudget, FeatureRow, IngestionStatus, ProcessingState,
    RawActivity,
};

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

/// Collection names as constants.
pub mod collections {
    /// Ingestion status per athlete (keyed by athlete_id)
    pub const STATUSES: &str = "ingestion_status";
    /// Single document holding the shared call counter
    pub const DAILY_BUDGET: &str = "daily_budget";
    pub const ACTIVITIES: &str = "activities";
    /// Feature table rows (keyed by {athlete_id}_{activity_id})
    pub const FEATURE_ROWS: &str = "feature_rows";
    /// Strava stats snapshot (keyed by athlete_id)
    pub const ATHLETE_STATS: &str = "athlete_stats";
    /// Profile and heart-rate zones (keyed by athlete_id)
    pub const ATHLETE_METADATA: &str = "athlete_metadata";
}

/// Document ID of the budget singleton.
pub const BUDGET_DOC_ID: &str = "global";

/// Typed table operations used by ingestion and the API.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ─── Ingestion status ────────────────────────────────────────

    /// All statuses in registration order (ties by athlete id).
    async fn list_statuses(&self) -> Result<Vec<IngestionStatus>>;

    async fn get_status(&self, athlete_id: u64) -> Result<Option<IngestionStatus>>;

    async fn set_status(&self, status: &IngestionStatus) -> Result<()>;

    /// Move an athlete from `from` to `to` if it is still in `from`.
    ///
    /// Returns the stored status after the move, or None when the athlete
    /// is missing or in another state.
    async fn transition_status(
        &self,
        athlete_id: u64,
        from: ProcessingState,
        to: ProcessingState,
    ) -> Result<Option<IngestionStatus>>;

    /// Replace an athlete's token pair, keeping its state. None when the
    /// athlete is not registered.
    async fn update_tokens(
        &self,
        athlete_id: u64,
        bearer_token: &str,
        refresh_token: &str,
    ) -> Result<Option<IngestionStatus>>;

    // ─── Daily budget ────────────────────────────────────────────

    /// Current counter; zero when never written.
    async fn get_budget(&self) -> Result<DailyBudget>;

    async fn set_budget(&self, budget: &DailyBudget) -> Result<()>;

    /// Add `calls` to the stored counter and return the new value.
    async fn add_budget_calls(&self, calls: u64) -> Result<DailyBudget>;

    // ─── Raw activities ──────────────────────────────────────────

    /// IDs of every stored activity for an athlete (the dedup set).
    async fn get_activity_ids(&self, athlete_id: u64) -> Result<HashSet<u64>>;

    /// Store one activity, keyed by its ID. Each call commits on its own.
    async fn insert_activity(&self, activity: &RawActivity) -> Result<()>;

    async fn get_activities(&self, athlete_id: u64) -> Result<Vec<RawActivity>>;

    // ─── Feature table ───────────────────────────────────────────

    /// Replace an athlete's feature rows with `rows`.
    async fn replace_feature_rows(&self, athlete_id: u64, rows: &[FeatureRow]) -> Result<()>;

    /// Feature rows sorted ascending by timestamp (ties by activity id).
    async fn get_feature_rows(&self, athlete_id: u64) -> Result<Vec<FeatureRow>>;

    // ─── Athlete stats ───────────────────────────────────────────

    async fn set_athlete_stats(&self, stats: &AthleteStats) -> Result<()>;

    async fn get_athlete_stats(&self, athlete_id: u64) -> Result<Option<AthleteStats>>;

    // ─── Athlete metadata ────────────────────────────────────────

    async fn set_athlete_metadata(&self, metadata: &AthleteMetadata) -> Result<()>;

    async fn get_athlete_metadata(&self, athlete_id: u64) -> Result<Option<AthleteMetadata>>;

    /// Delete everything stored for an athlete. Returns documents deleted.
    async fn delete_athlete_data(&self, athlete_id: u64) -> Result<usize>;
}

/// Registration order used by `list_statuses`.
pub(crate) fn sort_statuses(statuses: &mut [IngestionStatus]) {
    statuses.sort_by(|a, b| {
        a.registered_at
            .cmp(&b.registered_at)
            .then(a.athlete_id.cmp(&b.athlete_id))
    });
}

/// Storage order used by `get_feature_rows`.
pub(crate) fn sort_feature_rows(rows: &mut [FeatureRow]) {
    rows.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then(a.record.activity_id.cmp(&b.record.activity_id))
    });
}
