// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental activity ingestion.
//!
//! Each athlete moves `none → processing → processed`, or back to `none`
//! when a cycle fails or more pages remain. Activities already stored are
//! never fetched again, so a restarted cycle only pays for new records.
//!
//! Athletes are processed one at a time and only one batch runs per
//! service. Every state move is a compare-and-set on the stored status, so
//! a second instance sharing the store never processes the same athlete
//! and never overwrites tokens refreshed mid-cycle. Every remote call is
//! checked against the shared daily budget before it is issued and bounded
//! by a timeout.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{FeatureConfig, IngestConfig};
use crate::db::RecordStore;
use crate::error::{AppError, Result};
use crate::models::{AthleteMetadata, AthleteStats, IngestionStatus, ProcessingState, RawActivity};
use crate::services::budget::{BudgetTracker, CallPacer};
use crate::services::feature_table::rebuild_feature_table;
use crate::services::strava::ActivitySource;

/// Why an athlete's cycle did not run to completion without being a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The athlete's complete history is shorter than the minimum.
    TooFewActivities { found: usize, minimum: usize },
    /// The shared budget was exhausted before the cycle started.
    LimitExceeded { consumed: u64, cap: u64 },
    /// The athlete left state `none` after the batch listed it.
    NotEligible,
}

/// What one successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub athlete_id: u64,
    /// New activity IDs discovered while paging
    pub discovered: usize,
    /// Activities fetched and stored this cycle
    pub fetched: usize,
    /// More unfetched activities remain; the athlete stays eligible
    pub has_more: bool,
    pub feature_rows: usize,
}

/// Result of one athlete cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Success(CycleReport),
    Rejected(RejectReason),
    Failed(AppError),
}

#[derive(Debug, Clone, Serialize)]
pub struct AthleteFailure {
    pub athlete_id: u64,
    pub error: String,
}

/// Totals for one batch invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Athletes in state `none` when the batch started
    pub athletes_considered: usize,
    pub processed: usize,
    pub rejected: usize,
    /// Skipped because the budget ran out or another batch claimed them
    pub skipped: usize,
    pub failed: usize,
    pub activities_fetched: usize,
    pub calls_made: u64,
    pub remaining_budget: u64,
    pub elapsed_ms: u64,
    pub failures: Vec<AthleteFailure>,
}

/// Result of a batch invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// The shared budget was already past the cap; nothing was touched.
    LimitExceeded { consumed: u64, cap: u64 },
    /// Another batch on this service is still running; nothing was touched.
    AlreadyRunning,
    Completed(BatchSummary),
}

/// Successful end of the fetch phase.
enum FetchResult {
    Done(CycleReport),
    TooFew { found: usize },
}

/// Drives ingestion cycles against a record store and activity source.
///
/// Clones share the batch guard.
#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn ActivitySource>,
    ingest: IngestConfig,
    features: FeatureConfig,
    batch_lock: Arc<Mutex<()>>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn ActivitySource>,
        ingest: IngestConfig,
        features: FeatureConfig,
    ) -> Self {
        Self {
            store,
            source,
            ingest,
            features,
            batch_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Process every athlete in state `none`, in registration order.
    ///
    /// Returns `AlreadyRunning` when a batch is in flight, and
    /// `LimitExceeded` without touching any status when the shared counter
    /// is already past the cap. Otherwise one athlete's failure never stops
    /// the others.
    pub async fn run_batch(&self) -> Result<BatchOutcome> {
        let Ok(_running) = self.batch_lock.try_lock() else {
            tracing::warn!("ingestion batch already running, skipping");
            return Ok(BatchOutcome::AlreadyRunning);
        };

        let started = Instant::now();
        let mut budget = BudgetTracker::load(self.store.as_ref(), self.ingest.daily_call_cap).await?;

        if budget.is_exceeded() {
            tracing::warn!(
                consumed = budget.consumed(),
                cap = budget.cap(),
                "api limit exceeded, skipping batch"
            );
            return Ok(BatchOutcome::LimitExceeded {
                consumed: budget.consumed(),
                cap: budget.cap(),
            });
        }

        let statuses = self.store.list_statuses().await?;
        let mut summary = BatchSummary::default();

        for status in statuses
            .iter()
            .filter(|s| s.status == ProcessingState::None)
        {
            summary.athletes_considered += 1;

            match self.run_cycle(status, &mut budget).await {
                CycleOutcome::Success(report) => {
                    summary.processed += 1;
                    summary.activities_fetched += report.fetched;
                }
                CycleOutcome::Rejected(
                    RejectReason::LimitExceeded { .. } | RejectReason::NotEligible,
                ) => {
                    summary.skipped += 1;
                }
                CycleOutcome::Rejected(RejectReason::TooFewActivities { .. }) => {
                    summary.rejected += 1;
                }
                CycleOutcome::Failed(e) => {
                    summary.failed += 1;
                    summary.failures.push(AthleteFailure {
                        athlete_id: status.athlete_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        budget.persist(self.store.as_ref()).await?;

        summary.calls_made = budget.issued();
        summary.remaining_budget = budget.remaining();
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            considered = summary.athletes_considered,
            processed = summary.processed,
            rejected = summary.rejected,
            skipped = summary.skipped,
            failed = summary.failed,
            fetched = summary.activities_fetched,
            calls = summary.calls_made,
            remaining = summary.remaining_budget,
            elapsed_ms = summary.elapsed_ms,
            "Ingestion batch complete"
        );

        Ok(BatchOutcome::Completed(summary))
    }

    /// Run one athlete's cycle.
    ///
    /// `status` names the athlete; its tokens are re-read when the athlete
    /// is claimed. Failures roll the athlete back to `none` and add the
    /// calls made to the budget; activities stored before the failure stay
    /// stored.
    pub async fn run_cycle(
        &self,
        status: &IngestionStatus,
        budget: &mut BudgetTracker,
    ) -> CycleOutcome {
        let athlete_id = status.athlete_id;

        if budget.remaining() == 0 {
            tracing::info!(
                athlete_id,
                consumed = budget.consumed(),
                "api limit reached, skipping athlete"
            );
            return CycleOutcome::Rejected(RejectReason::LimitExceeded {
                consumed: budget.consumed(),
                cap: budget.cap(),
            });
        }

        let claimed = match self
            .store
            .transition_status(athlete_id, ProcessingState::None, ProcessingState::Processing)
            .await
        {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                tracing::info!(athlete_id, "athlete no longer eligible, skipping");
                return CycleOutcome::Rejected(RejectReason::NotEligible);
            }
            Err(e) => {
                tracing::error!(athlete_id, error = %e, "Failed to claim athlete");
                return CycleOutcome::Failed(e);
            }
        };

        let result = match self.fetch(&claimed, budget).await {
            Ok(fetched) => self.finish(athlete_id, budget, fetched).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.rollback(athlete_id, budget, &e).await;
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Issue one remote call: budget check, count, then a bounded wait.
    async fn call<T, F>(&self, budget: &mut BudgetTracker, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        budget.ensure_capacity()?;
        budget.record_call();

        tokio::time::timeout(self.ingest.call_timeout, request)
            .await
            .map_err(|_| {
                AppError::Transport(format!(
                    "remote call timed out after {}s",
                    self.ingest.call_timeout.as_secs_f64()
                ))
            })?
    }

    async fn fetch(&self, status: &IngestionStatus, budget: &mut BudgetTracker) -> Result<FetchResult> {
        let athlete_id = status.athlete_id;
        let token = status.bearer_token.as_str();
        let cap = self.ingest.max_new_per_cycle;
        let per_page = self.ingest.per_page;

        // 1. Dedup set
        let known = self.store.get_activity_ids(athlete_id).await?;

        // 2. Profile and heart-rate zones
        let profile = self.call(budget, self.source.get_athlete(token)).await?;
        let zones = self.call(budget, self.source.get_zones(token)).await?;
        self.store
            .set_athlete_metadata(&AthleteMetadata::from_strava(
                athlete_id,
                profile,
                zones,
                Utc::now(),
            ))
            .await?;

        // 3. Athlete totals
        let stats = self.call(budget, self.source.get_stats(token, athlete_id)).await?;
        self.store
            .set_athlete_stats(&AthleteStats::from_strava(athlete_id, stats, Utc::now()))
            .await?;

        // 4. Page through summaries until the end or the per-cycle cap
        let mut new_ids: Vec<u64> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut listed = 0;
        let mut reached_end = false;
        let mut page = 1;

        loop {
            let summaries = self
                .call(budget, self.source.list_activities(token, page, per_page))
                .await?;
            listed += summaries.len();

            // A short page is the end of the history.
            if summaries.len() < per_page as usize && listed < self.ingest.min_activities {
                return Ok(FetchResult::TooFew { found: listed });
            }

            if summaries.is_empty() {
                reached_end = true;
                break;
            }

            for summary in &summaries {
                if !known.contains(&summary.id) && seen.insert(summary.id) {
                    new_ids.push(summary.id);
                }
            }

            tracing::debug!(
                athlete_id,
                page,
                listed = summaries.len(),
                new = new_ids.len(),
                "Listed activity page"
            );

            if new_ids.len() >= cap {
                break;
            }
            page += 1;
        }

        // 5. Fetch and store details, each commit independent
        let mut pacer = CallPacer::new(self.ingest.call_interval);
        let mut fetched = 0;

        for &activity_id in new_ids.iter().take(cap) {
            pacer.wait().await;
            let detail = self
                .call(budget, self.source.get_activity(token, activity_id))
                .await?;
            let activity = RawActivity::from_strava(athlete_id, detail, Utc::now());
            self.store.insert_activity(&activity).await?;
            fetched += 1;

            tracing::debug!(
                athlete_id,
                activity_id,
                consumed = budget.consumed(),
                "Stored activity"
            );
        }

        // 6. Derived table
        let feature_rows =
            rebuild_feature_table(self.store.as_ref(), athlete_id, &self.features).await?;

        Ok(FetchResult::Done(CycleReport {
            athlete_id,
            discovered: new_ids.len(),
            fetched,
            has_more: new_ids.len() > cap || !reached_end,
            feature_rows,
        }))
    }

    /// Record the end state of a cycle that did not fail.
    async fn finish(
        &self,
        athlete_id: u64,
        budget: &mut BudgetTracker,
        fetched: FetchResult,
    ) -> Result<CycleOutcome> {
        let (next, outcome) = match fetched {
            FetchResult::TooFew { found } => {
                let minimum = self.ingest.min_activities;
                tracing::info!(athlete_id, found, minimum, "athlete rejected - too few activities");
                (
                    ProcessingState::None,
                    CycleOutcome::Rejected(RejectReason::TooFewActivities { found, minimum }),
                )
            }
            FetchResult::Done(report) => {
                tracing::info!(
                    athlete_id,
                    discovered = report.discovered,
                    fetched = report.fetched,
                    has_more = report.has_more,
                    feature_rows = report.feature_rows,
                    consumed = budget.consumed(),
                    "Ingestion cycle complete"
                );
                let next = if report.has_more {
                    ProcessingState::None
                } else {
                    ProcessingState::Processed
                };
                (next, CycleOutcome::Success(report))
            }
        };

        budget.persist(self.store.as_ref()).await?;
        self.release(athlete_id, next).await?;
        Ok(outcome)
    }

    async fn rollback(&self, athlete_id: u64, budget: &mut BudgetTracker, error: &AppError) {
        tracing::error!(
            athlete_id,
            error = %error,
            consumed = budget.consumed(),
            "Ingestion cycle failed, rolling back"
        );

        if let Err(e) = budget.persist(self.store.as_ref()).await {
            tracing::warn!(athlete_id, error = %e, "Failed to persist budget during rollback");
        }
        if let Err(e) = self.release(athlete_id, ProcessingState::None).await {
            tracing::warn!(athlete_id, error = %e, "Failed to reset status during rollback");
        }
    }

    /// Move a claimed athlete out of `processing`. Leaves the status alone
    /// if something else (a reset or a deletion) moved it mid-cycle.
    async fn release(&self, athlete_id: u64, next: ProcessingState) -> Result<()> {
        let moved = self
            .store
            .transition_status(athlete_id, ProcessingState::Processing, next)
            .await?;
        if moved.is_none() {
            tracing::warn!(athlete_id, next = %next, "status changed during cycle, not overwriting");
        }
        Ok(())
    }
}

/// Create or refresh an athlete's status on authorization.
///
/// New athletes start at `none`. Existing athletes get the new tokens and
/// keep their state and registration time.
pub async fn register_athlete(
    store: &dyn RecordStore,
    athlete_id: u64,
    bearer_token: String,
    refresh_token: String,
) -> Result<IngestionStatus> {
    if let Some(existing) = store
        .update_tokens(athlete_id, &bearer_token, &refresh_token)
        .await?
    {
        return Ok(existing);
    }

    tracing::info!(athlete_id, "Registering new athlete");
    let status = IngestionStatus::new(athlete_id, bearer_token, refresh_token);
    store.set_status(&status).await?;
    Ok(status)
}

/// Move every athlete back to `none`. Returns how many changed.
pub async fn reset_processing(store: &dyn RecordStore) -> Result<usize> {
    let mut reset = 0;
    for status in store.list_statuses().await? {
        if status.status != ProcessingState::None
            && store
                .transition_status(status.athlete_id, status.status, ProcessingState::None)
                .await?
                .is_some()
        {
            reset += 1;
        }
    }

    tracing::info!(reset, "Reset processing state");
    Ok(reset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_register_keeps_state_and_order() {
        let store = MemoryStore::new();
        let first = register_athlete(&store, 5, "a1".into(), "r1".into())
            .await
            .unwrap();
        assert_eq!(first.status, ProcessingState::None);

        store
            .set_status(&first.with_state(ProcessingState::Processed))
            .await
            .unwrap();

        let again = register_athlete(&store, 5, "a2".into(), "r2".into())
            .await
            .unwrap();
        assert_eq!(again.status, ProcessingState::Processed);
        assert_eq!(again.bearer_token, "a2");
        assert_eq!(again.registered_at, first.registered_at);
    }

    #[tokio::test]
    async fn test_reset_processing() {
        let store = MemoryStore::new();
        for (id, state) in [
            (1, ProcessingState::Processed),
            (2, ProcessingState::Processing),
            (3, ProcessingState::None),
        ] {
            let status = IngestionStatus::new(id, "a".into(), "r".into()).with_state(state);
            store.set_status(&status).await.unwrap();
        }

        assert_eq!(reset_processing(&store).await.unwrap(), 2);
        for status in store.list_statuses().await.unwrap() {
            assert_eq!(status.status, ProcessingState::None);
        }
    }

    #[test]
    fn test_outcomes_serialize_with_tags() {
        let json = serde_json::to_value(BatchOutcome::AlreadyRunning).unwrap();
        assert_eq!(json, serde_json::json!({"status": "already_running"}));

        let json = serde_json::to_value(RejectReason::NotEligible).unwrap();
        assert_eq!(json, serde_json::json!({"reason": "not_eligible"}));
    }
}
