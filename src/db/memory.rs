// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process record store for tests and local runs.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::db::{sort_feature_rows, sort_statuses, RecordStore, BUDGET_DOC_ID};
use crate::error::Result;
use crate::models::{
    AthleteMetadata, AthleteStats, DailyBudget, FeatureRow, IngestionStatus, ProcessingState,
    RawActivity,
};

/// DashMap-backed store. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    statuses: DashMap<u64, IngestionStatus>,
    budget: DashMap<&'static str, DailyBudget>,
    activities: DashMap<u64, RawActivity>,
    feature_rows: DashMap<u64, Vec<FeatureRow>>,
    stats: DashMap<u64, AthleteStats>,
    metadata: DashMap<u64, AthleteMetadata>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored activities across all athletes.
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_statuses(&self) -> Result<Vec<IngestionStatus>> {
        let mut statuses: Vec<IngestionStatus> =
            self.statuses.iter().map(|e| e.value().clone()).collect();
        sort_statuses(&mut statuses);
        Ok(statuses)
    }

    async fn get_status(&self, athlete_id: u64) -> Result<Option<IngestionStatus>> {
        Ok(self.statuses.get(&athlete_id).map(|e| e.value().clone()))
    }

    async fn set_status(&self, status: &IngestionStatus) -> Result<()> {
        self.statuses.insert(status.athlete_id, status.clone());
        Ok(())
    }

    async fn transition_status(
        &self,
        athlete_id: u64,
        from: ProcessingState,
        to: ProcessingState,
    ) -> Result<Option<IngestionStatus>> {
        // The entry guard holds the shard lock across check and write.
        let Some(mut entry) = self.statuses.get_mut(&athlete_id) else {
            return Ok(None);
        };
        if entry.status != from {
            return Ok(None);
        }
        entry.status = to;
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn update_tokens(
        &self,
        athlete_id: u64,
        bearer_token: &str,
        refresh_token: &str,
    ) -> Result<Option<IngestionStatus>> {
        let Some(mut entry) = self.statuses.get_mut(&athlete_id) else {
            return Ok(None);
        };
        entry.bearer_token = bearer_token.to_string();
        entry.refresh_token = refresh_token.to_string();
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn get_budget(&self) -> Result<DailyBudget> {
        Ok(self
            .budget
            .get(BUDGET_DOC_ID)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn set_budget(&self, budget: &DailyBudget) -> Result<()> {
        self.budget.insert(BUDGET_DOC_ID, budget.clone());
        Ok(())
    }

    async fn add_budget_calls(&self, calls: u64) -> Result<DailyBudget> {
        let mut entry = self.budget.entry(BUDGET_DOC_ID).or_default();
        entry.consumed += calls;
        entry.updated_at = Some(Utc::now());
        Ok(entry.clone())
    }

    async fn get_activity_ids(&self, athlete_id: u64) -> Result<HashSet<u64>> {
        Ok(self
            .activities
            .iter()
            .filter(|e| e.value().athlete_id == athlete_id)
            .map(|e| *e.key())
            .collect())
    }

    async fn insert_activity(&self, activity: &RawActivity) -> Result<()> {
        self.activities.insert(activity.id, activity.clone());
        Ok(())
    }

    async fn get_activities(&self, athlete_id: u64) -> Result<Vec<RawActivity>> {
        Ok(self
            .activities
            .iter()
            .filter(|e| e.value().athlete_id == athlete_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn replace_feature_rows(&self, athlete_id: u64, rows: &[FeatureRow]) -> Result<()> {
        self.feature_rows.insert(athlete_id, rows.to_vec());
        Ok(())
    }

    async fn get_feature_rows(&self, athlete_id: u64) -> Result<Vec<FeatureRow>> {
        let mut rows = self
            .feature_rows
            .get(&athlete_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        sort_feature_rows(&mut rows);
        Ok(rows)
    }

    async fn set_athlete_stats(&self, stats: &AthleteStats) -> Result<()> {
        self.stats.insert(stats.athlete_id, stats.clone());
        Ok(())
    }

    async fn get_athlete_stats(&self, athlete_id: u64) -> Result<Option<AthleteStats>> {
        Ok(self.stats.get(&athlete_id).map(|e| e.value().clone()))
    }

    async fn set_athlete_metadata(&self, metadata: &AthleteMetadata) -> Result<()> {
        self.metadata.insert(metadata.athlete_id, metadata.clone());
        Ok(())
    }

    async fn get_athlete_metadata(&self, athlete_id: u64) -> Result<Option<AthleteMetadata>> {
        Ok(self.metadata.get(&athlete_id).map(|e| e.value().clone()))
    }

    async fn delete_athlete_data(&self, athlete_id: u64) -> Result<usize> {
        let before = self.activities.len();
        self.activities.retain(|_, a| a.athlete_id != athlete_id);
        let mut deleted = before - self.activities.len();

        deleted += self
            .feature_rows
            .remove(&athlete_id)
            .map(|(_, rows)| rows.len())
            .unwrap_or(0);
        deleted += usize::from(self.stats.remove(&athlete_id).is_some());
        deleted += usize::from(self.metadata.remove(&athlete_id).is_some());
        deleted += usize::from(self.statuses.remove(&athlete_id).is_some());
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_empty_store_reads_as_empty() {
        let store = MemoryStore::new();
        assert!(store.list_statuses().await.unwrap().is_empty());
        assert_eq!(store.get_budget().await.unwrap().consumed, 0);
        assert!(store.get_activity_ids(1).await.unwrap().is_empty());
        assert!(store.get_feature_rows(1).await.unwrap().is_empty());
        assert!(store.get_athlete_stats(1).await.unwrap().is_none());
        assert!(store.get_athlete_metadata(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_statuses_in_registration_order() {
        let store = MemoryStore::new();
        let mut late = IngestionStatus::new(1, "a".into(), "r".into());
        late.registered_at = Utc::now() + Duration::minutes(5);
        store.set_status(&late).await.unwrap();
        store
            .set_status(&IngestionStatus::new(2, "b".into(), "r".into()))
            .await
            .unwrap();

        let ids: Vec<u64> = store
            .list_statuses()
            .await
            .unwrap()
            .iter()
            .map(|s| s.athlete_id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_budget_roundtrip() {
        let store = MemoryStore::new();
        let budget = DailyBudget {
            consumed: 42,
            updated_at: Some(Utc::now()),
        };
        store.set_budget(&budget).await.unwrap();
        assert_eq!(store.get_budget().await.unwrap(), budget);

        assert_eq!(store.add_budget_calls(8).await.unwrap().consumed, 50);
        assert_eq!(store.get_budget().await.unwrap().consumed, 50);
    }

    #[tokio::test]
    async fn test_transition_requires_expected_state() {
        let store = MemoryStore::new();
        assert!(store
            .transition_status(1, ProcessingState::None, ProcessingState::Processing)
            .await
            .unwrap()
            .is_none());

        store
            .set_status(&IngestionStatus::new(1, "a".into(), "r".into()))
            .await
            .unwrap();

        let claimed = store
            .transition_status(1, ProcessingState::None, ProcessingState::Processing)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.status, ProcessingState::Processing);

        // A second claim from the same starting state loses.
        assert!(store
            .transition_status(1, ProcessingState::None, ProcessingState::Processing)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.get_status(1).await.unwrap().unwrap().status,
            ProcessingState::Processing
        );
    }

    #[tokio::test]
    async fn test_update_tokens_keeps_state() {
        let store = MemoryStore::new();
        assert!(store.update_tokens(1, "a", "r").await.unwrap().is_none());

        let status = IngestionStatus::new(1, "a".into(), "r".into())
            .with_state(ProcessingState::Processing);
        store.set_status(&status).await.unwrap();

        let updated = store.update_tokens(1, "a2", "r2").await.unwrap().unwrap();
        assert_eq!(updated.status, ProcessingState::Processing);
        assert_eq!(updated.bearer_token, "a2");
        assert_eq!(updated.registered_at, status.registered_at);
    }
}
