// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides the [`RecordStore`] operations for:
//! - Ingestion status (one document per athlete)
//! - Daily budget (singleton counter)
//! - Activities (raw Strava records)
//! - Feature rows (derived feature table)
//! - Athlete stats (Strava totals)
//! - Athlete metadata (profile and heart-rate zones)

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::db::{collections, sort_feature_rows, sort_statuses, RecordStore, BUDGET_DOC_ID};
use crate::error::AppError;
use crate::models::{
    AthleteMetadata, AthleteStats, DailyBudget, FeatureRow, IngestionStatus, ProcessingState,
    RawActivity,
};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Just the ID field of a stored activity.
#[derive(Deserialize)]
struct ActivityId {
    id: u64,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Feature rows currently stored for an athlete, unsorted.
    async fn query_feature_rows(&self, athlete_id: u64) -> Result<Vec<FeatureRow>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::FEATURE_ROWS)
            .filter(|q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = &self.client;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Helper to batch upsert feature rows using transactions.
    async fn batch_set_feature_rows(&self, rows: &[FeatureRow]) -> Result<(), AppError> {
        let client = &self.client;

        for chunk in rows.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for row in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::FEATURE_ROWS)
                    .document_id(row.key())
                    .object(row)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add feature row to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit feature rows: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl RecordStore for FirestoreDb {
    // ─── Ingestion Status Operations ─────────────────────────────

    async fn list_statuses(&self) -> Result<Vec<IngestionStatus>, AppError> {
        let mut statuses: Vec<IngestionStatus> = self
            .client
            .fluent()
            .select()
            .from(collections::STATUSES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sort_statuses(&mut statuses);
        Ok(statuses)
    }

    async fn get_status(&self, athlete_id: u64) -> Result<Option<IngestionStatus>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::STATUSES)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_status(&self, status: &IngestionStatus) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::STATUSES)
            .document_id(status.athlete_id.to_string())
            .object(status)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn transition_status(
        &self,
        athlete_id: u64,
        from: ProcessingState,
        to: ProcessingState,
    ) -> Result<Option<IngestionStatus>, AppError> {
        // Reads inside run_transaction register the document for conflict
        // detection; a concurrent writer forces a retry.
        self.client
            .run_transaction(|db, transaction| {
                Box::pin(async move {
                    let current: Option<IngestionStatus> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::STATUSES)
                        .obj()
                        .one(&athlete_id.to_string())
                        .await?;

                    let Some(current) = current.filter(|s| s.status == from) else {
                        return Ok(None);
                    };
                    let moved = current.with_state(to);

                    db.fluent()
                        .update()
                        .in_col(collections::STATUSES)
                        .document_id(athlete_id.to_string())
                        .object(&moved)
                        .add_to_transaction(transaction)?;

                    Ok(Some(moved))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Status transition failed: {}", e)))
    }

    async fn update_tokens(
        &self,
        athlete_id: u64,
        bearer_token: &str,
        refresh_token: &str,
    ) -> Result<Option<IngestionStatus>, AppError> {
        let bearer_token = bearer_token.to_string();
        let refresh_token = refresh_token.to_string();

        self.client
            .run_transaction(|db, transaction| {
                let bearer_token = bearer_token.clone();
                let refresh_token = refresh_token.clone();
                Box::pin(async move {
                    let current: Option<IngestionStatus> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::STATUSES)
                        .obj()
                        .one(&athlete_id.to_string())
                        .await?;

                    let Some(current) = current else {
                        return Ok(None);
                    };
                    let updated = IngestionStatus {
                        bearer_token,
                        refresh_token,
                        updated_at: chrono::Utc::now(),
                        ..current
                    };

                    db.fluent()
                        .update()
                        .fields(firestore::paths!(IngestionStatus::{
                            bearer_token,
                            refresh_token,
                            updated_at
                        }))
                        .in_col(collections::STATUSES)
                        .document_id(athlete_id.to_string())
                        .object(&updated)
                        .add_to_transaction(transaction)?;

                    Ok(Some(updated))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Token update failed: {}", e)))
    }

    // ─── Budget Operations ───────────────────────────────────────

    async fn get_budget(&self) -> Result<DailyBudget, AppError> {
        let budget: Option<DailyBudget> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::DAILY_BUDGET)
            .obj()
            .one(BUDGET_DOC_ID)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(budget.unwrap_or_default())
    }

    async fn set_budget(&self, budget: &DailyBudget) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::DAILY_BUDGET)
            .document_id(BUDGET_DOC_ID)
            .object(budget)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn add_budget_calls(&self, calls: u64) -> Result<DailyBudget, AppError> {
        self.client
            .run_transaction(|db, transaction| {
                Box::pin(async move {
                    let current: Option<DailyBudget> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::DAILY_BUDGET)
                        .obj()
                        .one(BUDGET_DOC_ID)
                        .await?;

                    let current = current.unwrap_or_default();
                    let budget = DailyBudget {
                        consumed: current.consumed + calls,
                        updated_at: Some(chrono::Utc::now()),
                    };

                    db.fluent()
                        .update()
                        .in_col(collections::DAILY_BUDGET)
                        .document_id(BUDGET_DOC_ID)
                        .object(&budget)
                        .add_to_transaction(transaction)?;

                    Ok(budget)
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Budget increment failed: {}", e)))
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity_ids(&self, athlete_id: u64) -> Result<HashSet<u64>, AppError> {
        let ids: Vec<ActivityId> = self
            .client
            .fluent()
            .select()
            .fields(firestore::paths!(ActivityId::{id}))
            .from(collections::ACTIVITIES)
            .filter(|q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(ids.into_iter().map(|a| a.id).collect())
    }

    async fn insert_activity(&self, activity: &RawActivity) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity.id.to_string())
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_activities(&self, athlete_id: u64) -> Result<Vec<RawActivity>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Feature Table Operations ────────────────────────────────

    /// Upserts the new rows first, then removes rows that are no longer
    /// present, so readers never observe an empty table mid-rebuild.
    async fn replace_feature_rows(
        &self,
        athlete_id: u64,
        rows: &[FeatureRow],
    ) -> Result<(), AppError> {
        let existing = self.query_feature_rows(athlete_id).await?;

        self.batch_set_feature_rows(rows).await?;

        let keep: HashSet<String> = rows.iter().map(FeatureRow::key).collect();
        let stale: Vec<FeatureRow> = existing
            .into_iter()
            .filter(|row| !keep.contains(&row.key()))
            .collect();
        self.batch_delete(&stale, collections::FEATURE_ROWS, FeatureRow::key)
            .await?;

        tracing::debug!(
            athlete_id,
            written = rows.len(),
            removed = stale.len(),
            "Replaced feature rows"
        );
        Ok(())
    }

    async fn get_feature_rows(&self, athlete_id: u64) -> Result<Vec<FeatureRow>, AppError> {
        let mut rows = self.query_feature_rows(athlete_id).await?;
        sort_feature_rows(&mut rows);
        Ok(rows)
    }

    // ─── Athlete Stats Operations ────────────────────────────────

    async fn set_athlete_stats(&self, stats: &AthleteStats) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ATHLETE_STATS)
            .document_id(stats.athlete_id.to_string())
            .object(stats)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_athlete_stats(&self, athlete_id: u64) -> Result<Option<AthleteStats>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::ATHLETE_STATS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Athlete Metadata Operations ─────────────────────────────

    async fn set_athlete_metadata(&self, metadata: &AthleteMetadata) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ATHLETE_METADATA)
            .document_id(metadata.athlete_id.to_string())
            .object(metadata)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_athlete_metadata(
        &self,
        athlete_id: u64,
    ) -> Result<Option<AthleteMetadata>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::ATHLETE_METADATA)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Athlete Data Deletion ───────────────────────────────────

    /// Deletes from all collections:
    /// - `feature_rows` (query by athlete_id)
    /// - `activities` (query by athlete_id)
    /// - `athlete_stats/{athlete_id}`
    /// - `athlete_metadata/{athlete_id}`
    /// - `ingestion_status/{athlete_id}`
    async fn delete_athlete_data(&self, athlete_id: u64) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Feature rows
        let rows = self.query_feature_rows(athlete_id).await?;
        self.batch_delete(&rows, collections::FEATURE_ROWS, FeatureRow::key)
            .await?;
        deleted_count += rows.len();
        tracing::debug!(athlete_id, count = rows.len(), "Deleted feature rows");

        // 2. Activities
        let ids: Vec<u64> = self.get_activity_ids(athlete_id).await?.into_iter().collect();
        self.batch_delete(&ids, collections::ACTIVITIES, |id: &u64| id.to_string())
            .await?;
        deleted_count += ids.len();
        tracing::debug!(athlete_id, count = ids.len(), "Deleted activities");

        // 3. Per-athlete documents, status last
        for collection in [
            collections::ATHLETE_STATS,
            collections::ATHLETE_METADATA,
            collections::STATUSES,
        ] {
            self.client
                .fluent()
                .delete()
                .from(collection)
                .document_id(athlete_id.to_string())
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            deleted_count += 1;
        }

        tracing::info!(athlete_id, deleted_count, "Athlete data deletion complete");

        Ok(deleted_count)
    }
}
