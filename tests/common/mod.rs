// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use stride_features::config::Config;
use stride_features::db::{FirestoreDb, MemoryStore, RecordStore};
use stride_features::error::AppError;
use stride_features::models::{
    AthleteMetadata, AthleteStats, DailyBudget, FeatureRow, IngestionStatus, ProcessingState,
    RawActivity,
};
use stride_features::routes::create_router;
use stride_features::services::strava::{
    ActivitySource, StravaActivity, StravaActivitySummary, StravaAthlete, StravaAthleteStats,
    StravaHeartRateZones, StravaZoneRange, StravaZones, TokenExchangeResponse, TokenProvider,
    TokenRefreshResponse,
};
use stride_features::services::IngestionService;
use stride_features::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Generate a unique athlete ID for test isolation.
#[allow(dead_code)]
pub fn unique_athlete_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
        % 1_000_000_000_000
}

/// First activity start time used by the fake source.
#[allow(dead_code)]
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap()
}

// ─── Fake Strava ─────────────────────────────────────────────────────────────

/// Scripted Strava stand-in.
///
/// Activity `i` in `ids` starts `i` days after [`base_time`]. Listing
/// returns `ids` in order, paged.
#[derive(Default)]
pub struct FakeStrava {
    pub ids: Vec<u64>,
    /// Activities reported as rides instead of runs
    pub rides: HashSet<u64>,
    /// Fail the nth detail call (1-based) with a transport error
    pub fail_detail_call: Option<usize>,
    /// Every call answers 401
    pub unauthorized: bool,
    /// Detail calls take this long
    pub detail_delay: Option<std::time::Duration>,
    /// Refresh tokens the provider rejects
    pub bad_refresh_tokens: HashSet<String>,
    /// Athlete returned from code exchange
    pub exchange_athlete_id: u64,
    /// Heart-rate zones as (min, max) bpm; empty means none configured
    pub hr_zones: Vec<(i32, i32)>,

    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
    pub athlete_calls: AtomicUsize,
    pub zone_calls: AtomicUsize,
    pub fetched_ids: Mutex<Vec<u64>>,
}

#[allow(dead_code)]
impl FakeStrava {
    pub fn with_activities(count: u64) -> Self {
        Self {
            ids: (1..=count).map(|i| 1000 + i).collect(),
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
            + self.detail_calls.load(Ordering::SeqCst)
            + self.stats_calls.load(Ordering::SeqCst)
            + self.athlete_calls.load(Ordering::SeqCst)
            + self.zone_calls.load(Ordering::SeqCst)
    }

    pub fn fetched_ids(&self) -> Vec<u64> {
        self.fetched_ids.lock().unwrap().clone()
    }

    fn check_auth(&self) -> Result<(), AppError> {
        if self.unauthorized {
            return Err(AppError::Authorization(AppError::STRAVA_TOKEN_ERROR.to_string()));
        }
        Ok(())
    }

    fn detail(&self, index: usize, id: u64) -> StravaActivity {
        let sport = if self.rides.contains(&id) { "Ride" } else { "Run" };
        let mut extra = serde_json::Map::new();
        extra.insert("suffer_score".to_string(), serde_json::json!(30.0));
        StravaActivity {
            id,
            name: format!("Activity {}", id),
            sport_type: sport.to_string(),
            start_date: base_time() + Duration::days(index as i64),
            start_date_local: Some((base_time() + Duration::days(index as i64)).naive_utc()),
            distance: 5000.0 + index as f64 * 10.0,
            moving_time: 1500,
            elapsed_time: 1550,
            total_elevation_gain: Some(30.0),
            // Every other activity has no heart-rate data.
            average_heartrate: (id % 2 == 0).then_some(150.0),
            max_heartrate: (id % 2 == 0).then_some(172.0),
            average_speed: None,
            max_speed: None,
            extra,
        }
    }
}

#[async_trait]
impl ActivitySource for FakeStrava {
    async fn list_activities(
        &self,
        _access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;

        let start = ((page.max(1) - 1) * per_page) as usize;
        let end = (start + per_page as usize).min(self.ids.len());
        Ok(self
            .ids
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|&id| StravaActivitySummary {
                id,
                name: String::new(),
                sport_type: String::new(),
                start_date: None,
                distance: 0.0,
            })
            .collect())
    }

    async fn get_activity(
        &self,
        _access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let call = self.detail_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_auth()?;

        if let Some(delay) = self.detail_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_detail_call == Some(call) {
            return Err(AppError::Transport("connection reset".to_string()));
        }

        let index = self
            .ids
            .iter()
            .position(|&id| id == activity_id)
            .ok_or_else(|| AppError::Transport(format!("HTTP 404: {}", activity_id)))?;
        self.fetched_ids.lock().unwrap().push(activity_id);
        Ok(self.detail(index, activity_id))
    }

    async fn get_stats(
        &self,
        _access_token: &str,
        _athlete_id: u64,
    ) -> Result<StravaAthleteStats, AppError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;

        let mut stats = StravaAthleteStats::default();
        stats.all_run_totals.count = self.ids.len() as u32;
        stats.all_run_totals.distance = self.ids.len() as f64 * 5000.0;
        Ok(stats)
    }

    async fn get_athlete(&self, _access_token: &str) -> Result<StravaAthlete, AppError> {
        self.athlete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;

        Ok(StravaAthlete {
            id: self.exchange_athlete_id,
            firstname: "Test".to_string(),
            lastname: "Runner".to_string(),
            sex: Some("F".to_string()),
            weight: Some(57.5),
        })
    }

    async fn get_zones(&self, _access_token: &str) -> Result<StravaZones, AppError> {
        self.zone_calls.fetch_add(1, Ordering::SeqCst);
        self.check_auth()?;

        if self.hr_zones.is_empty() {
            return Ok(StravaZones::default());
        }
        Ok(StravaZones {
            heart_rate: Some(StravaHeartRateZones {
                custom_zones: true,
                zones: self
                    .hr_zones
                    .iter()
                    .map(|&(min, max)| StravaZoneRange { min, max })
                    .collect(),
            }),
        })
    }
}

#[async_trait]
impl TokenProvider for FakeStrava {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        if self.bad_refresh_tokens.contains(refresh_token) {
            return Err(AppError::Authorization("invalid refresh token".to_string()));
        }
        Ok(TokenRefreshResponse {
            access_token: format!("fresh-{}", refresh_token),
            refresh_token: format!("{}-next", refresh_token),
            expires_at: 0,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        if code == "bad" {
            return Err(AppError::Transport("HTTP 400: invalid code".to_string()));
        }
        Ok(TokenExchangeResponse {
            access_token: format!("access-{}", code),
            refresh_token: format!("refresh-{}", code),
            expires_at: 0,
            athlete: StravaAthlete {
                id: self.exchange_athlete_id,
                firstname: "Test".to_string(),
                lastname: "Runner".to_string(),
                ..StravaAthlete::default()
            },
        })
    }
}

// ─── Failing store ───────────────────────────────────────────────────────────

/// Memory store whose activity inserts start failing after `ok_inserts`.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub ok_inserts: usize,
    inserts: AtomicUsize,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(ok_inserts: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            ok_inserts,
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn list_statuses(&self) -> Result<Vec<IngestionStatus>, AppError> {
        self.inner.list_statuses().await
    }
    async fn get_status(&self, athlete_id: u64) -> Result<Option<IngestionStatus>, AppError> {
        self.inner.get_status(athlete_id).await
    }
    async fn set_status(&self, status: &IngestionStatus) -> Result<(), AppError> {
        self.inner.set_status(status).await
    }
    async fn transition_status(
        &self,
        athlete_id: u64,
        from: ProcessingState,
        to: ProcessingState,
    ) -> Result<Option<IngestionStatus>, AppError> {
        self.inner.transition_status(athlete_id, from, to).await
    }
    async fn update_tokens(
        &self,
        athlete_id: u64,
        bearer_token: &str,
        refresh_token: &str,
    ) -> Result<Option<IngestionStatus>, AppError> {
        self.inner
            .update_tokens(athlete_id, bearer_token, refresh_token)
            .await
    }
    async fn get_budget(&self) -> Result<DailyBudget, AppError> {
        self.inner.get_budget().await
    }
    async fn set_budget(&self, budget: &DailyBudget) -> Result<(), AppError> {
        self.inner.set_budget(budget).await
    }
    async fn add_budget_calls(&self, calls: u64) -> Result<DailyBudget, AppError> {
        self.inner.add_budget_calls(calls).await
    }
    async fn get_activity_ids(&self, athlete_id: u64) -> Result<HashSet<u64>, AppError> {
        self.inner.get_activity_ids(athlete_id).await
    }
    async fn insert_activity(&self, activity: &RawActivity) -> Result<(), AppError> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.ok_inserts {
            return Err(AppError::Database("write quota exceeded".to_string()));
        }
        self.inner.insert_activity(activity).await
    }
    async fn get_activities(&self, athlete_id: u64) -> Result<Vec<RawActivity>, AppError> {
        self.inner.get_activities(athlete_id).await
    }
    async fn replace_feature_rows(
        &self,
        athlete_id: u64,
        rows: &[FeatureRow],
    ) -> Result<(), AppError> {
        self.inner.replace_feature_rows(athlete_id, rows).await
    }
    async fn get_feature_rows(&self, athlete_id: u64) -> Result<Vec<FeatureRow>, AppError> {
        self.inner.get_feature_rows(athlete_id).await
    }
    async fn set_athlete_stats(&self, stats: &AthleteStats) -> Result<(), AppError> {
        self.inner.set_athlete_stats(stats).await
    }
    async fn get_athlete_stats(&self, athlete_id: u64) -> Result<Option<AthleteStats>, AppError> {
        self.inner.get_athlete_stats(athlete_id).await
    }
    async fn set_athlete_metadata(&self, metadata: &AthleteMetadata) -> Result<(), AppError> {
        self.inner.set_athlete_metadata(metadata).await
    }
    async fn get_athlete_metadata(
        &self,
        athlete_id: u64,
    ) -> Result<Option<AthleteMetadata>, AppError> {
        self.inner.get_athlete_metadata(athlete_id).await
    }
    async fn delete_athlete_data(&self, athlete_id: u64) -> Result<usize, AppError> {
        self.inner.delete_athlete_data(athlete_id).await
    }
}

// ─── App and service builders ────────────────────────────────────────────────

/// Register an athlete directly in the store, in state `none`.
#[allow(dead_code)]
pub async fn register(store: &dyn RecordStore, athlete_id: u64) -> IngestionStatus {
    let status = IngestionStatus::new(
        athlete_id,
        format!("bearer-{}", athlete_id),
        format!("refresh-{}", athlete_id),
    );
    store.set_status(&status).await.unwrap();
    status
}

/// Ingestion service over the given store and fake source.
#[allow(dead_code)]
pub fn ingestion_service(
    config: &Config,
    store: Arc<dyn RecordStore>,
    strava: Arc<FakeStrava>,
) -> IngestionService {
    IngestionService::new(
        store,
        strava,
        config.ingest.clone(),
        config.features.clone(),
    )
}

/// Create a test app with in-memory store and a fake Strava.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Arc::new(FakeStrava::with_activities(25)))
}

#[allow(dead_code)]
pub fn create_test_app_with(strava: Arc<FakeStrava>) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(MemoryStore::new()),
        strava.clone(),
        strava,
    ));

    (create_router(state.clone()), state)
}
