// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment, so no
//! secret store is queried at runtime.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default trailing windows (days) for rolling features.
pub const DEFAULT_WINDOWS: [u32; 4] = [7, 14, 30, 90];

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Which record store backs the service
    pub store_backend: StoreBackend,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Shared secret required on `/tasks/*` requests
    pub tasks_token: String,

    // --- Pipeline tuning ---
    pub ingest: IngestConfig,
    pub features: FeatureConfig,
}

/// Record store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Ingestion policy constants.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Page size for activity listing.
    pub per_page: u32,
    /// Maximum number of new activities fetched in one athlete cycle.
    pub max_new_per_cycle: usize,
    /// Athletes with a complete history smaller than this are rejected.
    pub min_activities: usize,
    /// Daily budget of remote calls shared by all athletes.
    pub daily_call_cap: u64,
    /// Minimum spacing between detailed activity fetches.
    pub call_interval: Duration,
    /// Upper bound on a single remote call.
    pub call_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            per_page: 30,
            max_new_per_cycle: 90,
            min_activities: 20,
            daily_call_cap: 25_000,
            call_interval: Duration::from_millis(1500),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Feature pipeline constants.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Resting heart rate used for heart-rate reserve.
    pub hr_rest: f64,
    /// Maximum heart rate used for heart-rate reserve.
    pub hr_max: f64,
    /// Trailing windows in days.
    pub windows: Vec<u32>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            hr_rest: 51.0,
            hr_max: 195.0,
            windows: DEFAULT_WINDOWS.to_vec(),
        }
    }
}

impl Config {
    /// Config for tests: in-memory store, no pacing, fixed secrets.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            strava_client_secret: "test_secret".to_string(),
            tasks_token: "test_tasks_token".to_string(),
            ingest: IngestConfig {
                call_interval: Duration::ZERO,
                call_timeout: Duration::from_secs(5),
                ..IngestConfig::default()
            },
            features: FeatureConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("firestore") | Err(_) => StoreBackend::Firestore,
            Ok(other) => {
                return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string()));
            }
        };

        let defaults = IngestConfig::default();
        let ingest = IngestConfig {
            per_page: parse_or("PER_PAGE", defaults.per_page)?.max(1),
            max_new_per_cycle: parse_or("MAX_NEW_PER_CYCLE", defaults.max_new_per_cycle)?.max(1),
            min_activities: parse_or("MIN_ACTIVITIES", defaults.min_activities)?,
            daily_call_cap: parse_or("DAILY_CALL_CAP", defaults.daily_call_cap)?,
            call_interval: Duration::from_millis(parse_or("CALL_INTERVAL_MS", 1500u64)?),
            call_timeout: Duration::from_secs(parse_or("CALL_TIMEOUT_SECS", 30u64)?),
        };

        let feature_defaults = FeatureConfig::default();
        let features = FeatureConfig {
            hr_rest: parse_or("HR_REST", feature_defaults.hr_rest)?,
            hr_max: parse_or("HR_MAX", feature_defaults.hr_max)?,
            windows: feature_defaults.windows,
        };
        if features.hr_max <= features.hr_rest {
            return Err(ConfigError::Invalid(
                "HR_MAX",
                format!("{} must exceed HR_REST {}", features.hr_max, features.hr_rest),
            ));
        }

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            tasks_token: env::var("TASKS_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TASKS_TOKEN"))?,
            ingest,
            features,
        })
    }
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw.clone())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
