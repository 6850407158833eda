// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! stride-features: Strava training-load features
//!
//! This crate ingests Strava running history incrementally under a shared
//! API budget and turns it into rolling training-load features.

pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::RecordStore;
use services::{ActivitySource, IngestionService, TokenProvider};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub activity_source: Arc<dyn ActivitySource>,
    pub token_provider: Arc<dyn TokenProvider>,
    ingestion: IngestionService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn RecordStore>,
        activity_source: Arc<dyn ActivitySource>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        let ingestion = IngestionService::new(
            store.clone(),
            activity_source.clone(),
            config.ingest.clone(),
            config.features.clone(),
        );
        Self {
            config,
            store,
            activity_source,
            token_provider,
            ingestion,
        }
    }

    /// The one ingestion service for this process. Overlapping scheduler
    /// calls share its batch guard.
    pub fn ingestion(&self) -> &IngestionService {
        &self.ingestion
    }
}
