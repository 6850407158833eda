// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service layer modules.

pub mod budget;
pub mod feature_table;
pub mod ingest;
pub mod strava;
pub mod tokens;

pub use budget::{BudgetTracker, CallPacer};
pub use ingest::{BatchOutcome, CycleOutcome, IngestionService, RejectReason};
pub use strava::{ActivitySource, StravaClient, TokenProvider};
