// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod athlete;
pub mod features;
pub mod stats;
pub mod status;

pub use activity::{CanonicalRecord, RawActivity};
pub use athlete::{AthleteMetadata, HeartRateZone};
pub use features::{FeatureRow, PointInTimeFeatures, RaceRelevantRun, WindowFeatures};
pub use stats::{ActivityTotals, AthleteStats};
pub use status::{DailyBudget, IngestionStatus, ProcessingState};
