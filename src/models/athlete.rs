// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Athlete profile data that feeds feature derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::strava::{StravaAthlete, StravaZones};

/// Share of maximum heart rate where Strava's default top zone begins.
pub const TOP_ZONE_FRACTION_OF_MAX: f64 = 0.97;

/// One heart-rate zone in bpm. `max` is None for the open-ended top zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateZone {
    pub min: u32,
    pub max: Option<u32>,
}

/// Stored athlete metadata, keyed by athlete_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteMetadata {
    pub athlete_id: u64,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    /// Zones were set by the athlete rather than derived by Strava
    #[serde(default)]
    pub custom_zones: bool,
    #[serde(default)]
    pub heart_rate_zones: Vec<HeartRateZone>,
    pub fetched_at: DateTime<Utc>,
}

impl AthleteMetadata {
    pub fn from_strava(
        athlete_id: u64,
        profile: StravaAthlete,
        zones: StravaZones,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let (custom_zones, heart_rate_zones) = match zones.heart_rate {
            Some(hr) => (
                hr.custom_zones,
                hr.zones
                    .iter()
                    .filter_map(|z| {
                        Some(HeartRateZone {
                            min: u32::try_from(z.min).ok()?,
                            max: u32::try_from(z.max).ok(),
                        })
                    })
                    .collect(),
            ),
            None => (false, Vec::new()),
        };

        Self {
            athlete_id,
            sex: profile.sex.filter(|s| !s.is_empty()),
            weight_kg: profile.weight.filter(|w| *w > 0.0),
            custom_zones,
            heart_rate_zones,
            fetched_at,
        }
    }

    /// Maximum heart rate implied by the zones.
    ///
    /// An open-ended top zone starts at a fixed share of max, so max is
    /// scaled back up from its lower bound. A closed top zone ends at max.
    pub fn max_heart_rate(&self) -> Option<f64> {
        let top = self.heart_rate_zones.iter().max_by_key(|z| z.min)?;
        let max = match top.max {
            Some(max) => f64::from(max),
            None => (f64::from(top.min) / TOP_ZONE_FRACTION_OF_MAX).round(),
        };
        (max > 0.0).then_some(max)
    }
}
