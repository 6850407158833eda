// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pace, speed and training-load conversions.
//!
//! Invalid inputs produce NaN rather than panicking, so callers can
//! propagate "unknown" values through arithmetic.

/// Days for training load to decay by 1/e.
pub const DEFAULT_DECAY_DAYS: f64 = 7.0;

/// Riegel fatigue exponent.
const RIEGEL_EXPONENT: f64 = 1.06;
/// Weekly volume (km) at which the volume adjustment saturates.
const REFERENCE_WEEKLY_KM: f64 = 50.0;

/// Convert pace (min/km) to speed (km/h). NaN for non-positive pace.
pub fn pace_to_speed(pace_min_per_km: f64) -> f64 {
    if pace_min_per_km > 0.0 {
        60.0 / pace_min_per_km
    } else {
        f64::NAN
    }
}

/// Convert speed (km/h) to pace (min/km). NaN for non-positive speed.
pub fn speed_to_pace(speed_kmh: f64) -> f64 {
    if speed_kmh > 0.0 {
        60.0 / speed_kmh
    } else {
        f64::NAN
    }
}

/// Pace in min/km, or None when the distance is not positive.
pub fn calculate_pace(distance_km: f64, duration_minutes: f64) -> Option<f64> {
    (distance_km > 0.0).then(|| duration_minutes / distance_km)
}

/// Exponentially decayed training load: Σ dᵢ · e^(−daysAgoᵢ / decay).
///
/// `distances` and `days_ago` must have equal length.
pub fn decayed_load(distances: &[f64], days_ago: &[f64], decay_constant: f64) -> f64 {
    debug_assert_eq!(
        distances.len(),
        days_ago.len(),
        "distances and days_ago must be the same length"
    );
    distances
        .iter()
        .zip(days_ago)
        .map(|(d, age)| d * (-age / decay_constant).exp())
        .sum()
}

/// Estimated race result.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RaceEstimate {
    pub time_minutes: f64,
    pub pace_min_per_km: f64,
}

/// Estimate a race time with Riegel's formula, softened by training volume
/// and a base fitness score in `[0, 1]`.
pub fn estimate_race_time(
    recent_pace: f64,
    target_distance_km: f64,
    weekly_volume_km: f64,
    base_fitness: f64,
) -> RaceEstimate {
    let volume_adjustment = (weekly_volume_km / REFERENCE_WEEKLY_KM).min(1.0);
    let fatigue = RIEGEL_EXPONENT * (1.0 - 0.02 * volume_adjustment * base_fitness);

    let pace_min_per_km = recent_pace * target_distance_km.powf(fatigue - 1.0);
    RaceEstimate {
        time_minutes: pace_min_per_km * target_distance_km,
        pace_min_per_km,
    }
}
