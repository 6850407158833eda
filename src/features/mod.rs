// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feature engineering: normalization, rolling windows and point-in-time
//! summaries. Everything here is pure; persistence lives in the services.

pub mod normalize;
pub mod rolling;
pub mod snapshot;
pub mod units;

pub use normalize::{normalize, normalize_all, HeartRateBounds, Skip};
pub use rolling::compute_rolling;
pub use snapshot::{extract, race_relevant_runs, DEFAULT_LOOKBACK_DAYS, DEFAULT_RACE_TOLERANCE};

/// Mean of the known values. None when there are none.
pub(crate) fn mean_known<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Minimum of the known values.
pub(crate) fn min_known<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().reduce(f64::min)
}

/// Maximum of the known values.
pub(crate) fn max_known<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values.into_iter().flatten().reduce(f64::max)
}
