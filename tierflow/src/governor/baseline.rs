//! Rolling percentile baselines and regression signals.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::sample::{MetricKind, RollingLog};

/// Samples considered for a baseline (the most recent of the window).
pub const BASELINE_SAMPLE_COUNT: usize = 20;

/// Minimum qualifying samples before a baseline exists at all.
pub const BASELINE_MIN_SAMPLES: usize = 5;

/// Qualifying window for baseline samples, in hours.
pub const BASELINE_WINDOW_HOURS: i64 = 24;

/// Percent degradation at which a regression signal is raised.
pub const REGRESSION_THRESHOLD_PCT: f64 = 20.0;

/// A sample degraded past the threshold relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionSignal {
    /// Which metric regressed.
    pub kind: MetricKind,
    /// The observed value.
    pub value: f64,
    /// The baseline it was compared against.
    pub baseline: f64,
    /// Percent degradation versus the baseline.
    pub percent: f64,
}

/// Baseline for a metric: 75th percentile of the most recent
/// [`BASELINE_SAMPLE_COUNT`] samples within the last
/// [`BASELINE_WINDOW_HOURS`] hours.
///
/// Returns `None` until [`BASELINE_MIN_SAMPLES`] qualifying samples exist —
/// with fewer, no regression can be detected.
pub fn baseline(log: &RollingLog, kind: MetricKind, now: DateTime<Utc>) -> Option<f64> {
    let values = log.recent(
        kind,
        BASELINE_SAMPLE_COUNT,
        Duration::hours(BASELINE_WINDOW_HOURS),
        now,
    );
    if values.len() < BASELINE_MIN_SAMPLES {
        return None;
    }
    Some(percentile_75(values))
}

/// Percent degradation of `value` versus `baseline`.
///
/// Positive means worse (all governed metrics are lower-is-better);
/// negative means an improvement.
pub fn percent_degradation(value: f64, baseline: f64) -> f64 {
    if baseline <= 0.0 {
        return 0.0;
    }
    (value - baseline) / baseline * 100.0
}

/// Compare a new observation against the pre-existing baseline.
///
/// The baseline is computed from the log *before* the sample is pushed, so
/// a spike cannot dilute its own reference.
pub fn check_regression(
    log: &RollingLog,
    kind: MetricKind,
    value: f64,
    now: DateTime<Utc>,
) -> Option<RegressionSignal> {
    let baseline = baseline(log, kind, now)?;
    let percent = percent_degradation(value, baseline);
    if percent >= REGRESSION_THRESHOLD_PCT {
        Some(RegressionSignal {
            kind,
            value,
            baseline,
            percent,
        })
    } else {
        None
    }
}

/// Nearest-rank 75th percentile.
fn percentile_75(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((values.len() as f64) * 0.75).ceil() as usize;
    values[rank.saturating_sub(1).min(values.len() - 1)]
}
