//! Metric samples and the capped rolling log.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cap on retained samples; the oldest is evicted first.
pub const ROLLING_LOG_CAP: usize = 1000;

/// Timing-style metric kinds observed from platform instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Largest paint time (ms).
    LargestPaint,
    /// Input delay (ms).
    InputDelay,
    /// Cumulative layout-shift score (unitless).
    LayoutShift,
    /// First contentful paint (ms).
    FirstContentfulPaint,
    /// Time to first byte (ms).
    TimeToFirstByte,
}

impl MetricKind {
    /// All metric kinds.
    pub fn all() -> [MetricKind; 5] {
        [
            MetricKind::LargestPaint,
            MetricKind::InputDelay,
            MetricKind::LayoutShift,
            MetricKind::FirstContentfulPaint,
            MetricKind::TimeToFirstByte,
        ]
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MetricKind::LargestPaint => "largest-paint",
            MetricKind::InputDelay => "input-delay",
            MetricKind::LayoutShift => "layout-shift",
            MetricKind::FirstContentfulPaint => "first-contentful-paint",
            MetricKind::TimeToFirstByte => "time-to-first-byte",
        };
        write!(f, "{name}")
    }
}

/// One observed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// What was measured.
    pub kind: MetricKind,
    /// Measured value (ms for timing metrics, score for layout shift).
    pub value: f64,
    /// When it was observed.
    pub at: DateTime<Utc>,
}

impl MetricSample {
    /// Create a sample observed now.
    pub fn now(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value,
            at: Utc::now(),
        }
    }
}

/// Capped sample log; oldest entries are evicted first.
#[derive(Debug)]
pub struct RollingLog {
    samples: VecDeque<MetricSample>,
    cap: usize,
}

impl RollingLog {
    /// Create a log with the default cap.
    pub fn new() -> Self {
        Self::with_cap(ROLLING_LOG_CAP)
    }

    /// Create a log with an explicit cap.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap.min(ROLLING_LOG_CAP)),
            cap: cap.max(1),
        }
    }

    /// Append a sample, evicting the oldest past the cap.
    pub fn push(&mut self, sample: MetricSample) {
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Values of the most recent `limit` samples of `kind` within `window`
    /// of `now`, oldest first.
    pub fn recent(
        &self,
        kind: MetricKind,
        limit: usize,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Vec<f64> {
        let cutoff = now - window;
        let mut values: Vec<f64> = self
            .samples
            .iter()
            .rev()
            .filter(|s| s.kind == kind && s.at >= cutoff && s.at <= now)
            .take(limit)
            .map(|s| s.value)
            .collect();
        values.reverse();
        values
    }

    /// Samples of `kind` within the trailing `window` of `now`.
    pub fn window(
        &self,
        kind: MetricKind,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        let cutoff = now - window;
        self.samples
            .iter()
            .filter(|s| s.kind == kind && s.at >= cutoff && s.at <= now)
            .copied()
            .collect()
    }

    /// Total retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for RollingLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(kind: MetricKind, value: f64, at: DateTime<Utc>) -> MetricSample {
        MetricSample { kind, value, at }
    }

    #[test]
    fn test_cap_evicts_oldest_first() {
        let mut log = RollingLog::with_cap(3);
        let now = Utc::now();

        for i in 0..5 {
            log.push(sample_at(MetricKind::LargestPaint, i as f64, now));
        }

        assert_eq!(log.len(), 3);
        let values = log.recent(MetricKind::LargestPaint, 10, Duration::hours(1), now);
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_recent_filters_kind_and_window() {
        let mut log = RollingLog::new();
        let now = Utc::now();

        log.push(sample_at(MetricKind::LargestPaint, 1.0, now - Duration::hours(30)));
        log.push(sample_at(MetricKind::LargestPaint, 2.0, now - Duration::hours(1)));
        log.push(sample_at(MetricKind::InputDelay, 99.0, now));
        log.push(sample_at(MetricKind::LargestPaint, 3.0, now));

        let values = log.recent(MetricKind::LargestPaint, 10, Duration::hours(24), now);
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[test]
    fn test_recent_respects_limit_keeping_newest() {
        let mut log = RollingLog::new();
        let now = Utc::now();

        for i in 0..30 {
            log.push(sample_at(MetricKind::LayoutShift, i as f64, now));
        }

        let values = log.recent(MetricKind::LayoutShift, 20, Duration::hours(24), now);
        assert_eq!(values.len(), 20);
        assert_eq!(values[0], 10.0);
        assert_eq!(values[19], 29.0);
    }

    #[test]
    fn test_window_returns_samples() {
        let mut log = RollingLog::new();
        let now = Utc::now();

        log.push(sample_at(MetricKind::InputDelay, 5.0, now - Duration::seconds(90)));
        log.push(sample_at(MetricKind::InputDelay, 6.0, now - Duration::seconds(30)));

        let window = log.window(MetricKind::InputDelay, Duration::seconds(60), now);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].value, 6.0);
    }
}
