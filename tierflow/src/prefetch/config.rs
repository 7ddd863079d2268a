//! Prefetch tuning knobs.

use std::time::Duration;

use crate::capability::CapabilityProfile;

/// Default keys fetched per drain batch.
pub const DEFAULT_BATCH_SIZE: usize = 2;

/// Default pause between drain batches in milliseconds.
pub const DEFAULT_BATCH_PACING_MS: u64 = 500;

/// Default number of frequent transitions considered per route.
pub const DEFAULT_TOP_K: usize = 3;

/// Default hover-trigger delay on capable devices in milliseconds.
pub const DEFAULT_HOVER_DELAY_CAPABLE_MS: u64 = 80;

/// Default hover-trigger delay on constrained devices in milliseconds.
pub const DEFAULT_HOVER_DELAY_CONSTRAINED_MS: u64 = 200;

/// Score at which the shorter hover delay applies.
pub const HOVER_CAPABLE_SCORE: u8 = 70;

/// Dwell fraction of the historical average at which the time-based
/// strategy fires.
pub const DEFAULT_DWELL_RATIO: f64 = 0.7;

/// Unique/total visit ratio above which the session counts as exploratory.
pub const DEFAULT_EXPLORATION_THRESHOLD: f64 = 0.7;

/// Configuration for the prefetcher.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Keys fetched concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_pacing: Duration,
    /// Frequent-transition candidates considered per route.
    pub top_k: usize,
    /// Hover delay on capable devices.
    pub hover_delay_capable: Duration,
    /// Hover delay on constrained devices.
    pub hover_delay_constrained: Duration,
    /// Dwell ratio gating the time-based strategy.
    pub dwell_ratio: f64,
    /// Exploration-ratio threshold.
    pub exploration_threshold: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pacing: Duration::from_millis(DEFAULT_BATCH_PACING_MS),
            top_k: DEFAULT_TOP_K,
            hover_delay_capable: Duration::from_millis(DEFAULT_HOVER_DELAY_CAPABLE_MS),
            hover_delay_constrained: Duration::from_millis(DEFAULT_HOVER_DELAY_CONSTRAINED_MS),
            dwell_ratio: DEFAULT_DWELL_RATIO,
            exploration_threshold: DEFAULT_EXPLORATION_THRESHOLD,
        }
    }
}

impl PrefetchConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drain batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the inter-batch pacing.
    pub fn with_batch_pacing(mut self, pacing: Duration) -> Self {
        self.batch_pacing = pacing;
        self
    }

    /// Hover-trigger delay for a profile: shorter on capable devices.
    pub fn hover_delay(&self, profile: &CapabilityProfile) -> Duration {
        if profile.performance_score >= HOVER_CAPABLE_SCORE {
            self.hover_delay_capable
        } else {
            self.hover_delay_constrained
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::test_signals;

    #[test]
    fn test_defaults() {
        let config = PrefetchConfig::default();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.batch_pacing, Duration::from_millis(DEFAULT_BATCH_PACING_MS));
    }

    #[test]
    fn test_hover_delay_scales_with_capability() {
        let config = PrefetchConfig::default();

        let capable = test_signals::capable_profile();
        let constrained = test_signals::constrained_profile();

        assert!(config.hover_delay(&capable) < config.hover_delay(&constrained));
    }

    #[test]
    fn test_batch_size_floor() {
        let config = PrefetchConfig::new().with_batch_size(0);
        assert_eq!(config.batch_size, 1);
    }
}
