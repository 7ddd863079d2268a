//! Load strategy selection.
//!
//! A pure function of score, network and battery. The strategy fixes which
//! priority tiers are eligible, how many units load concurrently per batch,
//! and how long the loader pauses between batches.

use std::time::Duration;

use crate::capability::CapabilityProfile;

use super::unit::PriorityTier;

/// How aggressively a pass loads units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Capable device on a fast network: everything, large batches.
    Aggressive,
    /// Default for mid-range sessions.
    Balanced,
    /// Constrained device or network: core tiers only, small batches.
    Conservative,
    /// Severely constrained: critical units only, one at a time.
    Minimal,
}

impl LoadStrategy {
    /// Select the strategy for a profile.
    pub fn for_profile(profile: &CapabilityProfile) -> Self {
        let score = profile.performance_score;

        if score < 30
            || profile.effective_connection == crate::capability::NetworkClass::Slow2g
            || profile.low_battery_not_charging()
        {
            LoadStrategy::Minimal
        } else if score < 50 || profile.slow_network() || profile.save_data {
            LoadStrategy::Conservative
        } else if score < 70 {
            LoadStrategy::Balanced
        } else {
            LoadStrategy::Aggressive
        }
    }

    /// Whether units of `tier` load under this strategy.
    pub fn admits(&self, tier: PriorityTier) -> bool {
        match self {
            LoadStrategy::Aggressive => true,
            LoadStrategy::Balanced => tier != PriorityTier::Optional,
            LoadStrategy::Conservative => {
                matches!(tier, PriorityTier::Critical | PriorityTier::Important)
            }
            LoadStrategy::Minimal => tier == PriorityTier::Critical,
        }
    }

    /// Units loaded concurrently per batch.
    pub fn max_concurrency(&self) -> usize {
        match self {
            LoadStrategy::Aggressive => 6,
            LoadStrategy::Balanced => 3,
            LoadStrategy::Conservative => 2,
            LoadStrategy::Minimal => 1,
        }
    }

    /// Pause between batches.
    pub fn pacing(&self) -> Duration {
        match self {
            LoadStrategy::Aggressive => Duration::from_millis(50),
            LoadStrategy::Balanced => Duration::from_millis(150),
            LoadStrategy::Conservative => Duration::from_millis(400),
            LoadStrategy::Minimal => Duration::from_millis(1_000),
        }
    }
}

impl std::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadStrategy::Aggressive => "aggressive",
            LoadStrategy::Balanced => "balanced",
            LoadStrategy::Conservative => "conservative",
            LoadStrategy::Minimal => "minimal",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::test_signals;
    use crate::capability::{BatteryStatus, NetworkClass};

    #[test]
    fn test_capable_profile_is_aggressive() {
        let profile = test_signals::capable_profile();
        assert_eq!(LoadStrategy::for_profile(&profile), LoadStrategy::Aggressive);
    }

    #[test]
    fn test_slow_network_is_conservative() {
        let profile = test_signals::constrained_profile();
        assert_eq!(
            LoadStrategy::for_profile(&profile),
            LoadStrategy::Conservative
        );
    }

    #[test]
    fn test_low_battery_is_minimal() {
        let mut profile = test_signals::capable_profile();
        profile.battery = Some(BatteryStatus {
            level: 0.05,
            charging: false,
        });
        assert_eq!(LoadStrategy::for_profile(&profile), LoadStrategy::Minimal);
    }

    #[test]
    fn test_slow_2g_is_minimal() {
        let mut profile = test_signals::capable_profile();
        profile.effective_connection = NetworkClass::Slow2g;
        assert_eq!(LoadStrategy::for_profile(&profile), LoadStrategy::Minimal);
    }

    #[test]
    fn test_tier_admission() {
        assert!(LoadStrategy::Aggressive.admits(PriorityTier::Optional));
        assert!(LoadStrategy::Balanced.admits(PriorityTier::Enhancement));
        assert!(!LoadStrategy::Balanced.admits(PriorityTier::Optional));
        assert!(LoadStrategy::Conservative.admits(PriorityTier::Important));
        assert!(!LoadStrategy::Conservative.admits(PriorityTier::Enhancement));
        assert!(LoadStrategy::Minimal.admits(PriorityTier::Critical));
        assert!(!LoadStrategy::Minimal.admits(PriorityTier::Important));
    }

    #[test]
    fn test_concurrency_and_pacing_scale_together() {
        assert!(LoadStrategy::Aggressive.max_concurrency() > LoadStrategy::Minimal.max_concurrency());
        assert!(LoadStrategy::Aggressive.pacing() < LoadStrategy::Minimal.pacing());
    }
}
