//! The degradation ladder and its selection chain.

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityProfile;

use super::matrix::{AnimationMode, ChartMode, Feature, FeatureMatrix, InteractionMode};

/// Score below which a device lands on [`DegradationLevel::Basic`].
pub const BASIC_SCORE_THRESHOLD: u8 = 30;

/// Score below which a device lands on [`DegradationLevel::Standard`].
pub const STANDARD_SCORE_THRESHOLD: u8 = 50;

/// Score below which a device lands on [`DegradationLevel::Enhanced`].
pub const ENHANCED_SCORE_THRESHOLD: u8 = 70;

/// Discrete functionality tier.
///
/// Ordered from most to least degraded; `Minimal < Basic < Standard <
/// Enhanced < Full`, and selection is monotonic in score when every other
/// input is held fixed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum DegradationLevel {
    /// No scripting runtime: server-rendered content only.
    Minimal,
    /// Severely constrained device or network.
    Basic,
    /// Constrained but workable.
    #[default]
    Standard,
    /// Capable device with one soft limitation.
    Enhanced,
    /// No restrictions.
    Full,
}

impl DegradationLevel {
    /// The fixed feature-flag matrix for this level.
    pub fn matrix(&self) -> FeatureMatrix {
        match self {
            DegradationLevel::Minimal => FeatureMatrix {
                animations: false,
                interactivity: false,
                dynamic_content: false,
                heavy_components: false,
                real_time_updates: false,
                advanced_charts: false,
            },
            DegradationLevel::Basic => FeatureMatrix {
                animations: false,
                interactivity: true,
                dynamic_content: false,
                heavy_components: false,
                real_time_updates: false,
                advanced_charts: false,
            },
            DegradationLevel::Standard => FeatureMatrix {
                animations: false,
                interactivity: true,
                dynamic_content: true,
                heavy_components: false,
                real_time_updates: false,
                advanced_charts: false,
            },
            DegradationLevel::Enhanced => FeatureMatrix {
                animations: true,
                interactivity: true,
                dynamic_content: true,
                heavy_components: true,
                real_time_updates: false,
                advanced_charts: true,
            },
            DegradationLevel::Full => FeatureMatrix {
                animations: true,
                interactivity: true,
                dynamic_content: true,
                heavy_components: true,
                real_time_updates: true,
                advanced_charts: true,
            },
        }
    }

    /// Whether `feature` is enabled at this level.
    pub fn feature_enabled(&self, feature: Feature) -> bool {
        self.matrix().enabled(feature)
    }

    /// Chart subsystem mode at this level.
    pub fn chart_mode(&self) -> ChartMode {
        match self {
            DegradationLevel::Minimal | DegradationLevel::Basic => ChartMode::Text,
            DegradationLevel::Standard => ChartMode::Static,
            DegradationLevel::Enhanced | DegradationLevel::Full => ChartMode::Simple,
        }
    }

    /// Animation subsystem mode at this level.
    pub fn animation_mode(&self) -> AnimationMode {
        match self {
            DegradationLevel::Minimal | DegradationLevel::Basic => AnimationMode::None,
            DegradationLevel::Standard => AnimationMode::CssOnly,
            DegradationLevel::Enhanced | DegradationLevel::Full => AnimationMode::Reduced,
        }
    }

    /// Interaction subsystem mode at this level.
    pub fn interaction_mode(&self) -> InteractionMode {
        match self {
            DegradationLevel::Minimal | DegradationLevel::Basic => InteractionMode::Basic,
            DegradationLevel::Standard | DegradationLevel::Enhanced => InteractionMode::Enhanced,
            DegradationLevel::Full => InteractionMode::Full,
        }
    }
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DegradationLevel::Minimal => "minimal",
            DegradationLevel::Basic => "basic",
            DegradationLevel::Standard => "standard",
            DegradationLevel::Enhanced => "enhanced",
            DegradationLevel::Full => "full",
        };
        write!(f, "{name}")
    }
}

/// Select the degradation level for a profile.
///
/// An order-sensitive predicate chain, evaluated top to bottom; the first
/// matching predicate wins.
pub fn select_level(profile: &CapabilityProfile) -> DegradationLevel {
    let score = profile.performance_score;
    let slow = profile.slow_network();

    if !profile.scripting {
        return DegradationLevel::Minimal;
    }

    if score < BASIC_SCORE_THRESHOLD
        || profile.low_battery_not_charging()
        || (slow && profile.save_data)
    {
        return DegradationLevel::Basic;
    }

    if score < STANDARD_SCORE_THRESHOLD || slow || profile.save_data {
        return DegradationLevel::Standard;
    }

    if score < ENHANCED_SCORE_THRESHOLD || profile.reduced_motion {
        return DegradationLevel::Enhanced;
    }

    DegradationLevel::Full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BatteryStatus, MediaSupport, NetworkClass};
    use proptest::prelude::*;

    /// Build a profile directly, bypassing the score formula, so the ladder
    /// can be exercised over the full [0,100] range.
    fn profile_with(
        score: u8,
        effective: NetworkClass,
        save_data: bool,
        battery: Option<BatteryStatus>,
        reduced_motion: bool,
        scripting: bool,
    ) -> CapabilityProfile {
        CapabilityProfile {
            memory_gb: 4.0,
            cores: 4,
            gpu_present: true,
            connection: effective,
            effective_connection: effective,
            downlink_mbps: 5.0,
            rtt_ms: 100,
            save_data,
            media: MediaSupport::default(),
            scripting,
            battery,
            reduced_motion,
            high_contrast: false,
            recent_navigation_ms: None,
            performance_score: score,
            can_animate: false,
            can_handle_heavy: false,
            should_preload: false,
            max_concurrent_requests: 2,
        }
    }

    #[test]
    fn test_no_scripting_is_minimal() {
        let profile = profile_with(95, NetworkClass::FourG, false, None, false, false);
        assert_eq!(select_level(&profile), DegradationLevel::Minimal);
    }

    #[test]
    fn test_low_score_save_data_is_basic() {
        // Spec scenario: score 25 + save-data ⇒ basic, text charts, no animation.
        let profile = profile_with(25, NetworkClass::ThreeG, true, None, false, true);
        let level = select_level(&profile);

        assert_eq!(level, DegradationLevel::Basic);
        assert_eq!(level.chart_mode(), ChartMode::Text);
        assert!(!level.feature_enabled(Feature::Animations));
    }

    #[test]
    fn test_low_battery_not_charging_is_basic() {
        let battery = BatteryStatus {
            level: 0.1,
            charging: false,
        };
        let profile = profile_with(90, NetworkClass::FourG, false, Some(battery), false, true);
        assert_eq!(select_level(&profile), DegradationLevel::Basic);
    }

    #[test]
    fn test_low_battery_charging_is_not_basic() {
        let battery = BatteryStatus {
            level: 0.1,
            charging: true,
        };
        let profile = profile_with(90, NetworkClass::FourG, false, Some(battery), false, true);
        assert_eq!(select_level(&profile), DegradationLevel::Full);
    }

    #[test]
    fn test_slow_network_is_standard() {
        let profile = profile_with(85, NetworkClass::TwoG, false, None, false, true);
        assert_eq!(select_level(&profile), DegradationLevel::Standard);
    }

    #[test]
    fn test_slow_network_with_save_data_is_basic() {
        let profile = profile_with(85, NetworkClass::TwoG, true, None, false, true);
        assert_eq!(select_level(&profile), DegradationLevel::Basic);
    }

    #[test]
    fn test_reduced_motion_caps_at_enhanced() {
        let profile = profile_with(95, NetworkClass::FourG, false, None, true, true);
        assert_eq!(select_level(&profile), DegradationLevel::Enhanced);
    }

    #[test]
    fn test_unconstrained_is_full() {
        let profile = profile_with(85, NetworkClass::FourG, false, None, false, true);
        assert_eq!(select_level(&profile), DegradationLevel::Full);
    }

    #[test]
    fn test_score_boundaries() {
        let level_at = |score| {
            select_level(&profile_with(
                score,
                NetworkClass::FourG,
                false,
                None,
                false,
                true,
            ))
        };

        assert_eq!(level_at(29), DegradationLevel::Basic);
        assert_eq!(level_at(30), DegradationLevel::Standard);
        assert_eq!(level_at(49), DegradationLevel::Standard);
        assert_eq!(level_at(50), DegradationLevel::Enhanced);
        assert_eq!(level_at(69), DegradationLevel::Enhanced);
        assert_eq!(level_at(70), DegradationLevel::Full);
    }

    #[test]
    fn test_level_ordering() {
        assert!(DegradationLevel::Minimal < DegradationLevel::Basic);
        assert!(DegradationLevel::Basic < DegradationLevel::Standard);
        assert!(DegradationLevel::Standard < DegradationLevel::Enhanced);
        assert!(DegradationLevel::Enhanced < DegradationLevel::Full);
    }

    proptest! {
        /// Raising the score while holding every other input fixed never
        /// moves to a lower tier.
        #[test]
        fn ladder_is_monotonic_in_score(
            lo in 0u8..=100,
            hi in 0u8..=100,
            network in 0u8..4,
            save_data in proptest::bool::ANY,
            battery_level in proptest::option::of(0.0f32..1.0),
            charging in proptest::bool::ANY,
            reduced_motion in proptest::bool::ANY,
        ) {
            prop_assume!(lo <= hi);
            let effective = match network {
                0 => NetworkClass::Slow2g,
                1 => NetworkClass::TwoG,
                2 => NetworkClass::ThreeG,
                _ => NetworkClass::FourG,
            };
            let battery = battery_level.map(|level| BatteryStatus { level, charging });

            let low = select_level(&profile_with(lo, effective, save_data, battery, reduced_motion, true));
            let high = select_level(&profile_with(hi, effective, save_data, battery, reduced_motion, true));
            prop_assert!(high >= low);
        }
    }
}
