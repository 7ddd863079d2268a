//! Load policy derived from the capability profile.
//!
//! A [`LoadPolicy`] is a pure function of the profile: same snapshot, same
//! policy. It packages the tuning knobs the delivery layers consume so they
//! never reach back into raw signals.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::profile::CapabilityProfile;

/// Image quality tier to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,
    Medium,
    High,
}

/// Preferred image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Modern codec (AVIF/WebP-class).
    Modern,
    /// Broadly compatible legacy format.
    Legacy,
}

/// How eagerly predicted resources may be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchAggressiveness {
    Off,
    Conservative,
    Moderate,
    Aggressive,
}

/// Tuning knobs derived from one capability snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPolicy {
    /// Distance (in px) ahead of the viewport at which lazy content loads.
    pub lazy_load_distance_px: u32,
    /// Cap on concurrent outbound requests.
    pub max_concurrent_requests: usize,
    /// Whether animations run at all.
    pub animations_enabled: bool,
    /// Animation duration when enabled.
    pub animation_duration_ms: u32,
    /// Image quality tier.
    pub image_quality: ImageQuality,
    /// Preferred image format.
    pub image_format: ImageFormat,
    /// Prefetch eagerness.
    pub prefetch: PrefetchAggressiveness,
    /// Budget for total transferred size per view, in KB.
    pub max_view_size_kb: u32,
    /// Budget for view-ready time.
    pub max_view_time: Duration,
}

impl LoadPolicy {
    /// Derive the policy for a profile.
    pub fn for_profile(profile: &CapabilityProfile) -> Self {
        let score = profile.performance_score;

        let lazy_load_distance_px = if profile.should_preload { 600 } else { 200 };

        let image_quality = if profile.save_data || profile.slow_network() {
            ImageQuality::Low
        } else if score >= 70 {
            ImageQuality::High
        } else {
            ImageQuality::Medium
        };

        let image_format = if profile.media.modern_codecs {
            ImageFormat::Modern
        } else {
            ImageFormat::Legacy
        };

        let prefetch = if profile.save_data || profile.slow_network() {
            PrefetchAggressiveness::Off
        } else if score >= 70 {
            PrefetchAggressiveness::Aggressive
        } else if score >= 50 {
            PrefetchAggressiveness::Moderate
        } else {
            PrefetchAggressiveness::Conservative
        };

        let (max_view_size_kb, max_view_time) = if score >= 70 {
            (1_500, Duration::from_millis(2_500))
        } else if score >= 50 {
            (900, Duration::from_millis(4_000))
        } else {
            (400, Duration::from_millis(6_000))
        };

        Self {
            lazy_load_distance_px,
            max_concurrent_requests: profile.max_concurrent_requests,
            animations_enabled: profile.can_animate,
            animation_duration_ms: if profile.can_animate { 200 } else { 0 },
            image_quality,
            image_format,
            prefetch,
            max_view_size_kb,
            max_view_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::probes::test_signals;

    #[test]
    fn test_capable_policy() {
        let policy = LoadPolicy::for_profile(&test_signals::capable_profile());

        assert!(policy.animations_enabled);
        assert_eq!(policy.image_quality, ImageQuality::High);
        assert_eq!(policy.image_format, ImageFormat::Modern);
        assert_eq!(policy.prefetch, PrefetchAggressiveness::Aggressive);
        assert_eq!(policy.max_concurrent_requests, 6);
        assert_eq!(policy.lazy_load_distance_px, 600);
    }

    #[test]
    fn test_constrained_policy() {
        let policy = LoadPolicy::for_profile(&test_signals::constrained_profile());

        assert_eq!(policy.image_quality, ImageQuality::Low);
        assert_eq!(policy.image_format, ImageFormat::Legacy);
        assert_eq!(policy.prefetch, PrefetchAggressiveness::Off);
        assert_eq!(policy.lazy_load_distance_px, 200);
        assert!(policy.max_view_size_kb <= 900);
    }

    #[test]
    fn test_policy_is_pure() {
        let profile = test_signals::capable_profile();
        assert_eq!(
            LoadPolicy::for_profile(&profile),
            LoadPolicy::for_profile(&profile)
        );
    }

    #[test]
    fn test_animation_duration_zero_when_disabled() {
        let policy = LoadPolicy::for_profile(&test_signals::constrained_profile());
        if !policy.animations_enabled {
            assert_eq!(policy.animation_duration_ms, 0);
        }
    }
}
