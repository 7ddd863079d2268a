//! The immutable capability snapshot and its derived traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::probes::{
    BatterySignals, HardwareSignals, MediaSignals, NetworkSignals, PreferenceSignals,
};
use super::score::compute_score;

/// Battery level at or below which the device counts as low-battery.
pub const LOW_BATTERY_LEVEL: f32 = 0.2;

/// Score above which animation is considered affordable.
pub const ANIMATION_SCORE_THRESHOLD: u8 = 40;

/// Score above which heavy components are considered affordable.
pub const HEAVY_SCORE_THRESHOLD: u8 = 60;

/// Score above which preloading is considered worthwhile.
pub const PRELOAD_SCORE_THRESHOLD: u8 = 50;

/// Network connection class, coarsest-useful granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkClass {
    /// Sub-2G effective bandwidth.
    Slow2g,
    /// 2G-class connection.
    TwoG,
    /// 3G-class connection.
    ThreeG,
    /// 4G-class (or better) connection.
    FourG,
}

impl NetworkClass {
    /// Whether this class counts as a slow network for degradation purposes.
    pub fn is_slow(&self) -> bool {
        matches!(self, NetworkClass::Slow2g | NetworkClass::TwoG)
    }

    /// Parse the standard effective-connection-type token.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "slow-2g" => Some(NetworkClass::Slow2g),
            "2g" => Some(NetworkClass::TwoG),
            "3g" => Some(NetworkClass::ThreeG),
            "4g" => Some(NetworkClass::FourG),
            _ => None,
        }
    }
}

impl std::fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            NetworkClass::Slow2g => "slow-2g",
            NetworkClass::TwoG => "2g",
            NetworkClass::ThreeG => "3g",
            NetworkClass::FourG => "4g",
        };
        write!(f, "{token}")
    }
}

/// Media/API feature support flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSupport {
    /// Modern image codecs (AVIF/WebP-class) decode support.
    pub modern_codecs: bool,
    /// Hardware-accelerated rendering surface available.
    pub webgl: bool,
    /// Background worker/service-worker support.
    pub service_worker: bool,
    /// Viewport intersection observation support.
    pub intersection_observer: bool,
}

/// Battery state at profiling time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge level in [0.0, 1.0].
    pub level: f32,
    /// Whether the device is on external power.
    pub charging: bool,
}

impl BatteryStatus {
    /// Low battery and not charging.
    pub fn is_critical(&self) -> bool {
        self.level <= LOW_BATTERY_LEVEL && !self.charging
    }
}

/// Immutable snapshot of device/network/runtime capability.
///
/// Built once per session by [`super::CapabilityProfiler`]; the derived
/// booleans are computed at construction so consumers never re-derive
/// thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Exposed device memory in GB.
    pub memory_gb: f64,
    /// Logical CPU cores.
    pub cores: usize,
    /// Whether a GPU rendering path is available.
    pub gpu_present: bool,
    /// Declared connection class.
    pub connection: NetworkClass,
    /// Measured effective connection class.
    pub effective_connection: NetworkClass,
    /// Estimated downlink in Mbps.
    pub downlink_mbps: f64,
    /// Estimated round-trip time in milliseconds.
    pub rtt_ms: u32,
    /// User has requested reduced data usage.
    pub save_data: bool,
    /// Media/API feature support.
    pub media: MediaSupport,
    /// Whether a scripting runtime is available at all.
    pub scripting: bool,
    /// Battery state, if the platform exposes one.
    pub battery: Option<BatteryStatus>,
    /// User prefers reduced motion.
    pub reduced_motion: bool,
    /// User prefers high contrast.
    pub high_contrast: bool,
    /// Most recent full navigation duration, if measured.
    pub recent_navigation_ms: Option<u64>,
    /// Composite performance score in [0, 100].
    pub performance_score: u8,

    // Derived capability flags, fixed at construction.
    /// Animation is affordable and wanted.
    pub can_animate: bool,
    /// Heavy components (charts, media-rich widgets) are affordable.
    pub can_handle_heavy: bool,
    /// Preloading beyond the critical path is worthwhile.
    pub should_preload: bool,
    /// Concurrency cap for outbound requests.
    pub max_concurrent_requests: usize,
}

impl CapabilityProfile {
    /// Assemble a profile from probe signals.
    ///
    /// The score and every derived boolean are fixed here; the resulting
    /// snapshot is never mutated.
    pub fn from_signals(
        hardware: HardwareSignals,
        network: NetworkSignals,
        media: MediaSignals,
        preferences: PreferenceSignals,
        battery: Option<BatterySignals>,
        navigation: Option<Duration>,
        scripting: bool,
    ) -> Self {
        let recent_navigation_ms = navigation.map(|d| d.as_millis() as u64);
        let score = compute_score(
            hardware.memory_gb,
            hardware.cores,
            network.effective,
            recent_navigation_ms,
        );

        let battery = battery.map(|b| BatteryStatus {
            level: b.level,
            charging: b.charging,
        });

        let battery_allows_animation = match battery {
            None => true,
            Some(b) => b.level > LOW_BATTERY_LEVEL,
        };

        let can_animate = score > ANIMATION_SCORE_THRESHOLD
            && !preferences.reduced_motion
            && !network.save_data
            && battery_allows_animation;

        let can_handle_heavy =
            score > HEAVY_SCORE_THRESHOLD && hardware.memory_gb >= 4.0 && hardware.cores >= 4;

        let should_preload =
            score > PRELOAD_SCORE_THRESHOLD && !network.save_data && !network.effective.is_slow();

        let max_concurrent_requests = concurrency_for(score, network.effective);

        Self {
            memory_gb: hardware.memory_gb,
            cores: hardware.cores,
            gpu_present: hardware.gpu_present,
            connection: network.connection,
            effective_connection: network.effective,
            downlink_mbps: network.downlink_mbps,
            rtt_ms: network.rtt_ms,
            save_data: network.save_data,
            media,
            scripting,
            battery,
            reduced_motion: preferences.reduced_motion,
            high_contrast: preferences.high_contrast,
            recent_navigation_ms,
            performance_score: score,
            can_animate,
            can_handle_heavy,
            should_preload,
            max_concurrent_requests,
        }
    }

    /// Whether the effective connection counts as slow.
    pub fn slow_network(&self) -> bool {
        self.effective_connection.is_slow()
    }

    /// Low battery and not on external power.
    pub fn low_battery_not_charging(&self) -> bool {
        self.battery.map(|b| b.is_critical()).unwrap_or(false)
    }
}

/// Concurrency cap from score and network class.
fn concurrency_for(score: u8, effective: NetworkClass) -> usize {
    let by_score = match score {
        s if s >= 70 => 6,
        s if s >= 50 => 4,
        s if s >= 30 => 2,
        _ => 1,
    };
    if effective.is_slow() {
        by_score.min(2)
    } else {
        by_score
    }
}
