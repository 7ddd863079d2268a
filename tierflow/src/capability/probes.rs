//! Capability probe port and built-in implementations.
//!
//! Probing is split into signal groups so one failing probe degrades only
//! its own signal: the profiler substitutes a conservative default for that
//! group and keeps going. Probes are synchronous by design — the short
//! async probes of the original platform (codec decode tests, battery
//! status) are resolved by the host before it hands signals over.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub use super::profile::MediaSupport;
use super::profile::NetworkClass;

/// Media probe signals; identical shape to the stored support flags.
pub type MediaSignals = MediaSupport;

/// A capability probe failed.
///
/// Non-fatal by contract: the profiler falls back to a conservative default
/// for the failed signal group only.
#[derive(Debug, Error)]
#[error("capability probe '{probe}' failed: {reason}")]
pub struct ProbeError {
    /// Which probe failed.
    pub probe: &'static str,
    /// Human-readable failure reason.
    pub reason: String,
}

impl ProbeError {
    /// Create a probe error for the named probe.
    pub fn new(probe: &'static str, reason: impl Into<String>) -> Self {
        Self {
            probe,
            reason: reason.into(),
        }
    }
}

/// Hardware signal group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareSignals {
    /// Exposed device memory in GB.
    pub memory_gb: f64,
    /// Logical CPU cores.
    pub cores: usize,
    /// GPU rendering path available.
    pub gpu_present: bool,
}

impl HardwareSignals {
    /// Conservative fallback when the hardware probe fails.
    pub fn conservative() -> Self {
        Self {
            memory_gb: 2.0,
            cores: 2,
            gpu_present: false,
        }
    }
}

/// Network signal group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSignals {
    /// Declared connection class.
    pub connection: NetworkClass,
    /// Measured effective connection class.
    pub effective: NetworkClass,
    /// Estimated downlink in Mbps.
    pub downlink_mbps: f64,
    /// Estimated round-trip time in milliseconds.
    pub rtt_ms: u32,
    /// Reduced-data preference.
    pub save_data: bool,
}

impl NetworkSignals {
    /// Conservative fallback when the network probe fails.
    ///
    /// Assumes a mid-range mobile connection rather than the worst case so
    /// a single probe failure does not collapse the whole experience.
    pub fn conservative() -> Self {
        Self {
            connection: NetworkClass::ThreeG,
            effective: NetworkClass::ThreeG,
            downlink_mbps: 1.5,
            rtt_ms: 300,
            save_data: false,
        }
    }
}

/// Preference signal group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreferenceSignals {
    /// User prefers reduced motion.
    pub reduced_motion: bool,
    /// User prefers high contrast.
    pub high_contrast: bool,
}

/// Battery signal group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySignals {
    /// Charge level in [0.0, 1.0].
    pub level: f32,
    /// On external power.
    pub charging: bool,
}

/// Port supplying raw capability signals.
///
/// Implementations must be cheap enough to call a handful of times per
/// session; results are cached by the profiler, not by the probes.
///
/// # Implementors
///
/// - [`SystemProbes`] — host-machine hardware via `sysinfo`, conservative
///   defaults for signals the process cannot observe
/// - [`StaticProbes`] — fully configured values for tests and the CLI
pub trait CapabilityProbes: Send + Sync {
    /// Probe hardware traits (memory, cores, GPU).
    fn hardware(&self) -> Result<HardwareSignals, ProbeError>;

    /// Probe network traits (class, downlink, RTT, save-data).
    fn network(&self) -> Result<NetworkSignals, ProbeError>;

    /// Probe media/API support flags.
    fn media(&self) -> Result<MediaSignals, ProbeError>;

    /// Probe user preferences (reduced motion, contrast).
    fn preferences(&self) -> Result<PreferenceSignals, ProbeError>;

    /// Probe battery state. `Ok(None)` means the platform exposes none.
    fn battery(&self) -> Result<Option<BatterySignals>, ProbeError>;

    /// Duration of the most recent full navigation, if measured.
    fn navigation_timing(&self) -> Result<Option<Duration>, ProbeError>;

    /// Whether a scripting runtime is available at all.
    ///
    /// Defaults to true; only hosts embedding the engine in a no-script
    /// delivery context override this.
    fn scripting(&self) -> bool {
        true
    }
}

/// Resolve one probe result, logging and substituting the fallback on error.
pub(crate) fn probe_or<T>(result: Result<T, ProbeError>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(probe = e.probe, reason = %e.reason, "Probe failed, using conservative default");
            fallback
        }
    }
}

// =============================================================================
// System probes
// =============================================================================

/// Probes backed by the host machine.
///
/// Hardware comes from `sysinfo`; network, media, preferences and battery
/// cannot be observed from a bare process, so this implementation reports
/// the conservative defaults for those groups. Hosts with richer platform
/// access supply their own [`CapabilityProbes`].
#[derive(Debug, Default)]
pub struct SystemProbes;

impl SystemProbes {
    /// Create the system probe set.
    pub fn new() -> Self {
        Self
    }
}

impl CapabilityProbes for SystemProbes {
    fn hardware(&self) -> Result<HardwareSignals, ProbeError> {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        system.refresh_cpu_all();

        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return Err(ProbeError::new("hardware", "sysinfo reported zero memory"));
        }

        Ok(HardwareSignals {
            memory_gb: total_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
            cores: system.cpus().len().max(1),
            gpu_present: false,
        })
    }

    fn network(&self) -> Result<NetworkSignals, ProbeError> {
        Ok(NetworkSignals::conservative())
    }

    fn media(&self) -> Result<MediaSignals, ProbeError> {
        Ok(MediaSignals::default())
    }

    fn preferences(&self) -> Result<PreferenceSignals, ProbeError> {
        Ok(PreferenceSignals::default())
    }

    fn battery(&self) -> Result<Option<BatterySignals>, ProbeError> {
        Ok(None)
    }

    fn navigation_timing(&self) -> Result<Option<Duration>, ProbeError> {
        Ok(None)
    }
}

// =============================================================================
// Static probes
// =============================================================================

/// Fully configured probe set for tests and the CLI.
///
/// Every signal is supplied up front; builder methods override individual
/// groups from the conservative baseline.
#[derive(Debug, Clone)]
pub struct StaticProbes {
    hardware: HardwareSignals,
    network: NetworkSignals,
    media: MediaSignals,
    preferences: PreferenceSignals,
    battery: Option<BatterySignals>,
    navigation: Option<Duration>,
    scripting: bool,
}

impl Default for StaticProbes {
    fn default() -> Self {
        Self {
            hardware: HardwareSignals::conservative(),
            network: NetworkSignals::conservative(),
            media: MediaSignals::default(),
            preferences: PreferenceSignals::default(),
            battery: None,
            navigation: None,
            scripting: true,
        }
    }
}

impl StaticProbes {
    /// Start from the conservative baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set hardware signals.
    pub fn with_hardware(mut self, hardware: HardwareSignals) -> Self {
        self.hardware = hardware;
        self
    }

    /// Set network signals.
    pub fn with_network(mut self, network: NetworkSignals) -> Self {
        self.network = network;
        self
    }

    /// Set media support flags.
    pub fn with_media(mut self, media: MediaSignals) -> Self {
        self.media = media;
        self
    }

    /// Set user preferences.
    pub fn with_preferences(mut self, preferences: PreferenceSignals) -> Self {
        self.preferences = preferences;
        self
    }

    /// Set battery state.
    pub fn with_battery(mut self, battery: BatterySignals) -> Self {
        self.battery = Some(battery);
        self
    }

    /// Set the recent navigation duration.
    pub fn with_navigation(mut self, duration: Duration) -> Self {
        self.navigation = Some(duration);
        self
    }

    /// Set scripting availability.
    pub fn with_scripting(mut self, scripting: bool) -> Self {
        self.scripting = scripting;
        self
    }
}

impl CapabilityProbes for StaticProbes {
    fn hardware(&self) -> Result<HardwareSignals, ProbeError> {
        Ok(self.hardware)
    }

    fn network(&self) -> Result<NetworkSignals, ProbeError> {
        Ok(self.network)
    }

    fn media(&self) -> Result<MediaSignals, ProbeError> {
        Ok(self.media)
    }

    fn preferences(&self) -> Result<PreferenceSignals, ProbeError> {
        Ok(self.preferences)
    }

    fn battery(&self) -> Result<Option<BatterySignals>, ProbeError> {
        Ok(self.battery)
    }

    fn navigation_timing(&self) -> Result<Option<Duration>, ProbeError> {
        Ok(self.navigation)
    }

    fn scripting(&self) -> bool {
        self.scripting
    }
}

// =============================================================================
// Test fixtures
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProbes;

    impl CapabilityProbes for FailingProbes {
        fn hardware(&self) -> Result<HardwareSignals, ProbeError> {
            Err(ProbeError::new("hardware", "unavailable"))
        }
        fn network(&self) -> Result<NetworkSignals, ProbeError> {
            Err(ProbeError::new("network", "unavailable"))
        }
        fn media(&self) -> Result<MediaSignals, ProbeError> {
            Err(ProbeError::new("media", "unavailable"))
        }
        fn preferences(&self) -> Result<PreferenceSignals, ProbeError> {
            Err(ProbeError::new("preferences", "unavailable"))
        }
        fn battery(&self) -> Result<Option<BatterySignals>, ProbeError> {
            Err(ProbeError::new("battery", "unavailable"))
        }
        fn navigation_timing(&self) -> Result<Option<Duration>, ProbeError> {
            Err(ProbeError::new("navigation", "unavailable"))
        }
    }

    #[test]
    fn test_probe_or_uses_value_on_success() {
        let signals = probe_or(
            Ok(test_signals::strong_hardware()),
            HardwareSignals::conservative(),
        );
        assert_eq!(signals.cores, 8);
    }

    #[test]
    fn test_probe_or_falls_back_on_error() {
        let probes = FailingProbes;
        let signals = probe_or(probes.hardware(), HardwareSignals::conservative());
        assert_eq!(signals, HardwareSignals::conservative());
    }

    #[test]
    fn test_system_probes_hardware() {
        let probes = SystemProbes::new();
        let hardware = probes.hardware().expect("host should expose hardware");
        assert!(hardware.cores >= 1);
        assert!(hardware.memory_gb > 0.0);
    }

    #[test]
    fn test_static_probes_builder() {
        let probes = StaticProbes::new()
            .with_hardware(test_signals::strong_hardware())
            .with_battery(BatterySignals {
                level: 0.5,
                charging: true,
            })
            .with_scripting(false);

        assert_eq!(probes.hardware().unwrap().cores, 8);
        assert_eq!(probes.battery().unwrap().unwrap().level, 0.5);
        assert!(!probes.scripting());
    }

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError::new("battery", "not exposed");
        assert!(err.to_string().contains("battery"));
        assert!(err.to_string().contains("not exposed"));
    }
}
