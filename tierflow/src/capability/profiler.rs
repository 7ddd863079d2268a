//! Once-per-session profile computation with atomic reset.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::probes::{
    probe_or, BatterySignals, CapabilityProbes, HardwareSignals, MediaSignals, NetworkSignals,
    PreferenceSignals,
};
use super::profile::CapabilityProfile;

/// Computes and caches the session's [`CapabilityProfile`].
///
/// The profile is built lazily on first access and then cached for the
/// whole session. [`CapabilityProfiler::reset`] recomputes from fresh probe
/// signals and swaps the cached snapshot in one store — concurrent readers
/// observe either the old or the new profile, never a partial update.
pub struct CapabilityProfiler {
    probes: Arc<dyn CapabilityProbes>,
    current: RwLock<Option<Arc<CapabilityProfile>>>,
}

impl CapabilityProfiler {
    /// Create a profiler over the injected probe port.
    pub fn new(probes: Arc<dyn CapabilityProbes>) -> Self {
        Self {
            probes,
            current: RwLock::new(None),
        }
    }

    /// The session profile, computing it on first access.
    pub fn profile(&self) -> Arc<CapabilityProfile> {
        if let Some(profile) = self.current.read().as_ref() {
            return Arc::clone(profile);
        }

        let mut guard = self.current.write();
        // Another caller may have computed it while we waited for the lock.
        if let Some(profile) = guard.as_ref() {
            return Arc::clone(profile);
        }

        let profile = Arc::new(self.compute());
        *guard = Some(Arc::clone(&profile));
        profile
    }

    /// Discard the cached profile and recompute from fresh signals.
    ///
    /// The swap is atomic with respect to [`CapabilityProfiler::profile`].
    pub fn reset(&self) -> Arc<CapabilityProfile> {
        let profile = Arc::new(self.compute());
        *self.current.write() = Some(Arc::clone(&profile));
        info!(
            score = profile.performance_score,
            effective = %profile.effective_connection,
            "Capability profile recomputed"
        );
        profile
    }

    /// Whether a profile has been computed this session.
    pub fn is_computed(&self) -> bool {
        self.current.read().is_some()
    }

    fn compute(&self) -> CapabilityProfile {
        let hardware = probe_or(self.probes.hardware(), HardwareSignals::conservative());
        let network = probe_or(self.probes.network(), NetworkSignals::conservative());
        let media = probe_or(self.probes.media(), MediaSignals::default());
        let preferences = probe_or(self.probes.preferences(), PreferenceSignals::default());
        let battery: Option<BatterySignals> = probe_or(self.probes.battery(), None);
        let navigation = probe_or(self.probes.navigation_timing(), None);
        let scripting = self.probes.scripting();

        let profile = CapabilityProfile::from_signals(
            hardware,
            network,
            media,
            preferences,
            battery,
            navigation,
            scripting,
        );
        debug!(
            score = profile.performance_score,
            memory_gb = profile.memory_gb,
            cores = profile.cores,
            "Capability profile computed"
        );
        profile
    }
}
