//! CLI subcommand implementations.

pub mod config;
pub mod plan;
pub mod profile;

use clap::Args;
use tierflow::capability::{
    BatterySignals, CapabilityProbes, CapabilityProfile, NetworkClass, NetworkSignals,
    StaticProbes, SystemProbes,
};
use tierflow::config::ConfigFile;

/// Signal overrides shared by `profile` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct SignalArgs {
    /// Config file path (defaults to the platform config directory).
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Override exposed memory in GB.
    #[arg(long)]
    pub memory_gb: Option<f64>,

    /// Override logical core count.
    #[arg(long)]
    pub cores: Option<usize>,

    /// Override the effective network class (slow-2g|2g|3g|4g).
    #[arg(long)]
    pub network: Option<String>,

    /// Simulate an active reduced-data preference.
    #[arg(long)]
    pub save_data: bool,

    /// Simulate a reduced-motion preference.
    #[arg(long)]
    pub reduced_motion: bool,

    /// Simulate a battery level (0.0 - 1.0).
    #[arg(long)]
    pub battery: Option<f32>,

    /// Simulate external power.
    #[arg(long)]
    pub charging: bool,
}

impl SignalArgs {
    /// Resolve the capability profile: live hardware probe, then config
    /// file overrides, then command-line overrides.
    pub fn resolve_profile(&self) -> Result<CapabilityProfile, Box<dyn std::error::Error>> {
        let mut probes = StaticProbes::new();

        // Seed with the host machine's hardware where available.
        let system = SystemProbes::new();
        if let Ok(hardware) = system.hardware() {
            probes = probes.with_hardware(hardware);
        }

        let path = match &self.config {
            Some(path) => path.clone(),
            None => ConfigFile::default_path()?,
        };
        let file = ConfigFile::load_or_default(&path)?;
        probes = file.apply_probe_overrides(probes);

        let mut hardware = probes.hardware()?;
        if let Some(memory_gb) = self.memory_gb {
            hardware.memory_gb = memory_gb;
        }
        if let Some(cores) = self.cores {
            hardware.cores = cores;
        }
        probes = probes.with_hardware(hardware);

        let mut network = probes.network().unwrap_or_else(|_| NetworkSignals::conservative());
        if let Some(raw) = &self.network {
            let class = NetworkClass::parse(raw)
                .ok_or_else(|| format!("unknown network class '{raw}'"))?;
            network.connection = class;
            network.effective = class;
        }
        if self.save_data {
            network.save_data = true;
        }
        probes = probes.with_network(network);

        if self.reduced_motion {
            let mut preferences = probes.preferences().unwrap_or_default();
            preferences.reduced_motion = true;
            probes = probes.with_preferences(preferences);
        }

        if let Some(level) = self.battery {
            probes = probes.with_battery(BatterySignals {
                level,
                charging: self.charging,
            });
        }

        let profiler = tierflow::capability::CapabilityProfiler::new(std::sync::Arc::new(probes));
        Ok((*profiler.profile()).clone())
    }
}
