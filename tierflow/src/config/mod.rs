//! INI configuration file for hosts and the CLI.
//!
//! The file covers the tunables a deployment actually edits: probe
//! overrides, cache defaults and the budget environment. Component configs
//! keep their own `Default` impls; this module only translates what the
//! file specifies.
//!
//! ```ini
//! [probe]
//! memory_gb = 8
//! cores = 4
//! network = 4g
//! save_data = false
//!
//! [cache]
//! ttl_secs = 60
//! max_entries = 100
//! stale_while_revalidate = true
//!
//! [budget]
//! environment = production
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::capability::{
    CapabilityProbes, HardwareSignals, NetworkClass, NetworkSignals, StaticProbes,
};
use crate::cache::RouteConfig;
use crate::governor::Environment;

/// Default config file name under the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid INI.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A value is present but not usable.
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue {
        /// Offending key.
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The platform config directory could not be resolved.
    #[error("No platform config directory")]
    NoConfigDir,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Probe overrides ([probe] section).
    pub probe: ProbeSection,
    /// Cache defaults ([cache] section).
    pub cache: CacheSection,
    /// Budget environment ([budget] section).
    pub budget: BudgetSection,
}

/// Probe overrides; unset fields fall back to live probing.
#[derive(Debug, Clone, Default)]
pub struct ProbeSection {
    pub memory_gb: Option<f64>,
    pub cores: Option<usize>,
    pub network: Option<NetworkClass>,
    pub save_data: Option<bool>,
    pub reduced_motion: Option<bool>,
    pub battery_level: Option<f32>,
    pub charging: Option<bool>,
}

/// Cache defaults applied to the default route config.
#[derive(Debug, Clone, Default)]
pub struct CacheSection {
    pub ttl_secs: Option<u64>,
    pub max_entries: Option<usize>,
    pub stale_while_revalidate: Option<bool>,
}

/// Budget environment selection.
#[derive(Debug, Clone, Default)]
pub struct BudgetSection {
    pub environment: Option<Environment>,
}

impl ConfigFile {
    /// The default config path: `<config dir>/tierflow/config.ini`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("tierflow").join(CONFIG_FILE_NAME))
    }

    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(io) => ConfigError::Io(io),
            ini::Error::Parse(p) => ConfigError::Parse(p.to_string()),
        })?;
        Self::from_ini(&ini)
    }

    /// Load the config file if it exists; defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write a commented template to `path`.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, TEMPLATE)?;
        Ok(())
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("probe")) {
            config.probe.memory_gb = parse_opt(section.get("memory_gb"), "probe.memory_gb")?;
            config.probe.cores = parse_opt(section.get("cores"), "probe.cores")?;
            config.probe.network = match section.get("network") {
                None => None,
                Some(raw) => Some(NetworkClass::parse(raw).ok_or(ConfigError::InvalidValue {
                    key: "probe.network",
                    value: raw.to_string(),
                })?),
            };
            config.probe.save_data = parse_opt(section.get("save_data"), "probe.save_data")?;
            config.probe.reduced_motion =
                parse_opt(section.get("reduced_motion"), "probe.reduced_motion")?;
            config.probe.battery_level =
                parse_opt(section.get("battery_level"), "probe.battery_level")?;
            config.probe.charging = parse_opt(section.get("charging"), "probe.charging")?;
        }

        if let Some(section) = ini.section(Some("cache")) {
            config.cache.ttl_secs = parse_opt(section.get("ttl_secs"), "cache.ttl_secs")?;
            config.cache.max_entries = parse_opt(section.get("max_entries"), "cache.max_entries")?;
            config.cache.stale_while_revalidate = parse_opt(
                section.get("stale_while_revalidate"),
                "cache.stale_while_revalidate",
            )?;
        }

        if let Some(section) = ini.section(Some("budget")) {
            config.budget.environment = match section.get("environment") {
                None => None,
                Some("development") => Some(Environment::Development),
                Some("staging") => Some(Environment::Staging),
                Some("production") => Some(Environment::Production),
                Some(other) => {
                    return Err(ConfigError::InvalidValue {
                        key: "budget.environment",
                        value: other.to_string(),
                    })
                }
            };
        }

        Ok(config)
    }

    /// Apply probe overrides on top of a baseline probe set.
    pub fn apply_probe_overrides(&self, baseline: StaticProbes) -> StaticProbes {
        let mut probes = baseline;

        if self.probe.memory_gb.is_some() || self.probe.cores.is_some() {
            let current = probes
                .hardware()
                .unwrap_or_else(|_| HardwareSignals::conservative());
            probes = probes.with_hardware(HardwareSignals {
                memory_gb: self.probe.memory_gb.unwrap_or(current.memory_gb),
                cores: self.probe.cores.unwrap_or(current.cores),
                gpu_present: current.gpu_present,
            });
        }

        if self.probe.network.is_some() || self.probe.save_data.is_some() {
            let current = probes
                .network()
                .unwrap_or_else(|_| NetworkSignals::conservative());
            let class = self.probe.network.unwrap_or(current.effective);
            probes = probes.with_network(NetworkSignals {
                connection: class,
                effective: class,
                save_data: self.probe.save_data.unwrap_or(current.save_data),
                ..current
            });
        }

        if let Some(reduced_motion) = self.probe.reduced_motion {
            let mut preferences = probes.preferences().unwrap_or_default();
            preferences.reduced_motion = reduced_motion;
            probes = probes.with_preferences(preferences);
        }

        if let Some(level) = self.probe.battery_level {
            probes = probes.with_battery(crate::capability::BatterySignals {
                level,
                charging: self.probe.charging.unwrap_or(false),
            });
        }

        probes
    }

    /// The default route config with file overrides applied.
    pub fn default_route_config(&self) -> RouteConfig {
        let mut route = RouteConfig::default();
        if let Some(secs) = self.cache.ttl_secs {
            route.ttl = Duration::from_secs(secs);
        }
        if let Some(max_entries) = self.cache.max_entries {
            route.max_entries = max_entries;
        }
        if let Some(swr) = self.cache.stale_while_revalidate {
            route.stale_while_revalidate = swr;
        }
        route
    }

    /// The configured budget environment, defaulting to production.
    pub fn environment(&self) -> Environment {
        self.budget.environment.unwrap_or(Environment::Production)
    }
}

fn parse_opt<T: std::str::FromStr>(
    raw: Option<&str>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

const TEMPLATE: &str = "\
; Tierflow configuration
;
; Every key is optional; missing keys fall back to live probing or
; built-in defaults.

[probe]
; memory_gb = 8
; cores = 4
; network = 4g          ; slow-2g | 2g | 3g | 4g
; save_data = false
; reduced_motion = false
; battery_level = 0.9   ; 0.0 - 1.0
; charging = true

[cache]
; ttl_secs = 60
; max_entries = 100
; stale_while_revalidate = false

[budget]
; environment = production   ; development | staging | production
";

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let (_dir, path) = write_config(
            "[probe]\nmemory_gb = 8\ncores = 4\nnetwork = 4g\nsave_data = true\n\
             [cache]\nttl_secs = 120\nstale_while_revalidate = true\n\
             [budget]\nenvironment = staging\n",
        );

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.probe.memory_gb, Some(8.0));
        assert_eq!(config.probe.cores, Some(4));
        assert_eq!(config.probe.network, Some(NetworkClass::FourG));
        assert_eq!(config.probe.save_data, Some(true));
        assert_eq!(config.cache.ttl_secs, Some(120));
        assert_eq!(config.environment(), Environment::Staging);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_or_default(&dir.path().join("absent.ini")).unwrap();
        assert!(config.probe.memory_gb.is_none());
        assert_eq!(config.environment(), Environment::Production);
    }

    #[test]
    fn test_invalid_network_rejected() {
        let (_dir, path) = write_config("[probe]\nnetwork = 5g\n");
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "probe.network", .. }));
    }

    #[test]
    fn test_template_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        ConfigFile::write_template(&path).unwrap();
        let config = ConfigFile::load(&path).unwrap();

        // The template is all comments: everything stays default.
        assert!(config.probe.cores.is_none());
        assert!(config.cache.ttl_secs.is_none());
    }

    #[test]
    fn test_probe_overrides_apply() {
        let (_dir, path) = write_config("[probe]\nmemory_gb = 16\ncores = 8\nnetwork = 4g\n");
        let config = ConfigFile::load(&path).unwrap();

        let probes = config.apply_probe_overrides(StaticProbes::new());
        assert_eq!(probes.hardware().unwrap().memory_gb, 16.0);
        assert_eq!(probes.hardware().unwrap().cores, 8);
        assert_eq!(
            probes.network().unwrap().effective,
            NetworkClass::FourG
        );
    }

    #[test]
    fn test_default_route_config_overrides() {
        let (_dir, path) = write_config("[cache]\nttl_secs = 300\nmax_entries = 10\n");
        let config = ConfigFile::load(&path).unwrap();

        let route = config.default_route_config();
        assert_eq!(route.ttl, Duration::from_secs(300));
        assert_eq!(route.max_entries, 10);
        assert!(!route.stale_while_revalidate);
    }
}
