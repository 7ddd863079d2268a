//! Engine configuration combining all component configs.

use crate::cache::CacheConfig;
use crate::config::ConfigFile;
use crate::governor::{GovernorConfig, PerformanceBudget};
use crate::prefetch::PrefetchConfig;

/// Default prefetch routes per session phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseRoutes {
    /// Suggested early in a session.
    pub early: Vec<String>,
    /// Suggested mid-session.
    pub mid: Vec<String>,
    /// Suggested late in a session.
    pub late: Vec<String>,
}

/// Top-level configuration passed to
/// [`DeliveryEngine::start`](super::DeliveryEngine::start).
///
/// Provides one configuration surface so all components are configured
/// consistently.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Response cache table.
    pub cache: CacheConfig,
    /// Prefetcher tuning.
    pub prefetch: PrefetchConfig,
    /// Governor budget, rules and log cap.
    pub governor: GovernorConfig,
    /// Static prefetch pattern table: route → resource keys.
    pub patterns: Vec<(String, Vec<String>)>,
    /// Session-phase default prefetch routes.
    pub phase_routes: PhaseRoutes,
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine config from a loaded configuration file.
    ///
    /// Keeps the translation logic in one place rather than scattered in
    /// host code: the file's cache defaults become the default route
    /// config, and the budget follows the configured environment.
    pub fn from_config_file(file: &ConfigFile) -> Self {
        Self {
            cache: CacheConfig::new().with_default(file.default_route_config()),
            governor: GovernorConfig {
                budget: PerformanceBudget::for_environment(file.environment()),
                ..GovernorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Add a static prefetch pattern.
    pub fn with_pattern(mut self, route: impl Into<String>, keys: &[&str]) -> Self {
        self.patterns
            .push((route.into(), keys.iter().map(|k| k.to_string()).collect()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::Environment;

    #[test]
    fn test_from_config_file_uses_environment_budget() {
        let mut file = ConfigFile::default();
        file.budget.environment = Some(Environment::Development);

        let config = EngineConfig::from_config_file(&file);
        assert_eq!(
            config.governor.budget,
            PerformanceBudget::for_environment(Environment::Development)
        );
    }

    #[test]
    fn test_with_pattern() {
        let config = EngineConfig::new().with_pattern("/home", &["/api/feed"]);
        assert_eq!(config.patterns.len(), 1);
        assert_eq!(config.patterns[0].1, vec!["/api/feed"]);
    }
}
