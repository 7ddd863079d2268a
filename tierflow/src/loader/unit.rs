//! Feature units, eligibility requirements and the registry.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::capability::{CapabilityProfile, NetworkClass};
use crate::degradation::{DegradationLevel, Feature};

/// Boxed future type for dyn-compatible async factories.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque loaded artifact handed to the host.
pub type Artifact = Arc<dyn Any + Send + Sync>;

/// Error type produced by unit factories.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Asynchronous artifact factory for one unit.
///
/// "Produce the artifact or fail" — retries, caching and fallback handling
/// all live in the loader, not in factories.
pub trait UnitFactory: Send + Sync {
    /// Run one load attempt.
    fn load(&self) -> BoxFuture<'static, Result<Artifact, FactoryError>>;
}

struct FnFactory<F>(F);

impl<F, Fut> UnitFactory for FnFactory<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Artifact, FactoryError>> + Send + 'static,
{
    fn load(&self) -> BoxFuture<'static, Result<Artifact, FactoryError>> {
        Box::pin((self.0)())
    }
}

/// Wrap an async closure as a [`UnitFactory`].
pub fn factory_fn<F, Fut>(f: F) -> Arc<dyn UnitFactory>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Artifact, FactoryError>> + Send + 'static,
{
    Arc::new(FnFactory(f))
}

/// Scheduling tier of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityTier {
    /// Must load for the page to function.
    Critical,
    /// Core experience, loads right after critical.
    Important,
    /// Nice-to-have enrichment.
    Enhancement,
    /// Only loaded on the most capable sessions.
    Optional,
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PriorityTier::Critical => "critical",
            PriorityTier::Important => "important",
            PriorityTier::Enhancement => "enhancement",
            PriorityTier::Optional => "optional",
        };
        write!(f, "{name}")
    }
}

/// Closed set of eligibility checks, evaluated by one dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// Always eligible.
    Always,
    /// Performance score must reach the threshold.
    ScoreAtLeast(u8),
    /// The degradation level must enable the feature.
    FeatureEnabled(Feature),
    /// Effective connection must be at least this class.
    NetworkAtLeast(NetworkClass),
    /// Battery level must exceed the threshold (absent signal passes).
    BatteryAbove(f32),
}

impl Requirement {
    /// Evaluate this requirement against the session state.
    pub fn satisfied(&self, profile: &CapabilityProfile, level: DegradationLevel) -> bool {
        match self {
            Requirement::Always => true,
            Requirement::ScoreAtLeast(threshold) => profile.performance_score >= *threshold,
            Requirement::FeatureEnabled(feature) => level.feature_enabled(*feature),
            Requirement::NetworkAtLeast(class) => profile.effective_connection >= *class,
            Requirement::BatteryAbove(threshold) => match profile.battery {
                None => true,
                Some(battery) => battery.level > *threshold,
            },
        }
    }
}

/// A registered, independently loadable feature.
///
/// Immutable after registration.
pub struct FeatureUnit {
    /// Unique unit name.
    pub name: String,
    /// Names of units that must settle before this one loads.
    pub dependencies: Vec<String>,
    /// Scheduling tier.
    pub tier: PriorityTier,
    /// Eligibility requirement.
    pub requirement: Requirement,
    /// Artifact substituted on terminal load failure.
    pub fallback: Option<Artifact>,
    factory: Arc<dyn UnitFactory>,
}

impl FeatureUnit {
    /// Create a unit with no dependencies at the Important tier.
    pub fn new(name: impl Into<String>, factory: Arc<dyn UnitFactory>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            tier: PriorityTier::Important,
            requirement: Requirement::Always,
            fallback: None,
            factory,
        }
    }

    /// Declare dependencies by name.
    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.dependencies = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the scheduling tier.
    pub fn tier(mut self, tier: PriorityTier) -> Self {
        self.tier = tier;
        self
    }

    /// Set the eligibility requirement.
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Set the fallback artifact.
    pub fn with_fallback(mut self, fallback: Artifact) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The unit's factory.
    pub fn factory(&self) -> &Arc<dyn UnitFactory> {
        &self.factory
    }
}

impl std::fmt::Debug for FeatureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureUnit")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("tier", &self.tier)
            .field("requirement", &self.requirement)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Errors from unit registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A unit with this name is already registered.
    #[error("unit '{0}' is already registered")]
    Duplicate(String),
}

/// The set of registered units.
#[derive(Default)]
pub struct UnitRegistry {
    units: RwLock<HashMap<String, Arc<FeatureUnit>>>,
}

impl UnitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit. Names are unique; re-registration is an error.
    pub fn register(&self, unit: FeatureUnit) -> Result<(), RegistryError> {
        let mut units = self.units.write();
        if units.contains_key(&unit.name) {
            return Err(RegistryError::Duplicate(unit.name));
        }
        units.insert(unit.name.clone(), Arc::new(unit));
        Ok(())
    }

    /// Look up a unit by name.
    pub fn get(&self, name: &str) -> Option<Arc<FeatureUnit>> {
        self.units.read().get(name).cloned()
    }

    /// Snapshot of all registered units.
    pub fn all(&self) -> Vec<Arc<FeatureUnit>> {
        let mut units: Vec<_> = self.units.read().values().cloned().collect();
        units.sort_by(|a, b| a.name.cmp(&b.name));
        units
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_units {
    //! Shared helpers for loader tests.

    use super::*;

    pub fn ok_factory(value: &'static str) -> Arc<dyn UnitFactory> {
        factory_fn(move || async move { Ok(Arc::new(value) as Artifact) })
    }

    pub fn failing_factory(reason: &'static str) -> Arc<dyn UnitFactory> {
        factory_fn(move || async move { Err::<Artifact, FactoryError>(reason.into()) })
    }
}

#[cfg(test)]
mod tests {
    use super::test_units::*;
    use super::*;
    use crate::capability::test_signals;

    #[test]
    fn test_registry_rejects_duplicates() {
        let registry = UnitRegistry::new();
        registry
            .register(FeatureUnit::new("charts", ok_factory("a")))
            .unwrap();

        let result = registry.register(FeatureUnit::new("charts", ok_factory("b")));
        assert!(matches!(result, Err(RegistryError::Duplicate(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = UnitRegistry::new();
        registry
            .register(
                FeatureUnit::new("charts", ok_factory("a"))
                    .depends_on(&["chart-engine"])
                    .tier(PriorityTier::Enhancement),
            )
            .unwrap();

        let unit = registry.get("charts").unwrap();
        assert_eq!(unit.dependencies, vec!["chart-engine"]);
        assert_eq!(unit.tier, PriorityTier::Enhancement);
        assert!(registry.get("absent").is_none());
    }

    #[test]
    fn test_requirement_score() {
        let profile = test_signals::capable_profile();
        let level = DegradationLevel::Full;

        assert!(Requirement::ScoreAtLeast(50).satisfied(&profile, level));
        assert!(!Requirement::ScoreAtLeast(101).satisfied(&profile, level));
    }

    #[test]
    fn test_requirement_feature() {
        let profile = test_signals::capable_profile();

        let req = Requirement::FeatureEnabled(Feature::AdvancedCharts);
        assert!(req.satisfied(&profile, DegradationLevel::Full));
        assert!(!req.satisfied(&profile, DegradationLevel::Basic));
    }

    #[test]
    fn test_requirement_network() {
        let profile = test_signals::capable_profile();
        let level = DegradationLevel::Full;

        assert!(Requirement::NetworkAtLeast(NetworkClass::ThreeG).satisfied(&profile, level));

        let constrained = test_signals::constrained_profile();
        assert!(!Requirement::NetworkAtLeast(NetworkClass::ThreeG).satisfied(&constrained, level));
    }

    #[test]
    fn test_requirement_battery_absent_signal_passes() {
        let profile = test_signals::capable_profile();
        assert!(Requirement::BatteryAbove(0.5).satisfied(&profile, DegradationLevel::Full));
    }

    #[tokio::test]
    async fn test_factory_fn_produces_artifact() {
        let factory = ok_factory("artifact");
        let artifact = factory.load().await.unwrap();
        assert_eq!(*artifact.downcast::<&'static str>().unwrap(), "artifact");
    }
}
