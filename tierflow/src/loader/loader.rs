//! The feature loader: deduplicated, cached, batched unit loading.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capability::CapabilityProfile;
use crate::degradation::DegradationLevel;
use crate::retry::{retry_with_backoff, Backoff};

use super::graph::{topological_order, GraphError};
use super::strategy::LoadStrategy;
use super::unit::{Artifact, FeatureUnit, UnitRegistry};

/// Attempts per unit load (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Outcome of one unit's session load.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// The factory produced an artifact.
    Success(Artifact),
    /// Retries were exhausted; the reason is the final attempt's error.
    Failed {
        /// Attempts made, including the first.
        attempts: u32,
        /// Final error, stringified.
        reason: String,
    },
}

impl LoadOutcome {
    /// Whether the load produced an artifact.
    pub fn is_success(&self) -> bool {
        matches!(self, LoadOutcome::Success(_))
    }
}

/// Result of one unit's session load, cached per unit name.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Unit name.
    pub unit: String,
    /// Success or terminal failure.
    pub outcome: LoadOutcome,
    /// Wall-clock duration of the load (including retries).
    pub duration: Duration,
}

/// Generic artifact substituted when a failed unit has no fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// The unit this placeholder stands in for.
    pub unit: String,
}

/// Errors aborting a whole pass.
///
/// Individual unit failures never abort a pass; only configuration errors
/// in the dependency graph do.
#[derive(Debug, Error)]
pub enum PassError {
    /// The dependency graph is invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Summary of one load pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    /// Strategy the pass ran under.
    pub strategy: LoadStrategy,
    /// Units the pass attempted to load.
    pub attempted: usize,
    /// Units that produced artifacts.
    pub succeeded: usize,
    /// Units that failed terminally (fallbacks substituted).
    pub failed: usize,
    /// Units excluded by requirement, tier or unsatisfiable dependencies.
    pub skipped: Vec<String>,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Session load state shared with in-flight load futures.
#[derive(Default)]
struct LoadState {
    results: Mutex<HashMap<String, LoadResult>>,
    in_flight: Mutex<HashMap<String, SharedLoad>>,
}

/// Session-scoped unit loader.
///
/// Exactly one underlying load runs per unit name: concurrent requests for
/// a name await the same in-flight future, and settled results (success or
/// terminal failure) are cached for the rest of the session.
pub struct FeatureLoader {
    registry: Arc<UnitRegistry>,
    state: Arc<LoadState>,
    max_attempts: u32,
    backoff: Backoff,
}

impl FeatureLoader {
    /// Create a loader over a registry with default retry behavior.
    pub fn new(registry: Arc<UnitRegistry>) -> Self {
        Self {
            registry,
            state: Arc::new(LoadState::default()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }

    /// Override the retry schedule.
    pub fn with_retry(mut self, max_attempts: u32, backoff: Backoff) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// The unit registry.
    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    /// Load one unit (and, first, its dependencies).
    ///
    /// Idempotent for the session: repeated and concurrent calls share one
    /// underlying load and return the same cached result afterwards.
    pub fn load(&self, name: &str) -> BoxFuture<'static, LoadResult> {
        load_unit(
            Arc::clone(&self.registry),
            Arc::clone(&self.state),
            self.max_attempts,
            self.backoff.clone(),
            name.to_string(),
        )
    }

    /// Run a full load pass for the session.
    ///
    /// Filters registered units by requirement and strategy tier, pulls in
    /// transitive dependencies, orders them dependency-first, and drains
    /// the order in fixed-size concurrent batches separated by the
    /// strategy's pacing delay. One unit's failure never aborts the pass.
    pub async fn run_pass(
        &self,
        profile: &CapabilityProfile,
        level: DegradationLevel,
    ) -> Result<PassSummary, PassError> {
        let start = std::time::Instant::now();
        let strategy = LoadStrategy::for_profile(profile);

        let all = self.registry.all();
        let by_name: HashMap<String, Arc<FeatureUnit>> = all
            .iter()
            .map(|u| (u.name.clone(), Arc::clone(u)))
            .collect();

        let mut selected: BTreeMap<String, Arc<FeatureUnit>> = BTreeMap::new();
        let mut skipped: Vec<String> = Vec::new();

        for unit in &all {
            if !unit.requirement.satisfied(profile, level) || !strategy.admits(unit.tier) {
                skipped.push(unit.name.clone());
                continue;
            }
            match collect_with_deps(unit, &by_name, profile, level) {
                Ok(units) => {
                    for u in units {
                        selected.insert(u.name.clone(), u);
                    }
                }
                Err(reason) => {
                    warn!(unit = %unit.name, reason = %reason, "Skipping unit with unsatisfiable dependencies");
                    skipped.push(unit.name.clone());
                }
            }
        }

        // A unit excluded as a base selection may still have been pulled in
        // as a dependency; it is not skipped in that case.
        skipped.retain(|name| !selected.contains_key(name));

        let mut units: Vec<Arc<FeatureUnit>> = selected.into_values().collect();
        units.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.name.cmp(&b.name)));
        let ordered = topological_order(&units)?;

        info!(
            strategy = %strategy,
            units = ordered.len(),
            skipped = skipped.len(),
            "Starting load pass"
        );

        let batch_size = strategy.max_concurrency().max(1);
        let mut first_batch = true;
        for batch in ordered.chunks(batch_size) {
            if !first_batch {
                tokio::time::sleep(strategy.pacing()).await;
            }
            first_batch = false;

            let loads = batch.iter().map(|u| self.load(&u.name));
            futures::future::join_all(loads).await;
        }

        let results = self.state.results.lock();
        let mut succeeded = 0;
        let mut failed = 0;
        for unit in &ordered {
            match results.get(&unit.name).map(|r| r.outcome.is_success()) {
                Some(true) => succeeded += 1,
                _ => failed += 1,
            }
        }

        Ok(PassSummary {
            strategy,
            attempted: ordered.len(),
            succeeded,
            failed,
            skipped,
            duration: start.elapsed(),
        })
    }

    /// The session result for a unit, if it has settled.
    pub fn result(&self, name: &str) -> Option<LoadResult> {
        self.state.results.lock().get(name).cloned()
    }

    /// The artifact a consumer should use for a unit.
    ///
    /// Successful loads return their artifact; terminal failures return the
    /// unit's fallback or a generic [`Placeholder`]. `None` means the unit
    /// has not settled this session.
    pub fn artifact(&self, name: &str) -> Option<Artifact> {
        let result = self.result(name)?;
        match result.outcome {
            LoadOutcome::Success(artifact) => Some(artifact),
            LoadOutcome::Failed { .. } => {
                let fallback = self.registry.get(name).and_then(|u| u.fallback.clone());
                Some(fallback.unwrap_or_else(|| {
                    Arc::new(Placeholder {
                        unit: name.to_string(),
                    }) as Artifact
                }))
            }
        }
    }

    /// Forget every settled result (used on session reset).
    pub fn clear_results(&self) {
        self.state.results.lock().clear();
    }

    /// Number of settled units this session.
    pub fn settled_count(&self) -> usize {
        self.state.results.lock().len()
    }
}

/// Load one unit, deduplicating against the shared in-flight map.
///
/// A free function (not a method) so the returned future is `'static` and
/// can be stored, shared and awaited by any number of callers.
fn load_unit(
    registry: Arc<UnitRegistry>,
    state: Arc<LoadState>,
    max_attempts: u32,
    backoff: Backoff,
    name: String,
) -> BoxFuture<'static, LoadResult> {
    async move {
        if let Some(result) = state.results.lock().get(&name) {
            return result.clone();
        }

        let Some(unit) = registry.get(&name) else {
            return LoadResult {
                unit: name.clone(),
                outcome: LoadOutcome::Failed {
                    attempts: 0,
                    reason: "unit is not registered".to_string(),
                },
                duration: Duration::ZERO,
            };
        };

        let shared = {
            let mut in_flight = state.in_flight.lock();
            match in_flight.get(&name) {
                Some(existing) => existing.clone(),
                None => {
                    let fut = run_load(
                        Arc::clone(&registry),
                        Arc::clone(&state),
                        max_attempts,
                        backoff,
                        unit,
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(name.clone(), fut.clone());
                    fut
                }
            }
        };

        let result = shared.await;
        state
            .results
            .lock()
            .entry(name.clone())
            .or_insert_with(|| result.clone());
        state.in_flight.lock().remove(&name);
        result
    }
    .boxed()
}

async fn run_load(
    registry: Arc<UnitRegistry>,
    state: Arc<LoadState>,
    max_attempts: u32,
    backoff: Backoff,
    unit: Arc<FeatureUnit>,
) -> LoadResult {
    let start = std::time::Instant::now();

    // Every dependency settles (success or failure) before this unit's
    // factory is invoked.
    for dep in &unit.dependencies {
        let _ = load_unit(
            Arc::clone(&registry),
            Arc::clone(&state),
            max_attempts,
            backoff.clone(),
            dep.clone(),
        )
        .await;
    }

    let factory = Arc::clone(unit.factory());
    let outcome = match retry_with_backoff(max_attempts, backoff, move |_| factory.load()).await {
        Ok(artifact) => {
            debug!(unit = %unit.name, "Unit loaded");
            LoadOutcome::Success(artifact)
        }
        Err(e) => {
            warn!(unit = %unit.name, attempts = e.attempts, error = %e.last_error, "Unit load exhausted retries");
            LoadOutcome::Failed {
                attempts: e.attempts,
                reason: e.last_error.to_string(),
            }
        }
    };

    LoadResult {
        unit: unit.name.clone(),
        outcome,
        duration: start.elapsed(),
    }
}

/// Collect `unit` plus its transitive dependencies.
///
/// Dependencies are included regardless of tier (a loaded unit needs them),
/// but every dependency must itself be registered and satisfy its
/// requirement; otherwise the whole unit is reported unsatisfiable.
fn collect_with_deps(
    unit: &Arc<FeatureUnit>,
    by_name: &HashMap<String, Arc<FeatureUnit>>,
    profile: &CapabilityProfile,
    level: DegradationLevel,
) -> Result<Vec<Arc<FeatureUnit>>, String> {
    let mut acc: Vec<Arc<FeatureUnit>> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<Arc<FeatureUnit>> = vec![Arc::clone(unit)];

    while let Some(current) = stack.pop() {
        if !visited.insert(current.name.clone()) {
            continue;
        }
        for dep in &current.dependencies {
            let dep_unit = by_name
                .get(dep)
                .ok_or_else(|| format!("dependency '{dep}' is not registered"))?;
            if !dep_unit.requirement.satisfied(profile, level) {
                return Err(format!("dependency '{dep}' does not satisfy its requirement"));
            }
            stack.push(Arc::clone(dep_unit));
        }
        acc.push(current);
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::test_signals;
    use crate::loader::unit::test_units::{failing_factory, ok_factory};
    use crate::loader::unit::{factory_fn, FactoryError, PriorityTier, Requirement};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn loader_with(units: Vec<FeatureUnit>) -> Arc<FeatureLoader> {
        let registry = Arc::new(UnitRegistry::new());
        for unit in units {
            registry.register(unit).unwrap();
        }
        Arc::new(FeatureLoader::new(registry))
    }

    fn counting_factory(
        counter: Arc<AtomicU32>,
    ) -> Arc<dyn crate::loader::unit::UnitFactory> {
        factory_fn(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Arc::new("loaded") as Artifact)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_underlying_load() {
        let calls = Arc::new(AtomicU32::new(0));
        let loader = loader_with(vec![FeatureUnit::new(
            "widget",
            counting_factory(Arc::clone(&calls)),
        )]);

        let (a, b, c) = futures::join!(
            loader.load("widget"),
            loader.load("widget"),
            loader.load("widget")
        );

        assert!(a.outcome.is_success());
        assert!(b.outcome.is_success());
        assert!(c.outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_result_is_cached() {
        let calls = Arc::new(AtomicU32::new(0));
        let loader = loader_with(vec![FeatureUnit::new(
            "widget",
            counting_factory(Arc::clone(&calls)),
        )]);

        loader.load("widget").await;
        loader.load("widget").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.settled_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_settles_before_dependent() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let engine_order = Arc::clone(&order);
        let engine = factory_fn(move || {
            let order = Arc::clone(&engine_order);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                order.lock().push("chart-engine");
                Ok(Arc::new("engine") as Artifact)
            }
        });

        let charts_order = Arc::clone(&order);
        let charts = factory_fn(move || {
            let order = Arc::clone(&charts_order);
            async move {
                order.lock().push("charts");
                Ok(Arc::new("charts") as Artifact)
            }
        });

        let loader = loader_with(vec![
            FeatureUnit::new("chart-engine", engine),
            FeatureUnit::new("charts", charts).depends_on(&["chart-engine"]),
        ]);

        loader.load("charts").await;

        assert_eq!(*order.lock(), vec!["chart-engine", "charts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let flaky = factory_fn(move || {
            let calls = Arc::clone(&calls_in);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err::<Artifact, FactoryError>("transient".into())
                } else {
                    Ok(Arc::new("ok") as Artifact)
                }
            }
        });

        let loader = loader_with(vec![FeatureUnit::new("flaky", flaky)]);
        let result = loader.load("flaky").await;

        assert!(result.outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_carries_attempts_and_is_cached() {
        let loader = loader_with(vec![FeatureUnit::new("broken", failing_factory("boom"))]);

        let result = loader.load("broken").await;
        match &result.outcome {
            LoadOutcome::Failed { attempts, reason } => {
                assert_eq!(*attempts, DEFAULT_MAX_ATTEMPTS);
                assert!(reason.contains("boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // Terminal failures are cached; no automatic re-retry this session.
        let again = loader.load("broken").await;
        assert!(!again.outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unit_substitutes_fallback() {
        let fallback: Artifact = Arc::new("fallback-widget");
        let loader = loader_with(vec![FeatureUnit::new("broken", failing_factory("boom"))
            .with_fallback(Arc::clone(&fallback))]);

        loader.load("broken").await;
        let artifact = loader.artifact("broken").unwrap();
        assert_eq!(*artifact.downcast::<&'static str>().unwrap(), "fallback-widget");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unit_without_fallback_gets_placeholder() {
        let loader = loader_with(vec![FeatureUnit::new("broken", failing_factory("boom"))]);

        loader.load("broken").await;
        let artifact = loader.artifact("broken").unwrap();
        let placeholder = artifact.downcast::<Placeholder>().unwrap();
        assert_eq!(placeholder.unit, "broken");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_unit_fails_without_panic() {
        let loader = loader_with(vec![]);
        let result = loader.load("ghost").await;
        assert!(!result.outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_loads_eligible_units_only() {
        let loader = loader_with(vec![
            FeatureUnit::new("core", ok_factory("core")).tier(PriorityTier::Critical),
            FeatureUnit::new("extras", ok_factory("extras")).tier(PriorityTier::Optional),
            FeatureUnit::new("charts", ok_factory("charts"))
                .tier(PriorityTier::Enhancement)
                .requires(Requirement::ScoreAtLeast(95)),
        ]);

        // Constrained profile: conservative strategy, low score.
        let profile = test_signals::constrained_profile();
        let summary = loader
            .run_pass(&profile, DegradationLevel::Standard)
            .await
            .unwrap();

        assert_eq!(summary.strategy, LoadStrategy::Conservative);
        assert_eq!(summary.attempted, 1);
        assert!(summary.skipped.contains(&"extras".to_string()));
        assert!(summary.skipped.contains(&"charts".to_string()));
        assert!(loader.result("core").is_some());
        assert!(loader.result("extras").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_pulls_in_dependencies_of_eligible_units() {
        let loader = loader_with(vec![
            FeatureUnit::new("charts", ok_factory("charts"))
                .tier(PriorityTier::Important)
                .depends_on(&["chart-engine"]),
            // The dependency itself is Optional, but must still load.
            FeatureUnit::new("chart-engine", ok_factory("engine")).tier(PriorityTier::Optional),
        ]);

        let profile = test_signals::constrained_profile();
        let summary = loader
            .run_pass(&profile, DegradationLevel::Standard)
            .await
            .unwrap();

        assert_eq!(summary.attempted, 2);
        assert!(loader.result("chart-engine").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_cycle_fails_fast() {
        let loader = loader_with(vec![
            FeatureUnit::new("a", ok_factory("a")).depends_on(&["b"]),
            FeatureUnit::new("b", ok_factory("b")).depends_on(&["a"]),
        ]);

        let profile = test_signals::capable_profile();
        let result = loader.run_pass(&profile, DegradationLevel::Full).await;
        assert!(matches!(result, Err(PassError::Graph(GraphError::Cycle { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_continues_past_unit_failure() {
        let loader = loader_with(vec![
            FeatureUnit::new("broken", failing_factory("boom")).tier(PriorityTier::Critical),
            FeatureUnit::new("fine", ok_factory("fine")).tier(PriorityTier::Critical),
        ]);

        let profile = test_signals::capable_profile();
        let summary = loader
            .run_pass(&profile, DegradationLevel::Full)
            .await
            .unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(loader.result("fine").unwrap().outcome.is_success());
    }
}
