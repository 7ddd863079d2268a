//! The delivery engine context object.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::{CacheStats, CachedFetcher, FetchError, ResponseCache};
use crate::capability::{
    CapabilityProbes, CapabilityProfile, CapabilityProfiler, LoadPolicy,
};
use crate::degradation::{select_level, DegradationLevel};
use crate::events::{EventChannel, EventSubscription};
use crate::governor::{Alert, ChannelSink, Governor, LogSink, MetricKind, MetricSample};
use crate::loader::{FeatureLoader, FeatureUnit, PassError, PassSummary, RegistryError, UnitRegistry};
use crate::prefetch::{
    BehaviorTracker, Candidate, DwellStrategy, ExplorationStrategy, FrequentTransitionStrategy,
    PatternTableStrategy, PredictionStrategy, Prefetcher, SessionPhaseStrategy, TriggerHandle,
    PRIORITY_PATTERN,
};
use crate::storage::KeyValueStore;
use crate::transport::{Transport, TransportRequest};

use super::config::EngineConfig;
use super::error::EngineError;

/// Engine lifecycle events published to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The capability profile was recomputed.
    ProfileReset {
        /// New performance score.
        score: u8,
    },
    /// A reset landed on a different degradation level.
    LevelChanged {
        /// Level before the reset.
        from: DegradationLevel,
        /// Level after the reset.
        to: DegradationLevel,
    },
}

/// The engine context: one object owning every manager.
pub struct DeliveryEngine {
    profiler: CapabilityProfiler,
    level: RwLock<DegradationLevel>,
    loader: Arc<FeatureLoader>,
    cache: Arc<ResponseCache>,
    fetcher: Arc<CachedFetcher>,
    prefetcher: Arc<Prefetcher>,
    governor: Arc<Governor>,
    samples: EventChannel<MetricSample>,
    events: EventChannel<EngineEvent>,
    alert_sink: Arc<ChannelSink>,
    observer_token: Mutex<CancellationToken>,
}

impl DeliveryEngine {
    /// Boot the engine over the injected ports.
    ///
    /// Computes the session profile, selects the degradation level, wires
    /// the cache in front of the transport, restores persisted behavior,
    /// rules and alerts, and attaches the governor's sample observer.
    pub async fn start(
        config: EngineConfig,
        probes: Arc<dyn CapabilityProbes>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, EngineError> {
        let profiler = CapabilityProfiler::new(probes);
        let profile = profiler.profile();
        let level = select_level(&profile);
        info!(score = profile.performance_score, level = %level, "Delivery engine starting");

        let cache = Arc::new(ResponseCache::new());
        let fetcher = Arc::new(CachedFetcher::new(
            Arc::clone(&cache),
            Arc::new(config.cache.clone()),
            Arc::clone(&transport),
        ));

        let registry = Arc::new(UnitRegistry::new());
        let loader = Arc::new(FeatureLoader::new(registry));

        let tracker = Arc::new(BehaviorTracker::new().with_store(Arc::clone(&store)));
        tracker.load_persisted().await;

        let strategies = build_strategies(&config);
        let prefetcher = Arc::new(Prefetcher::new(
            tracker,
            Arc::clone(&fetcher) as Arc<dyn crate::prefetch::PrefetchFetcher>,
            config.prefetch.clone(),
            strategies,
        ));
        prefetcher.apply_session(&profile, level);

        let alert_sink = Arc::new(ChannelSink::new());
        let governor = Arc::new(
            Governor::new(config.governor.clone())
                .with_store(Arc::clone(&store))
                .with_sink(Arc::new(LogSink))
                .with_sink(Arc::clone(&alert_sink) as Arc<dyn crate::governor::AlertSink>),
        );
        governor.load_persisted().await;

        let samples: EventChannel<MetricSample> = EventChannel::new();
        let observer_token = CancellationToken::new();
        Arc::clone(&governor).spawn_sample_observer(samples.subscribe(), observer_token.clone());

        Ok(Self {
            profiler,
            level: RwLock::new(level),
            loader,
            cache,
            fetcher,
            prefetcher,
            governor,
            samples,
            events: EventChannel::new(),
            alert_sink,
            observer_token: Mutex::new(observer_token),
        })
    }

    /// The session's capability profile.
    pub fn profile(&self) -> Arc<CapabilityProfile> {
        self.profiler.profile()
    }

    /// The session's degradation level.
    pub fn level(&self) -> DegradationLevel {
        *self.level.read()
    }

    /// The load policy derived from the session profile.
    pub fn policy(&self) -> LoadPolicy {
        LoadPolicy::for_profile(&self.profile())
    }

    /// Register a feature unit.
    pub fn register_unit(&self, unit: FeatureUnit) -> Result<(), RegistryError> {
        self.loader.registry().register(unit)
    }

    /// The feature loader.
    pub fn loader(&self) -> &Arc<FeatureLoader> {
        &self.loader
    }

    /// Run a full load pass for the session.
    pub async fn run_load_pass(&self) -> Result<PassSummary, PassError> {
        let profile = self.profile();
        let level = self.level();
        self.loader.run_pass(&profile, level).await
    }

    /// Execute a request through the response cache.
    pub async fn fetch(&self, request: TransportRequest) -> Result<Bytes, FetchError> {
        self.fetcher.execute(request).await
    }

    /// Cache hit/miss statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Record a route visit (feeds the behavioral predictor).
    pub async fn visit_route(&self, route: &str) {
        self.prefetcher.on_route_visit(route).await;
    }

    /// Arm a hover/viewport prefetch trigger.
    pub fn hover_trigger(&self, key: &str) -> TriggerHandle {
        self.prefetcher.hover_trigger(key)
    }

    /// The prefetcher.
    pub fn prefetcher(&self) -> &Arc<Prefetcher> {
        &self.prefetcher
    }

    /// The performance governor.
    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }

    /// Record a timing metric directly.
    pub async fn record_metric(&self, kind: MetricKind, value: f64) -> Vec<Alert> {
        self.governor.record_sample(kind, value).await
    }

    /// Channel for platform instrumentation to publish samples into.
    pub fn samples(&self) -> &EventChannel<MetricSample> {
        &self.samples
    }

    /// Subscribe to engine lifecycle events.
    pub fn subscribe(&self) -> EventSubscription<EngineEvent> {
        self.events.subscribe()
    }

    /// Subscribe to in-app alert delivery.
    pub fn alert_subscription(&self) -> EventSubscription<Alert> {
        self.alert_sink.channel().subscribe()
    }

    /// Recompute the capability profile and re-apply it everywhere.
    ///
    /// Disposes the governor's sample observer (a fresh one is attached),
    /// clears prefetch session state and the loader's settled results, and
    /// publishes [`EngineEvent::ProfileReset`] plus a level-change event
    /// when the reset lands on a different tier.
    pub async fn reset(&self) -> Arc<CapabilityProfile> {
        // Dispose observers owned by the previous session state.
        let fresh_token = CancellationToken::new();
        {
            let mut token = self.observer_token.lock();
            token.cancel();
            *token = fresh_token.clone();
        }

        let profile = self.profiler.reset();
        let new_level = select_level(&profile);
        let old_level = {
            let mut level = self.level.write();
            std::mem::replace(&mut *level, new_level)
        };

        self.prefetcher.apply_session(&profile, new_level);
        self.prefetcher.reset_session();
        self.loader.clear_results();
        Arc::clone(&self.governor).spawn_sample_observer(self.samples.subscribe(), fresh_token);

        self.events.publish(EngineEvent::ProfileReset {
            score: profile.performance_score,
        });
        if old_level != new_level {
            info!(from = %old_level, to = %new_level, "Degradation level changed");
            self.events.publish(EngineEvent::LevelChanged {
                from: old_level,
                to: new_level,
            });
        }

        profile
    }
}

/// Build the five prediction strategies from the engine config.
fn build_strategies(config: &EngineConfig) -> Vec<Box<dyn PredictionStrategy>> {
    let mut table: HashMap<String, Vec<Candidate>> = HashMap::new();
    for (route, keys) in &config.patterns {
        table.insert(
            route.clone(),
            keys.iter()
                .map(|k| Candidate::new(k.clone(), PRIORITY_PATTERN))
                .collect(),
        );
    }
    let table = Arc::new(table);

    let phase = &config.phase_routes;
    let early: Vec<&str> = phase.early.iter().map(String::as_str).collect();
    let mid: Vec<&str> = phase.mid.iter().map(String::as_str).collect();
    let late: Vec<&str> = phase.late.iter().map(String::as_str).collect();

    vec![
        Box::new(PatternTableStrategy::new(Arc::clone(&table))),
        Box::new(FrequentTransitionStrategy::new(config.prefetch.top_k)),
        Box::new(DwellStrategy::new(
            config.prefetch.dwell_ratio,
            config.prefetch.top_k,
        )),
        Box::new(SessionPhaseStrategy::new(&early, &mid, &late)),
        Box::new(ExplorationStrategy::new(
            config.prefetch.exploration_threshold,
            table,
        )),
    ]
}
