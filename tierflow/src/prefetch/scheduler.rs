//! The prefetcher: merge, enqueue, drain, hover triggers.

use std::collections::HashMap;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::capability::CapabilityProfile;
use crate::cache::CachedFetcher;
use crate::degradation::DegradationLevel;
use crate::transport::TransportRequest;

use super::behavior::BehaviorTracker;
use super::config::PrefetchConfig;
use super::queue::PrefetchQueue;
use super::strategies::{PredictionContext, PredictionStrategy, SessionPhase};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A prefetch attempt failed.
#[derive(Debug, Error)]
#[error("prefetch failed: {0}")]
pub struct PrefetchError(pub String);

/// Port the prefetcher drains through.
///
/// Implementations warm whatever layer benefits from having the resource
/// early; [`CachedFetcher`] warms the response cache.
pub trait PrefetchFetcher: Send + Sync {
    /// Fetch one resource key ahead of need.
    fn prefetch(&self, key: &str) -> BoxFuture<'_, Result<(), PrefetchError>>;
}

impl PrefetchFetcher for CachedFetcher {
    fn prefetch(&self, key: &str) -> BoxFuture<'_, Result<(), PrefetchError>> {
        let request = TransportRequest::get(key);
        Box::pin(async move {
            self.execute(request)
                .await
                .map(|_| ())
                .map_err(|e| PrefetchError(e.to_string()))
        })
    }
}

/// Throttle derived from the degradation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchThrottle {
    /// No prediction at all.
    Disabled,
    /// Halved batch size.
    Reduced,
    /// Full configured aggressiveness.
    Full,
}

impl PrefetchThrottle {
    /// Throttle for a degradation level.
    pub fn for_level(level: DegradationLevel) -> Self {
        match level {
            DegradationLevel::Minimal | DegradationLevel::Basic => PrefetchThrottle::Disabled,
            DegradationLevel::Standard => PrefetchThrottle::Reduced,
            DegradationLevel::Enhanced | DegradationLevel::Full => PrefetchThrottle::Full,
        }
    }

    /// Effective batch size under this throttle.
    pub fn batch_size(&self, configured: usize) -> usize {
        match self {
            PrefetchThrottle::Disabled => 0,
            PrefetchThrottle::Reduced => (configured / 2).max(1),
            PrefetchThrottle::Full => configured.max(1),
        }
    }
}

/// Handle to an armed hover/viewport trigger.
///
/// Cancelling before the delay elapses makes the trigger a no-op. Dropping
/// the handle leaves the trigger armed.
#[derive(Debug)]
pub struct TriggerHandle {
    token: CancellationToken,
}

impl TriggerHandle {
    /// Tear the trigger down; a pending prefetch is abandoned.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the trigger was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Behavior-driven prefetch scheduler.
pub struct Prefetcher {
    tracker: Arc<BehaviorTracker>,
    strategies: Vec<Box<dyn PredictionStrategy>>,
    fetcher: Arc<dyn PrefetchFetcher>,
    config: PrefetchConfig,
    queue: Mutex<PrefetchQueue>,
    // Shared with armed hover triggers, which outlive the borrow of self.
    prefetched: Arc<Mutex<HashSet<String>>>,
    throttle: Arc<RwLock<PrefetchThrottle>>,
    hover_delay: RwLock<std::time::Duration>,
}

impl Prefetcher {
    /// Create a prefetcher.
    pub fn new(
        tracker: Arc<BehaviorTracker>,
        fetcher: Arc<dyn PrefetchFetcher>,
        config: PrefetchConfig,
        strategies: Vec<Box<dyn PredictionStrategy>>,
    ) -> Self {
        let hover_delay = config.hover_delay_constrained;
        Self {
            tracker,
            strategies,
            fetcher,
            config,
            queue: Mutex::new(PrefetchQueue::new()),
            prefetched: Arc::new(Mutex::new(HashSet::new())),
            throttle: Arc::new(RwLock::new(PrefetchThrottle::Full)),
            hover_delay: RwLock::new(hover_delay),
        }
    }

    /// Apply the session's capability state.
    ///
    /// Sets the throttle from the degradation level and scales the hover
    /// delay to the profile.
    pub fn apply_session(&self, profile: &CapabilityProfile, level: DegradationLevel) {
        *self.throttle.write() = PrefetchThrottle::for_level(level);
        *self.hover_delay.write() = self.config.hover_delay(profile);
    }

    /// Current throttle.
    pub fn throttle(&self) -> PrefetchThrottle {
        *self.throttle.read()
    }

    /// The behavior tracker feeding predictions.
    pub fn tracker(&self) -> &Arc<BehaviorTracker> {
        &self.tracker
    }

    /// Record a route visit, evaluate strategies and drain the queue.
    pub async fn on_route_visit(&self, route: &str) {
        self.tracker.record_visit(route);
        self.evaluate();
        self.drain().await;
    }

    /// Re-evaluate without a navigation (lets the time-based strategy fire
    /// as dwell accumulates) and drain anything new.
    pub async fn tick(&self) {
        self.evaluate();
        self.drain().await;
    }

    /// Run all strategies, merge candidates and enqueue.
    ///
    /// Merge rule: per resource key the maximum priority proposed by any
    /// strategy wins; the current route and already-prefetched keys are
    /// skipped.
    pub fn evaluate(&self) -> usize {
        if self.throttle() == PrefetchThrottle::Disabled {
            return 0;
        }

        let behavior = self.tracker.snapshot();
        let Some(current_route) = behavior.current_route().map(|s| s.to_string()) else {
            return 0;
        };
        let ctx = PredictionContext {
            behavior: &behavior,
            current_route: &current_route,
            current_dwell: self.tracker.current_dwell(),
            phase: SessionPhase::from_age(behavior.session_age(Utc::now())),
        };

        let mut merged: HashMap<String, i32> = HashMap::new();
        for strategy in &self.strategies {
            for candidate in strategy.candidates(&ctx) {
                let entry = merged.entry(candidate.key).or_insert(candidate.priority);
                *entry = (*entry).max(candidate.priority);
            }
        }

        let prefetched = self.prefetched.lock();
        let mut queue = self.queue.lock();
        let mut enqueued = 0;
        for (key, priority) in merged {
            if key == current_route || prefetched.contains(&key) {
                continue;
            }
            if queue.push(&key, priority) {
                enqueued += 1;
            }
        }

        if enqueued > 0 {
            debug!(enqueued, depth = queue.len(), "Prefetch candidates enqueued");
        }
        enqueued
    }

    /// Drain the queue in concurrency-limited batches with pacing between
    /// batches.
    pub async fn drain(&self) {
        loop {
            let batch_size = self.throttle().batch_size(self.config.batch_size);
            if batch_size == 0 {
                return;
            }

            let batch: Vec<String> = {
                // Same lock order as evaluate(): prefetched before queue.
                let prefetched = self.prefetched.lock();
                let mut queue = self.queue.lock();
                let mut batch = Vec::with_capacity(batch_size);
                while batch.len() < batch_size {
                    match queue.pop() {
                        Some(task) if prefetched.contains(&task.key) => continue,
                        Some(task) => batch.push(task.key),
                        None => break,
                    }
                }
                batch
            };

            if batch.is_empty() {
                return;
            }

            let fetches = batch.iter().map(|key| async move {
                (key.clone(), self.fetcher.prefetch(key).await)
            });
            for (key, result) in futures::future::join_all(fetches).await {
                match result {
                    Ok(()) => {
                        self.prefetched.lock().insert(key);
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Prefetch failed");
                    }
                }
            }

            if self.queue.lock().is_empty() {
                return;
            }
            tokio::time::sleep(self.config.batch_pacing).await;
        }
    }

    /// Arm a hover/viewport trigger for one key.
    ///
    /// After a capability-scaled delay the key is prefetched directly
    /// (bypassing the queue). Cancelling the returned handle first makes
    /// the trigger a no-op.
    pub fn hover_trigger(&self, key: &str) -> TriggerHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let prefetched = Arc::clone(&self.prefetched);
        let throttle = Arc::clone(&self.throttle);
        let key = key.to_string();
        let delay = *self.hover_delay.read();

        tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if *throttle.read() == PrefetchThrottle::Disabled
                        || prefetched.lock().contains(&key)
                    {
                        return;
                    }
                    match fetcher.prefetch(&key).await {
                        Ok(()) => {
                            prefetched.lock().insert(key);
                        }
                        Err(e) => warn!(key = %key, error = %e, "Hover prefetch failed"),
                    }
                }
            }
        });

        TriggerHandle { token }
    }

    /// Forget session prefetch state (queue and already-prefetched set).
    pub fn reset_session(&self) {
        self.queue.lock().clear();
        self.prefetched.lock().clear();
    }

    /// Number of queued tasks.
    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of keys prefetched this session.
    pub fn prefetched_count(&self) -> usize {
        self.prefetched.lock().len()
    }
}
