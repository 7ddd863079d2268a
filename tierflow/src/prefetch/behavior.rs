//! Empirical navigation behavior tracking.
//!
//! The profile records what actually happened — visits, transitions, dwell
//! times — and is mutated only on route-change events. Persistence is
//! best-effort fire-and-forget through the storage port.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{decode_versioned, encode_versioned, KeyValueStore, KEY_BEHAVIOR};

/// Schema version of the persisted behavior record.
pub const BEHAVIOR_VERSION: u32 = 1;

/// Accumulated dwell for one route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellStat {
    /// Total milliseconds spent on the route across completed visits.
    pub total_ms: u64,
    /// Number of completed visits (route was left).
    pub completed_visits: u32,
}

impl DwellStat {
    /// Mean dwell per completed visit, if any visit completed.
    pub fn average_ms(&self) -> Option<f64> {
        if self.completed_visits == 0 {
            None
        } else {
            Some(self.total_ms as f64 / self.completed_visits as f64)
        }
    }
}

/// Observed navigation behavior for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Visited routes in order (append-only).
    pub visited: Vec<String>,
    /// from-route → to-route → observed transition count.
    pub transitions: HashMap<String, HashMap<String, u32>>,
    /// Dwell statistics per route.
    pub dwell: HashMap<String, DwellStat>,
    /// When the session started.
    pub session_start: DateTime<Utc>,
    /// Last route-change event.
    pub last_activity: DateTime<Utc>,
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            visited: Vec::new(),
            transitions: HashMap::new(),
            dwell: HashMap::new(),
            session_start: now,
            last_activity: now,
        }
    }
}

impl BehaviorProfile {
    /// Record a route visit.
    ///
    /// Appends the route, counts the transition from the previous route and
    /// accumulates `dwell_on_previous` for the route being left.
    pub fn record_visit(
        &mut self,
        route: &str,
        now: DateTime<Utc>,
        dwell_on_previous: Option<Duration>,
    ) {
        if let Some(previous) = self.visited.last().cloned() {
            *self
                .transitions
                .entry(previous.clone())
                .or_default()
                .entry(route.to_string())
                .or_insert(0) += 1;

            if let Some(dwell) = dwell_on_previous {
                let stat = self.dwell.entry(previous).or_default();
                stat.total_ms += dwell.as_millis() as u64;
                stat.completed_visits += 1;
            }
        }

        self.visited.push(route.to_string());
        self.last_activity = now;
    }

    /// The route currently being viewed.
    pub fn current_route(&self) -> Option<&str> {
        self.visited.last().map(|s| s.as_str())
    }

    /// Total route visits this session.
    pub fn total_visits(&self) -> usize {
        self.visited.len()
    }

    /// Distinct routes visited this session.
    pub fn unique_routes(&self) -> usize {
        let mut seen: Vec<&str> = self.visited.iter().map(|s| s.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Unique/total visit ratio; 0.0 before any visit.
    pub fn unique_ratio(&self) -> f64 {
        if self.visited.is_empty() {
            0.0
        } else {
            self.unique_routes() as f64 / self.total_visits() as f64
        }
    }

    /// The most-visited route, ties broken lexicographically.
    pub fn most_visited(&self) -> Option<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for route in &self.visited {
            *counts.entry(route.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(route, _)| route)
    }

    /// The `k` most frequent observed transitions out of `from`.
    pub fn top_transitions(&self, from: &str, k: usize) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = self
            .transitions
            .get(from)
            .map(|targets| targets.iter().map(|(r, c)| (r.clone(), *c)).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out.truncate(k);
        out
    }

    /// Historical average dwell for a route, if any visit completed.
    pub fn average_dwell_ms(&self, route: &str) -> Option<f64> {
        self.dwell.get(route).and_then(|s| s.average_ms())
    }

    /// Time since the session started.
    pub fn session_age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.session_start
    }
}

/// Thread-safe tracker owning the session's behavior profile.
///
/// Dwell on the current route is measured with the tokio clock so tests can
/// drive it deterministically. Every mutation is followed by a
/// fire-and-forget persistence write when a store is attached.
pub struct BehaviorTracker {
    profile: Mutex<BehaviorProfile>,
    entered_current_at: Mutex<Option<tokio::time::Instant>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl BehaviorTracker {
    /// Create a tracker with a fresh profile and no persistence.
    pub fn new() -> Self {
        Self {
            profile: Mutex::new(BehaviorProfile::default()),
            entered_current_at: Mutex::new(None),
            store: None,
        }
    }

    /// Attach a persistence store.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Seed the tracker from persisted history, keeping this session's
    /// start time. A version mismatch or parse failure silently starts
    /// from defaults.
    pub async fn load_persisted(&self) {
        let Some(store) = &self.store else { return };
        let raw = match store.get(KEY_BEHAVIOR).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "Could not read persisted behavior");
                return;
            }
        };

        if let Some(persisted) = decode_versioned::<BehaviorProfile>(&raw, BEHAVIOR_VERSION) {
            let mut profile = self.profile.lock();
            let session_start = profile.session_start;
            *profile = persisted;
            profile.session_start = session_start;
            profile.last_activity = session_start;
        }
    }

    /// Record a route visit, measuring dwell on the route being left.
    pub fn record_visit(&self, route: &str) {
        let now = tokio::time::Instant::now();
        let dwell = {
            let mut entered = self.entered_current_at.lock();
            let dwell = entered.map(|at| now.duration_since(at));
            *entered = Some(now);
            dwell
        };

        self.profile.lock().record_visit(route, Utc::now(), dwell);
        self.persist_async();
    }

    /// Dwell accumulated on the current route so far.
    pub fn current_dwell(&self) -> Duration {
        self.entered_current_at
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// A point-in-time copy of the profile.
    pub fn snapshot(&self) -> BehaviorProfile {
        self.profile.lock().clone()
    }

    fn persist_async(&self) {
        let Some(store) = &self.store else { return };
        let Some(encoded) = encode_versioned(BEHAVIOR_VERSION, &*self.profile.lock()) else {
            return;
        };
        let store = Arc::clone(store);
        tokio::spawn(async move {
            if let Err(e) = store.set(KEY_BEHAVIOR, encoded).await {
                debug!(error = %e, "Best-effort behavior persistence failed");
            }
        });
    }
}

impl Default for BehaviorTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn visit_all(profile: &mut BehaviorProfile, routes: &[&str]) {
        for route in routes {
            profile.record_visit(route, Utc::now(), Some(Duration::from_secs(1)));
        }
    }

    #[test]
    fn test_visits_are_append_only() {
        let mut profile = BehaviorProfile::default();
        visit_all(&mut profile, &["/home", "/products", "/home"]);

        assert_eq!(profile.visited, vec!["/home", "/products", "/home"]);
        assert_eq!(profile.current_route(), Some("/home"));
    }

    #[test]
    fn test_transition_counts() {
        let mut profile = BehaviorProfile::default();
        visit_all(
            &mut profile,
            &["/home", "/products", "/home", "/products", "/cart"],
        );

        assert_eq!(profile.transitions["/home"]["/products"], 2);
        assert_eq!(profile.transitions["/products"]["/home"], 1);
        assert_eq!(profile.transitions["/products"]["/cart"], 1);
    }

    #[test]
    fn test_dwell_accumulates_on_route_left() {
        let mut profile = BehaviorProfile::default();
        profile.record_visit("/home", Utc::now(), None);
        profile.record_visit("/products", Utc::now(), Some(Duration::from_millis(1500)));
        profile.record_visit("/home", Utc::now(), Some(Duration::from_millis(500)));

        assert_eq!(profile.average_dwell_ms("/home"), Some(1500.0));
        assert_eq!(profile.average_dwell_ms("/products"), Some(500.0));
        assert_eq!(profile.average_dwell_ms("/cart"), None);
    }

    #[test]
    fn test_unique_ratio() {
        let mut profile = BehaviorProfile::default();
        assert_eq!(profile.unique_ratio(), 0.0);

        visit_all(&mut profile, &["/a", "/b", "/c", "/a"]);
        assert!((profile.unique_ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_most_visited() {
        let mut profile = BehaviorProfile::default();
        visit_all(&mut profile, &["/a", "/b", "/b", "/c"]);
        assert_eq!(profile.most_visited(), Some("/b"));
    }

    #[test]
    fn test_top_transitions_ordering() {
        let mut profile = BehaviorProfile::default();
        visit_all(
            &mut profile,
            &["/home", "/a", "/home", "/a", "/home", "/b", "/home", "/c"],
        );

        let top = profile.top_transitions("/home", 2);
        assert_eq!(top[0], ("/a".to_string(), 2));
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].1, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_measures_dwell() {
        let tracker = BehaviorTracker::new();
        tracker.record_visit("/home");

        tokio::time::advance(Duration::from_secs(5)).await;
        tracker.record_visit("/products");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.average_dwell_ms("/home"), Some(5000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_persists_best_effort() {
        let store = Arc::new(MemoryStore::new());
        let tracker = BehaviorTracker::new().with_store(Arc::clone(&store) as Arc<dyn KeyValueStore>);

        tracker.record_visit("/home");
        tokio::task::yield_now().await;

        let raw = store.get(KEY_BEHAVIOR).await.unwrap().unwrap();
        let decoded: BehaviorProfile = decode_versioned(&raw, BEHAVIOR_VERSION).unwrap();
        assert_eq!(decoded.visited, vec!["/home"]);
    }

    #[tokio::test]
    async fn test_load_persisted_version_mismatch_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        let stale = encode_versioned(BEHAVIOR_VERSION + 1, &BehaviorProfile::default()).unwrap();
        store.set(KEY_BEHAVIOR, stale).await.unwrap();

        let tracker = BehaviorTracker::new().with_store(Arc::clone(&store) as Arc<dyn KeyValueStore>);
        tracker.load_persisted().await;

        assert!(tracker.snapshot().visited.is_empty());
    }

    #[tokio::test]
    async fn test_load_persisted_restores_history() {
        let store = Arc::new(MemoryStore::new());
        let mut history = BehaviorProfile::default();
        history.record_visit("/home", Utc::now(), None);
        let encoded = encode_versioned(BEHAVIOR_VERSION, &history).unwrap();
        store.set(KEY_BEHAVIOR, encoded).await.unwrap();

        let tracker = BehaviorTracker::new().with_store(Arc::clone(&store) as Arc<dyn KeyValueStore>);
        tracker.load_persisted().await;

        assert_eq!(tracker.snapshot().visited, vec!["/home"]);
    }
}
