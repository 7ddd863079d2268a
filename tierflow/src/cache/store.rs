//! The cache store: TTL, tag invalidation, insertion-order eviction.
//!
//! Time is measured with `tokio::time::Instant` so tests drive expiry with
//! the paused clock instead of real sleeps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::config::{RouteConfig, RuleId};

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Fresh entry.
    Hit(Bytes),
    /// Entry past half its TTL under a stale-while-revalidate config;
    /// servable but due for a background refresh.
    Stale(Bytes),
    /// Absent or expired (expired entries are evicted by the lookup).
    Miss,
}

impl Lookup {
    /// The payload, if the lookup produced one.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Lookup::Hit(bytes) | Lookup::Stale(bytes) => Some(bytes),
            Lookup::Miss => None,
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache (fresh or stale).
    pub hits: u64,
    /// Lookups that found nothing servable.
    pub misses: u64,
    /// Entries currently stored.
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in [0.0, 1.0]; zero when nothing has been looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct StoredEntry {
    payload: Bytes,
    inserted_at: Instant,
    ttl: Duration,
    stale_while_revalidate: bool,
    tags: Vec<String>,
    rule: RuleId,
    seq: u64,
}

impl StoredEntry {
    fn age(&self, now: Instant) -> Duration {
        now.duration_since(self.inserted_at)
    }
}

struct Inner {
    entries: HashMap<String, StoredEntry>,
    next_seq: u64,
}

/// The response cache table.
///
/// All mutation is serialized through one mutex; entries store their rule
/// id so capacity control applies per rule, and an insertion sequence so
/// overflow evicts exactly the oldest-inserted entry of that rule.
pub struct ResponseCache {
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key` now.
    pub fn get(&self, key: &str) -> Lookup {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`.
    ///
    /// Expired entries are evicted by this call: age ≥ TTL is a miss even
    /// though the entry was still resident.
    pub fn get_at(&self, key: &str, now: Instant) -> Lookup {
        let mut inner = self.inner.lock();

        let result = match inner.entries.get(key) {
            None => Lookup::Miss,
            Some(entry) => {
                let age = entry.age(now);
                if age >= entry.ttl {
                    inner.entries.remove(key);
                    Lookup::Miss
                } else if entry.stale_while_revalidate && age > entry.ttl / 2 {
                    Lookup::Stale(entry.payload.clone())
                } else {
                    Lookup::Hit(entry.payload.clone())
                }
            }
        };

        match result {
            Lookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Store `payload` under `key` now.
    pub fn insert(&self, key: &str, payload: Bytes, config: &RouteConfig, rule: RuleId) {
        self.insert_at(key, payload, config, rule, Instant::now());
    }

    /// Store `payload` under `key` as of `now`.
    ///
    /// If the insert would push the rule past its entry budget, the single
    /// oldest-inserted entry of that rule is evicted first (insertion
    /// order, not LRU).
    pub fn insert_at(
        &self,
        key: &str,
        payload: Bytes,
        config: &RouteConfig,
        rule: RuleId,
        now: Instant,
    ) {
        let mut inner = self.inner.lock();

        let replacing = inner.entries.contains_key(key);
        if !replacing {
            let count = inner.entries.values().filter(|e| e.rule == rule).count();
            if count >= config.max_entries.max(1) {
                if let Some(oldest) = inner
                    .entries
                    .iter()
                    .filter(|(_, e)| e.rule == rule)
                    .min_by_key(|(_, e)| e.seq)
                    .map(|(k, _)| k.clone())
                {
                    debug!(key = %oldest, "Evicting oldest-inserted cache entry");
                    inner.entries.remove(&oldest);
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            StoredEntry {
                payload,
                inserted_at: now,
                ttl: config.ttl,
                stale_while_revalidate: config.stale_while_revalidate,
                tags: config.tags.clone(),
                rule,
                seq,
            },
        );
    }

    /// Remove every entry whose tag set intersects `tags`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_tags(&self, tags: &[String]) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| !entry.tags.iter().any(|t| tags.contains(t)));
        before - inner.entries.len()
    }

    /// Remove a single entry.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters and entry count as of now.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::DEFAULT_RULE;

    fn swr_config(ttl: Duration) -> RouteConfig {
        RouteConfig::with_ttl(ttl).stale_while_revalidate()
    }

    fn payload(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_before_ttl() {
        let cache = ResponseCache::new();
        let config = RouteConfig::with_ttl(Duration::from_secs(60));
        let now = Instant::now();

        cache.insert_at("k", payload("v"), &config, DEFAULT_RULE, now);

        let lookup = cache.get_at("k", now + Duration::from_secs(30));
        assert_eq!(lookup, Lookup::Hit(payload("v")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_at_ttl_boundary() {
        let cache = ResponseCache::new();
        let config = RouteConfig::with_ttl(Duration::from_secs(60));
        let now = Instant::now();

        cache.insert_at("k", payload("v"), &config, DEFAULT_RULE, now);

        // age == ttl is already a miss, and the entry is evicted.
        assert_eq!(cache.get_at("k", now + Duration::from_secs(60)), Lookup::Miss);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_window_requires_swr() {
        let cache = ResponseCache::new();
        let now = Instant::now();

        let plain = RouteConfig::with_ttl(Duration::from_secs(120));
        cache.insert_at("plain", payload("a"), &plain, 0, now);

        let swr = swr_config(Duration::from_secs(120));
        cache.insert_at("swr", payload("b"), &swr, 1, now);

        let at = now + Duration::from_secs(70);
        // Without SWR an entry inside (ttl/2, ttl) is still a plain hit.
        assert_eq!(cache.get_at("plain", at), Lookup::Hit(payload("a")));
        // With SWR it is stale.
        assert_eq!(cache.get_at("swr", at), Lookup::Stale(payload("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_boundary_is_exclusive_at_half_ttl() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        let config = swr_config(Duration::from_secs(120));

        cache.insert_at("k", payload("v"), &config, DEFAULT_RULE, now);

        // Exactly ttl/2 is still fresh; just past it is stale.
        assert_eq!(
            cache.get_at("k", now + Duration::from_secs(60)),
            Lookup::Hit(payload("v"))
        );
        assert_eq!(
            cache.get_at("k", now + Duration::from_secs(61)),
            Lookup::Stale(payload("v"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_removes_exactly_oldest_inserted() {
        let cache = ResponseCache::new();
        let config = RouteConfig::with_ttl(Duration::from_secs(600)).max_entries(3);
        let now = Instant::now();

        cache.insert_at("a", payload("1"), &config, 0, now);
        cache.insert_at("b", payload("2"), &config, 0, now + Duration::from_secs(1));
        cache.insert_at("c", payload("3"), &config, 0, now + Duration::from_secs(2));
        cache.insert_at("d", payload("4"), &config, 0, now + Duration::from_secs(3));

        let at = now + Duration::from_secs(4);
        assert_eq!(cache.get_at("a", at), Lookup::Miss);
        assert_eq!(cache.get_at("b", at), Lookup::Hit(payload("2")));
        assert_eq!(cache.get_at("c", at), Lookup::Hit(payload("3")));
        assert_eq!(cache.get_at("d", at), Lookup::Hit(payload("4")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_is_per_rule() {
        let cache = ResponseCache::new();
        let config = RouteConfig::with_ttl(Duration::from_secs(600)).max_entries(1);
        let now = Instant::now();

        cache.insert_at("rule0", payload("a"), &config, 0, now);
        cache.insert_at("rule1", payload("b"), &config, 1, now);
        // A second insert under rule 0 evicts only rule 0's entry.
        cache.insert_at("rule0-b", payload("c"), &config, 0, now);

        assert_eq!(cache.get_at("rule0", now), Lookup::Miss);
        assert!(cache.get_at("rule1", now).payload().is_some());
        assert!(cache.get_at("rule0-b", now).payload().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_does_not_evict() {
        let cache = ResponseCache::new();
        let config = RouteConfig::with_ttl(Duration::from_secs(600)).max_entries(2);
        let now = Instant::now();

        cache.insert_at("a", payload("1"), &config, 0, now);
        cache.insert_at("b", payload("2"), &config, 0, now);
        cache.insert_at("a", payload("1b"), &config, 0, now);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("a", now), Lookup::Hit(payload("1b")));
        assert_eq!(cache.get_at("b", now), Lookup::Hit(payload("2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_tags_exact_set() {
        let cache = ResponseCache::new();
        let now = Instant::now();

        let catalog = RouteConfig::with_ttl(Duration::from_secs(600)).tagged(&["catalog"]);
        let cart = RouteConfig::with_ttl(Duration::from_secs(600)).tagged(&["cart", "user"]);
        let untagged = RouteConfig::with_ttl(Duration::from_secs(600));

        cache.insert_at("p1", payload("a"), &catalog, 0, now);
        cache.insert_at("p2", payload("b"), &catalog, 0, now);
        cache.insert_at("c1", payload("c"), &cart, 1, now);
        cache.insert_at("misc", payload("d"), &untagged, DEFAULT_RULE, now);

        let removed = cache.invalidate_tags(&["catalog".to_string()]);
        assert_eq!(removed, 2);
        assert_eq!(cache.get_at("p1", now), Lookup::Miss);
        assert_eq!(cache.get_at("p2", now), Lookup::Miss);
        assert!(cache.get_at("c1", now).payload().is_some());
        assert!(cache.get_at("misc", now).payload().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_intersecting_tag() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        let cart = RouteConfig::with_ttl(Duration::from_secs(600)).tagged(&["cart", "user"]);
        cache.insert_at("c1", payload("c"), &cart, 0, now);

        // Any intersection counts, not full equality.
        assert_eq!(cache.invalidate_tags(&["user".to_string()]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_track_hits_and_misses() {
        let cache = ResponseCache::new();
        let config = RouteConfig::with_ttl(Duration::from_secs(60));
        let now = Instant::now();

        cache.insert_at("k", payload("v"), &config, DEFAULT_RULE, now);
        cache.get_at("k", now);
        cache.get_at("k", now);
        cache.get_at("absent", now);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_without_traffic() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
