//! Tagged TTL response cache with stale-while-revalidate.
//!
//! Sits in front of the opaque transport boundary. Responses to read
//! requests are cached per route configuration (longest path-prefix match);
//! mutating requests are never cached and instead invalidate entries by
//! tag. Capacity control is insertion-ordered, not LRU: overflowing a
//! route's entry budget evicts the single oldest-inserted entry.
//!
//! # Known gap
//!
//! The check-then-fetch-then-store sequence in [`CachedFetcher`] is not
//! atomic. Concurrent misses on the same key each reach the transport; only
//! the feature loader deduplicates concurrent work. This mirrors the
//! documented behavior of the system this engine models.

mod config;
mod service;
mod store;

pub use config::{CacheConfig, RouteConfig, RouteRule, RuleId, TagRule, DEFAULT_RULE};
pub use service::{CachedFetcher, FetchError};
pub use store::{CacheStats, Lookup, ResponseCache};
