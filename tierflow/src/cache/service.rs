//! Cached request execution with stale-while-revalidate.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::transport::{Transport, TransportError, TransportRequest};

use super::config::{CacheConfig, RouteConfig, RuleId};
use super::store::{Lookup, ResponseCache};

/// Errors surfaced to callers of [`CachedFetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transport failed outright.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Executes requests through the cache table.
///
/// Read requests are served from the [`ResponseCache`] when possible;
/// mutating requests always reach the transport and invalidate cache
/// entries by derived tag.
///
/// # Known gap
///
/// The miss path is check-then-fetch-then-store without coalescing:
/// concurrent misses on the same key each reach the transport and the last
/// store wins. The feature loader is the layer that deduplicates concurrent
/// work; this component intentionally does not.
pub struct CachedFetcher {
    cache: Arc<ResponseCache>,
    config: Arc<CacheConfig>,
    transport: Arc<dyn Transport>,
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl CachedFetcher {
    /// Create a fetcher over the given cache, table and transport.
    pub fn new(
        cache: Arc<ResponseCache>,
        config: Arc<CacheConfig>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            cache,
            config,
            transport,
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The underlying cache (for stats and direct invalidation).
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Execute a request, consulting the cache for read methods.
    pub async fn execute(&self, request: TransportRequest) -> Result<Bytes, FetchError> {
        if request.method.is_mutating() {
            return self.execute_mutation(request).await;
        }

        let key = request.cache_key();
        let path = CacheConfig::path_of(&request.url);
        let (rule, route) = self.config.route_config(path);
        let route = route.clone();

        match self.cache.get(&key) {
            Lookup::Hit(bytes) => Ok(bytes),
            Lookup::Stale(bytes) => {
                self.spawn_refresh(key, request, route, rule);
                Ok(bytes)
            }
            Lookup::Miss => {
                let response = self.transport.execute(request).await?;
                if !response.is_success() {
                    return Err(FetchError::Status(response.status));
                }
                self.cache.insert(&key, response.body.clone(), &route, rule);
                Ok(response.body)
            }
        }
    }

    async fn execute_mutation(&self, request: TransportRequest) -> Result<Bytes, FetchError> {
        let url = request.url.clone();
        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            return Err(FetchError::Status(response.status));
        }

        let tags = self.config.tags_for_mutation(&url);
        if !tags.is_empty() {
            let removed = self.cache.invalidate_tags(&tags);
            debug!(url = %url, ?tags, removed, "Mutation invalidated cache entries");
        }
        Ok(response.body)
    }

    /// Schedule a background refresh for a stale entry.
    ///
    /// At most one refresh per key is in flight; failures are logged and
    /// never reach the caller that was served the stale value.
    fn spawn_refresh(&self, key: String, request: TransportRequest, route: RouteConfig, rule: RuleId) {
        {
            let mut refreshing = self.refreshing.lock();
            if !refreshing.insert(key.clone()) {
                return;
            }
        }

        let transport = Arc::clone(&self.transport);
        let cache = Arc::clone(&self.cache);
        let refreshing = Arc::clone(&self.refreshing);

        tokio::spawn(async move {
            let result = transport.execute(request).await;
            match result {
                Ok(response) if response.is_success() => {
                    cache.insert(&key, response.body, &route, rule);
                    debug!(key = %key, "Background refresh stored fresh entry");
                }
                Ok(response) => {
                    warn!(key = %key, status = response.status, "Background refresh got non-success status");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Background refresh failed");
                }
            }
            refreshing.lock().remove(&key);
        });
    }
}
