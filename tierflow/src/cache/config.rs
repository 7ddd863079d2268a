//! Route-level cache configuration.
//!
//! A request's cache behavior is selected by longest literal path-prefix
//! match against a rule table; requests matching no rule use the default
//! config. Mutating requests derive invalidation tags from URL-substring
//! rules.

use std::time::Duration;

/// Default TTL when no rule matches.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default per-rule entry budget.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Identifier of the matched rule inside a [`CacheConfig`].
pub type RuleId = usize;

/// Sentinel rule id for the default config.
pub const DEFAULT_RULE: RuleId = usize::MAX;

/// Cache behavior for one route family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Time entries stay servable.
    pub ttl: Duration,
    /// Entry budget for this rule; exceeding it evicts the oldest insert.
    pub max_entries: usize,
    /// Serve expiring entries immediately and refresh in the background.
    pub stale_while_revalidate: bool,
    /// Tags attached to entries stored under this rule.
    pub tags: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            stale_while_revalidate: false,
            tags: Vec::new(),
        }
    }
}

impl RouteConfig {
    /// Create a config with the given TTL and defaults elsewhere.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }

    /// Set the entry budget.
    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Enable stale-while-revalidate.
    pub fn stale_while_revalidate(mut self) -> Self {
        self.stale_while_revalidate = true;
        self
    }

    /// Attach tags to entries stored under this config.
    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// A path-prefix rule in the cache table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Literal path prefix, e.g. `/api/products`.
    pub prefix: String,
    /// Behavior for matching requests.
    pub config: RouteConfig,
}

/// Substring-driven tag derivation for mutating requests.
#[derive(Debug, Clone)]
pub struct TagRule {
    /// Literal substring matched against the request URL.
    pub substring: String,
    /// Tags to invalidate when the substring matches.
    pub tags: Vec<String>,
}

/// The full cache configuration surface.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    rules: Vec<RouteRule>,
    default: RouteConfig,
    mutation_tags: Vec<TagRule>,
}

impl CacheConfig {
    /// Empty table with default fallback behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path-prefix rule.
    pub fn with_rule(mut self, prefix: impl Into<String>, config: RouteConfig) -> Self {
        self.rules.push(RouteRule {
            prefix: prefix.into(),
            config,
        });
        self
    }

    /// Replace the default config.
    pub fn with_default(mut self, config: RouteConfig) -> Self {
        self.default = config;
        self
    }

    /// Add a mutation tag-derivation rule.
    pub fn with_mutation_tags(mut self, substring: impl Into<String>, tags: &[&str]) -> Self {
        self.mutation_tags.push(TagRule {
            substring: substring.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    /// Select the config for a request path.
    ///
    /// Longest literal prefix wins; ties cannot occur because prefixes of
    /// equal length matching the same path are identical strings.
    pub fn route_config(&self, path: &str) -> (RuleId, &RouteConfig) {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| path.starts_with(&rule.prefix))
            .max_by_key(|(_, rule)| rule.prefix.len())
            .map(|(id, rule)| (id, &rule.config))
            .unwrap_or((DEFAULT_RULE, &self.default))
    }

    /// Tags a mutating request should invalidate, by URL-substring match.
    pub fn tags_for_mutation(&self, url: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for rule in &self.mutation_tags {
            if url.contains(&rule.substring) {
                for tag in &rule.tags {
                    if !tags.contains(tag) {
                        tags.push(tag.clone());
                    }
                }
            }
        }
        tags
    }

    /// The registered path-prefix rules.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Strip scheme, host and query from a URL, leaving the path.
    pub fn path_of(url: &str) -> &str {
        let after_scheme = match url.find("://") {
            Some(idx) => {
                let rest = &url[idx + 3..];
                match rest.find('/') {
                    Some(slash) => &rest[slash..],
                    None => "/",
                }
            }
            None => url,
        };
        match after_scheme.find('?') {
            Some(q) => &after_scheme[..q],
            None => after_scheme,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CacheConfig {
        CacheConfig::new()
            .with_rule("/api/products", RouteConfig::with_ttl(Duration::from_secs(120)))
            .with_rule(
                "/api/products/featured",
                RouteConfig::with_ttl(Duration::from_secs(30)),
            )
            .with_rule("/api/user", RouteConfig::with_ttl(Duration::from_secs(10)))
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = table();
        let (_, featured) = config.route_config("/api/products/featured/today");
        assert_eq!(featured.ttl, Duration::from_secs(30));

        let (_, products) = config.route_config("/api/products/42");
        assert_eq!(products.ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_unmatched_path_uses_default() {
        let config = table();
        let (id, route) = config.route_config("/health");
        assert_eq!(id, DEFAULT_RULE);
        assert_eq!(route.ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_tags_for_mutation_union_without_duplicates() {
        let config = CacheConfig::new()
            .with_mutation_tags("/products", &["catalog", "listing"])
            .with_mutation_tags("/cart", &["cart", "listing"]);

        let tags = config.tags_for_mutation("https://shop.example/api/products/cart/add");
        assert_eq!(tags, vec!["catalog", "listing", "cart"]);
    }

    #[test]
    fn test_tags_for_mutation_no_match() {
        let config = CacheConfig::new().with_mutation_tags("/products", &["catalog"]);
        assert!(config.tags_for_mutation("/api/session").is_empty());
    }

    #[test]
    fn test_path_of_strips_scheme_and_query() {
        assert_eq!(
            CacheConfig::path_of("https://shop.example/api/products?page=2"),
            "/api/products"
        );
        assert_eq!(CacheConfig::path_of("/api/products?page=2"), "/api/products");
        assert_eq!(CacheConfig::path_of("https://shop.example"), "/");
    }
}
