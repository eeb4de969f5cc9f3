//! Slug resolution against the link store.
//!
//! Read-only: the resolver validates the path segment, looks the record up
//! through a bounded TTL cache, and masks store failures as "not found" so a
//! broken backend degrades to pass-through routing instead of a 5xx.

use crate::config::{Config, ValidationError};
use crate::metrics_defs::STORE_ERRORS_MASKED;
use indexmap::IndexMap;
use linkstore::{Link, LinkStore, link_key};
use moka::sync::Cache;
use regex::Regex;
use shared::counter;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct SlugResolver {
    store: Arc<dyn LinkStore>,
    cache: Cache<String, Link>,
    slug_pattern: Regex,
    reserved: HashSet<String>,
    case_sensitive: bool,
}

impl SlugResolver {
    pub fn new(store: Arc<dyn LinkStore>, config: &Config) -> Result<Self, ValidationError> {
        let slug_pattern = Regex::new(&config.slug_regex)
            .map_err(|e| ValidationError::InvalidSlugPattern(e.to_string()))?;

        let cache = Cache::builder()
            .max_capacity(config.cache.link_capacity)
            .time_to_live(Duration::from_secs(config.cache.link_ttl_secs))
            .build();

        Ok(SlugResolver {
            store,
            cache,
            slug_pattern,
            reserved: config.reserved_slugs.iter().cloned().collect(),
            case_sensitive: config.case_sensitive,
        })
    }

    /// Whether the path segment is eligible for lookup at all. Reserved
    /// words and non-matching segments fall through to default routing.
    pub fn is_candidate(&self, slug: &str) -> bool {
        !slug.is_empty() && !self.reserved.contains(slug) && self.slug_pattern.is_match(slug)
    }

    /// Resolve a raw path segment to its link record.
    ///
    /// Case-insensitive mode looks up the lowercased key first and retries
    /// the original-case key on a miss, covering mixed-case slugs stored
    /// before normalization was introduced.
    pub async fn resolve(&self, slug: &str) -> Option<Link> {
        if !self.is_candidate(slug) {
            return None;
        }

        if self.case_sensitive {
            return self.fetch(&link_key(slug)).await;
        }

        let normalized = slug.to_lowercase();
        match self.fetch(&link_key(&normalized)).await {
            Some(link) => Some(link),
            None if normalized != slug => self.fetch(&link_key(slug)).await,
            None => None,
        }
    }

    async fn fetch(&self, key: &str) -> Option<Link> {
        if let Some(link) = self.cache.get(key) {
            return Some(link);
        }

        match self.store.get(key).await {
            Ok(Some(link)) => {
                self.cache.insert(key.to_string(), link.clone());
                Some(link)
            }
            Ok(None) => None,
            Err(e) => {
                // A failing store must read as a miss, never a 5xx
                tracing::warn!(key, error = %e, "link store error masked as not-found");
                counter!(STORE_ERRORS_MASKED).increment(1);
                None
            }
        }
    }
}

/// Merge the request's query parameters into the stored destination URL.
///
/// The stored URL's own parameters win on key conflicts; an unparseable
/// destination is returned unchanged.
pub fn merge_query(target: &str, search: Option<&str>) -> String {
    let Some(search) = search.filter(|s| !s.is_empty()) else {
        return target.to_string();
    };
    let Ok(mut url) = Url::parse(target) else {
        return target.to_string();
    };

    let mut merged: IndexMap<String, String> = url::form_urlencoded::parse(search.as_bytes())
        .into_owned()
        .collect();
    for (key, value) in url.query_pairs().into_owned() {
        merged.insert(key, value);
    }

    if merged.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(merged.iter());
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{FailingStore, store_with};

    async fn resolver_with(links: &[Link], case_sensitive: bool) -> SlugResolver {
        let config = Config {
            case_sensitive,
            ..Config::default()
        };
        SlugResolver::new(store_with(links).await, &config).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_stored_slug() {
        let resolver =
            resolver_with(&[Link::new("sink-cool", "https://sink.cool/")], false).await;
        let link = resolver.resolve("sink-cool").await.unwrap();
        assert_eq!(link.url, "https://sink.cool/");
    }

    #[tokio::test]
    async fn test_rejects_reserved_and_invalid() {
        let resolver = resolver_with(&[Link::new("dashboard", "https://x.example/")], false).await;
        assert!(resolver.resolve("dashboard").await.is_none());
        assert!(resolver.resolve("").await.is_none());
        assert!(resolver.resolve("bad slug!").await.is_none());
        assert!(resolver.resolve("nested/path").await.is_none());
    }

    #[tokio::test]
    async fn test_case_insensitive_normalizes_before_lookup() {
        let resolver = resolver_with(&[Link::new("promo", "https://x.example/")], false).await;
        assert!(resolver.resolve("PROMO").await.is_some());
    }

    #[tokio::test]
    async fn test_case_insensitive_falls_back_to_original_case() {
        // Legacy record stored before lowercasing was enforced
        let resolver = resolver_with(&[Link::new("Promo", "https://x.example/")], false).await;
        assert!(resolver.resolve("Promo").await.is_some());
        // Nothing under the lowercase key and no original-case variant
        assert!(resolver.resolve("promo").await.is_none());
    }

    #[tokio::test]
    async fn test_case_sensitive_single_lookup() {
        let resolver = resolver_with(&[Link::new("Promo", "https://x.example/")], true).await;
        assert!(resolver.resolve("Promo").await.is_some());
        assert!(resolver.resolve("promo").await.is_none());
    }

    #[tokio::test]
    async fn test_store_errors_masked_as_not_found() {
        let config = Config::default();
        let resolver = SlugResolver::new(Arc::new(FailingStore), &config).unwrap();
        assert!(resolver.resolve("anything").await.is_none());
    }

    #[test]
    fn test_merge_query_appends_request_params() {
        assert_eq!(
            merge_query("https://example.com/page", Some("ref=tw")),
            "https://example.com/page?ref=tw"
        );
    }

    #[test]
    fn test_merge_query_stored_params_win() {
        assert_eq!(
            merge_query("https://example.com/page?ref=orig", Some("ref=tw&x=1")),
            "https://example.com/page?ref=orig&x=1"
        );
    }

    #[test]
    fn test_merge_query_no_search_is_identity() {
        assert_eq!(
            merge_query("https://example.com/page?a=1", None),
            "https://example.com/page?a=1"
        );
        assert_eq!(
            merge_query("https://example.com/page?a=1", Some("")),
            "https://example.com/page?a=1"
        );
    }

    #[test]
    fn test_merge_query_unparseable_target_unchanged() {
        assert_eq!(merge_query("not a url", Some("a=1")), "not a url");
    }
}
