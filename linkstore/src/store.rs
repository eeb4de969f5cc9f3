//! The key-value link store interface.
//!
//! Production deployments back this with an edge KV namespace; the in-memory
//! implementation here exists for local runs and tests. Keys are namespaced
//! strings (`link:<slug>`, `views:<slug>`), see [`crate::types`].

use crate::types::Link;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Optional write parameters, mirroring the KV backend's put options.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// Epoch seconds after which the record expires.
    pub expiration: Option<u64>,
    /// Opaque sidecar metadata stored alongside the record.
    pub metadata: Option<serde_json::Value>,
}

/// One page of a prefix listing.
#[derive(Clone, Debug)]
pub struct Page {
    pub keys: Vec<String>,
    /// Cursor to resume from, absent when the listing is complete.
    pub cursor: Option<String>,
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Link>, StoreError>;

    async fn get_with_metadata(
        &self,
        key: &str,
    ) -> Result<Option<(Link, Option<serde_json::Value>)>, StoreError>;

    async fn put(&self, key: &str, link: Link, options: PutOptions) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page, StoreError>;

    /// Read a counter key, zero when absent.
    async fn get_counter(&self, key: &str) -> Result<u64, StoreError>;

    /// Increment a counter key and return the new value.
    ///
    /// Not coordinated with [`get_counter`](Self::get_counter) reads; callers
    /// using read-then-increment get best-effort semantics only.
    async fn incr_counter(&self, key: &str) -> Result<u64, StoreError>;
}

struct Entry {
    link: Link,
    expiration: Option<u64>,
    metadata: Option<serde_json::Value>,
}

/// In-memory store honoring record expiration on read.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    counters: RwLock<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn expired(expiration: Option<u64>) -> bool {
    matches!(expiration, Some(at) if at <= epoch_now())
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Link>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !expired(entry.expiration))
            .map(|entry| entry.link.clone()))
    }

    async fn get_with_metadata(
        &self,
        key: &str,
    ) -> Result<Option<(Link, Option<serde_json::Value>)>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| !expired(entry.expiration))
            .map(|entry| (entry.link.clone(), entry.metadata.clone())))
    }

    async fn put(&self, key: &str, link: Link, options: PutOptions) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                link,
                expiration: options.expiration,
                metadata: options.metadata,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page, StoreError> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| cursor.is_none_or(|c| key.as_str() > c))
            .map(|(key, _)| key.clone())
            .collect();

        let cursor = if keys.len() > limit {
            keys.truncate(limit);
            keys.last().cloned()
        } else {
            None
        };

        Ok(Page { keys, cursor })
    }

    async fn get_counter(&self, key: &str) -> Result<u64, StoreError> {
        let counters = self.counters.read().await;
        Ok(counters.get(key).copied().unwrap_or(0))
    }

    async fn incr_counter(&self, key: &str) -> Result<u64, StoreError> {
        let mut counters = self.counters.write().await;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::link_key;

    #[tokio::test]
    async fn test_get_put_delete() {
        let store = MemoryStore::new();
        let key = link_key("yt1");

        assert!(store.get(&key).await.unwrap().is_none());

        let link = Link::new("yt1", "https://youtube.com/watch?v=abc123");
        store
            .put(&key, link.clone(), PutOptions::default())
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(link));

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_records_are_absent() {
        let store = MemoryStore::new();
        let key = link_key("gone");
        store
            .put(
                &key,
                Link::new("gone", "https://example.com/"),
                PutOptions {
                    // Already in the past
                    expiration: Some(1),
                    metadata: None,
                },
            )
            .await
            .unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.get_with_metadata(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_prefix_and_cursor() {
        let store = MemoryStore::new();
        for slug in ["a", "b", "c"] {
            store
                .put(
                    &link_key(slug),
                    Link::new(slug, "https://example.com/"),
                    PutOptions::default(),
                )
                .await
                .unwrap();
        }
        store
            .put("views:a", Link::new("a", "x"), PutOptions::default())
            .await
            .unwrap();

        let page = store.list("link:", 2, None).await.unwrap();
        assert_eq!(page.keys, vec!["link:a", "link:b"]);
        let cursor = page.cursor.expect("partial listing has a cursor");

        let page = store.list("link:", 2, Some(&cursor)).await.unwrap();
        assert_eq!(page.keys, vec!["link:c"]);
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_counters() {
        let store = MemoryStore::new();
        assert_eq!(store.get_counter("views:x").await.unwrap(), 0);
        assert_eq!(store.incr_counter("views:x").await.unwrap(), 1);
        assert_eq!(store.incr_counter("views:x").await.unwrap(), 2);
        assert_eq!(store.get_counter("views:x").await.unwrap(), 2);
    }
}
