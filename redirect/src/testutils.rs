use crate::errors::RedirectError;
use async_trait::async_trait;
use http::Response;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use linkstore::store::{Page, PutOptions};
use linkstore::{Link, LinkStore, MemoryStore, StoreError, link_key};
use std::sync::Arc;

pub const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const ANDROID_CHROME_UA: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7 Build/TQ3A.230805.001) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

pub const IPHONE_SAFARI_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1";

pub const GOOGLEBOT_UA: &str = "Mozilla/5.0 (Linux; Android 6.0.1; Nexus 5X Build/MMB29P) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36 \
     (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

pub const MESSENGER_IOS_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148 \
     [FBAN/FBIOS;FBAV/425.0.0.21.112;FBDV/iPhone13,2;FBSN/iOS;FBSV/16.5;FBLC/en_US]";

/// A store populated with the given links under their `link:` keys.
pub async fn store_with(links: &[Link]) -> Arc<dyn LinkStore> {
    let store = MemoryStore::new();
    for link in links {
        store
            .put(&link_key(&link.slug), link.clone(), PutOptions::default())
            .await
            .unwrap();
    }
    Arc::new(store)
}

/// A store whose every operation fails with a backend error.
pub struct FailingStore;

#[async_trait]
impl LinkStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Link>, StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }

    async fn get_with_metadata(
        &self,
        _key: &str,
    ) -> Result<Option<(Link, Option<serde_json::Value>)>, StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }

    async fn put(&self, _key: &str, _link: Link, _options: PutOptions) -> Result<(), StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }

    async fn list(
        &self,
        _prefix: &str,
        _limit: usize,
        _cursor: Option<&str>,
    ) -> Result<Page, StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }

    async fn get_counter(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }

    async fn incr_counter(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::Backend("kv unavailable".into()))
    }
}

/// A store that serves link records normally but fails counter operations:
/// reads too when `fail_counter_reads` is set, increments always.
pub struct BrokenCounterStore {
    inner: MemoryStore,
    fail_counter_reads: bool,
}

pub async fn broken_counter_store(
    links: &[Link],
    fail_counter_reads: bool,
) -> Arc<dyn LinkStore> {
    let inner = MemoryStore::new();
    for link in links {
        inner
            .put(&link_key(&link.slug), link.clone(), PutOptions::default())
            .await
            .unwrap();
    }
    Arc::new(BrokenCounterStore {
        inner,
        fail_counter_reads,
    })
}

#[async_trait]
impl LinkStore for BrokenCounterStore {
    async fn get(&self, key: &str) -> Result<Option<Link>, StoreError> {
        self.inner.get(key).await
    }

    async fn get_with_metadata(
        &self,
        key: &str,
    ) -> Result<Option<(Link, Option<serde_json::Value>)>, StoreError> {
        self.inner.get_with_metadata(key).await
    }

    async fn put(&self, key: &str, link: Link, options: PutOptions) -> Result<(), StoreError> {
        self.inner.put(key, link, options).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn list(
        &self,
        prefix: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<Page, StoreError> {
        self.inner.list(prefix, limit, cursor).await
    }

    async fn get_counter(&self, key: &str) -> Result<u64, StoreError> {
        if self.fail_counter_reads {
            return Err(StoreError::Backend("counter backend unavailable".into()));
        }
        self.inner.get_counter(key).await
    }

    async fn incr_counter(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::Backend("counter backend unavailable".into()))
    }
}

pub async fn body_string(response: Response<BoxBody<Bytes, RedirectError>>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
