//! Cache storage.
//!
//! `CacheStore` is the namespaced key→entry capability every other cache
//! component talks to. `MemoryStore` is the in-process backend; the durable
//! filesystem backend lives in `infra::fs_store`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::keys::RequestKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A response as stored in, or served from, the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A plain-text 503 produced locally when neither store nor origin can answer.
    pub fn service_unavailable(message: &'static str) -> Self {
        Self::new(
            503,
            vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            Bytes::from_static(message.as_bytes()),
        )
    }

    /// True for 2xx statuses, the only responses that may populate a namespace.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache entry at `{path}`: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("failed to encode entry metadata: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid namespace name `{0}`")]
    InvalidNamespace(String),
}

/// Namespaced persistent cache.
///
/// Implementations must tolerate concurrent reads and writes from many tasks;
/// callers add no locking of their own.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create `namespace` if it does not exist yet.
    async fn open(&self, namespace: &str) -> Result<(), StoreError>;

    /// Look up `key` in `namespace`. A missing namespace is a miss.
    async fn get(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, StoreError>;

    /// Insert or overwrite the entry for `key`, creating `namespace` on demand.
    async fn put(
        &self,
        namespace: &str,
        key: RequestKey,
        entry: CachedResponse,
    ) -> Result<(), StoreError>;

    /// Drop `namespace` and every entry in it. Returns false if it did not exist.
    async fn delete(&self, namespace: &str) -> Result<bool, StoreError>;

    /// Names of all namespaces currently present.
    async fn namespaces(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Keys stored in `namespace`, in no particular order.
    async fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>, StoreError>;
}

/// In-memory store used for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: RwLock<BTreeMap<String, HashMap<RequestKey, CachedResponse>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, namespace: &str) -> Result<(), StoreError> {
        rw_write(&self.namespaces, SOURCE, "open")
            .entry(namespace.to_string())
            .or_default();
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, StoreError> {
        Ok(rw_read(&self.namespaces, SOURCE, "get")
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(
        &self,
        namespace: &str,
        key: RequestKey,
        entry: CachedResponse,
    ) -> Result<(), StoreError> {
        rw_write(&self.namespaces, SOURCE, "put")
            .entry(namespace.to_string())
            .or_default()
            .insert(key, entry);
        Ok(())
    }

    async fn delete(&self, namespace: &str) -> Result<bool, StoreError> {
        Ok(rw_write(&self.namespaces, SOURCE, "delete")
            .remove(namespace)
            .is_some())
    }

    async fn namespaces(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(rw_read(&self.namespaces, SOURCE, "namespaces")
            .keys()
            .cloned()
            .collect())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>, StoreError> {
        Ok(rw_read(&self.namespaces, SOURCE, "keys")
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use url::Url;

    use super::*;

    fn key(path: &str) -> RequestKey {
        let url = Url::parse("http://origin.test/")
            .and_then(|base| base.join(path))
            .expect("url");
        RequestKey::get(&url)
    }

    fn entry(body: &'static str) -> CachedResponse {
        CachedResponse::new(200, vec![], body)
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("core", &key("/a")).await.expect("get").is_none());

        store
            .put("core", key("/a"), entry("first"))
            .await
            .expect("put");
        let cached = store.get("core", &key("/a")).await.expect("get");
        assert_eq!(cached.expect("cached").body, Bytes::from("first"));

        // Other namespaces are isolated.
        assert!(store.get("audio", &key("/a")).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn later_put_overwrites() {
        let store = MemoryStore::new();
        store.put("core", key("/a"), entry("one")).await.expect("put");
        store.put("core", key("/a"), entry("two")).await.expect("put");

        let keys = store.keys("core").await.expect("keys");
        assert_eq!(keys.len(), 1);
        let cached = store.get("core", &key("/a")).await.expect("get");
        assert_eq!(cached.expect("cached").body, Bytes::from("two"));
    }

    #[tokio::test]
    async fn delete_removes_namespace() {
        let store = MemoryStore::new();
        store.open("core-v1").await.expect("open");
        store.put("core-v2", key("/a"), entry("x")).await.expect("put");

        let names = store.namespaces().await.expect("names");
        assert!(names.contains("core-v1") && names.contains("core-v2"));

        assert!(store.delete("core-v1").await.expect("delete"));
        assert!(!store.delete("core-v1").await.expect("delete again"));
        let names = store.namespaces().await.expect("names");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["core-v2"]);
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = MemoryStore::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .namespaces
                .write()
                .expect("namespaces lock should be acquired");
            panic!("poison namespaces lock");
        }));

        store.put("core", key("/a"), entry("x")).await.expect("put");
        assert!(store.get("core", &key("/a")).await.expect("get").is_some());
    }

    #[test]
    fn success_range_is_2xx() {
        assert!(CachedResponse::new(204, vec![], "").is_success());
        assert!(!CachedResponse::new(304, vec![], "").is_success());
        assert!(!CachedResponse::service_unavailable("Offline").is_success());
    }
}
