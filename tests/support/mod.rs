#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use podcache::application::runtime::CacheRuntime;
use podcache::cache::{
    CacheConfig, CacheStore, CachedResponse, FetchRequest, MemoryStore, Origin, OriginError,
};
use url::Url;

pub const BASE: &str = "http://origin.test/";

pub fn base() -> Url {
    Url::parse(BASE).expect("base url")
}

pub fn url(path: &str) -> Url {
    base().join(path).expect("joined url")
}

#[derive(Clone)]
enum Script {
    Respond { status: u16, body: String },
    Fail,
}

/// Fake origin with per-path answers and a call log.
///
/// Unscripted paths answer 200 with the path as body.
#[derive(Default)]
pub struct ScriptedOrigin {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedOrigin {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.scripts.lock().expect("scripts").insert(
            path.to_string(),
            Script::Respond {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn fail(&self, path: &str) {
        self.scripts
            .lock()
            .expect("scripts")
            .insert(path.to_string(), Script::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay") = Some(delay);
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls").len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|called| called.as_str() == path)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().expect("calls").clear();
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, OriginError> {
        let path = request.url.path().to_string();
        self.calls.lock().expect("calls").push(path.clone());

        let delay = *self.delay.lock().expect("delay");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(OriginError::new(&request.url, "connection refused"));
        }

        let script = self.scripts.lock().expect("scripts").get(&path).cloned();
        match script {
            Some(Script::Fail) => Err(OriginError::new(&request.url, "connection reset")),
            Some(Script::Respond { status, body }) => Ok(CachedResponse::new(
                status,
                vec![("content-type".to_string(), "text/plain".to_string())],
                body,
            )),
            None => Ok(CachedResponse::new(
                200,
                vec![("content-type".to_string(), "text/plain".to_string())],
                path,
            )),
        }
    }
}

pub fn config(version: &str, manifest: &[&str]) -> CacheConfig {
    CacheConfig {
        version: version.to_string(),
        manifest: manifest.iter().map(|asset| asset.to_string()).collect(),
        ..CacheConfig::default()
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub origin: Arc<ScriptedOrigin>,
    pub runtime: Arc<CacheRuntime>,
}

impl Harness {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    pub fn with_store(store: Arc<MemoryStore>, config: CacheConfig) -> Self {
        Self::build(store, base(), config)
    }

    /// Origin mounted at `base`, which may carry a path prefix.
    pub fn with_base(base: Url, config: CacheConfig) -> Self {
        Self::build(Arc::new(MemoryStore::new()), base, config)
    }

    fn build(store: Arc<MemoryStore>, base: Url, config: CacheConfig) -> Self {
        let origin = ScriptedOrigin::new();
        let runtime = Arc::new(CacheRuntime::new(
            store.clone(),
            origin.clone(),
            base,
            config,
            32,
        ));
        Self {
            store,
            origin,
            runtime,
        }
    }

    /// Install and activate the configured version; panics on failure.
    pub async fn activated(config: CacheConfig) -> Self {
        let harness = Self::new(config);
        harness
            .runtime
            .install_configured()
            .await
            .expect("install should succeed");
        assert!(harness.runtime.registration().active().is_some());
        harness.origin.reset_calls();
        harness
    }

    pub async fn entries(&self, namespace: &str) -> usize {
        self.store.keys(namespace).await.expect("keys").len()
    }
}
