//! Wiring of store, origin, client hub and registration for one process.

use std::sync::Arc;

use podcache_protocol::StatusReport;
use tracing::info;
use url::Url;

use crate::{
    application::error::AppError,
    cache::{
        CacheConfig, CacheStore, CacheWorker, ClientHub, FillError, LifecycleError, MemoryStore,
        Origin, Registration, StoreError,
    },
    config::{Settings, StoreBackend},
    infra::{fs_store::FsStore, origin::HttpOrigin},
};

pub struct CacheRuntime {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn Origin>,
    hub: Arc<ClientHub>,
    registration: Arc<Registration>,
    base_url: Url,
    cache: CacheConfig,
}

impl CacheRuntime {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn Origin>,
        base_url: Url,
        cache: CacheConfig,
        channel_capacity: usize,
    ) -> Self {
        let hub = Arc::new(ClientHub::new(channel_capacity));
        let registration = Arc::new(Registration::new(Arc::clone(&hub), Arc::clone(&origin)));
        Self {
            store,
            origin,
            hub,
            registration,
            base_url,
            cache,
        }
    }

    /// Build the configured store backend and the HTTP origin.
    pub async fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let store = open_store(settings).await?;
        let origin: Arc<dyn Origin> = Arc::new(HttpOrigin::new(&settings.origin)?);
        Ok(Self::new(
            store,
            origin,
            settings.origin.base_url.clone(),
            CacheConfig::from(&settings.cache),
            settings.clients.channel_capacity.get(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn hub(&self) -> &Arc<ClientHub> {
        &self.hub
    }

    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache
    }

    /// A fresh worker for `config`, sharing this runtime's store, origin and hub.
    pub fn worker_for(&self, config: CacheConfig) -> Result<Arc<CacheWorker>, LifecycleError> {
        CacheWorker::new(
            config,
            Arc::clone(&self.store),
            Arc::clone(&self.origin),
            Arc::clone(&self.hub),
            &self.base_url,
        )
        .map(Arc::new)
    }

    /// Install the configured version and activate it when allowed.
    ///
    /// A version whose core assets survived in a durable store is restored
    /// without touching the origin.
    pub async fn install_configured(&self) -> Result<(), LifecycleError> {
        let worker = self.worker_for(self.cache.clone())?;
        if self.registration.restore(Arc::clone(&worker)).await {
            info!(
                target = "podcache::runtime",
                version = %self.cache.version,
                "restored cache version from store"
            );
            return Ok(());
        }
        self.registration.register(worker).await
    }

    /// Install the configured version and force it active.
    pub async fn warm(&self) -> Result<(), LifecycleError> {
        self.install_configured().await?;
        if self.registration.waiting().is_some() {
            self.registration.skip_waiting().await;
        }
        info!(
            target = "podcache::runtime",
            version = %self.cache.version,
            "cache warmed"
        );
        Ok(())
    }

    pub async fn status(&self) -> Result<StatusReport, StoreError> {
        let namespaces = self.store.namespaces().await?.into_iter().collect();
        Ok(StatusReport {
            active_version: self
                .registration
                .active()
                .map(|worker| worker.version().to_string()),
            waiting_version: self
                .registration
                .waiting()
                .map(|worker| worker.version().to_string()),
            namespaces,
            clients: self.hub.len(),
        })
    }

    /// Whether `url` is pinned in the active version's content namespace.
    pub async fn is_cached(&self, url: &str) -> Result<bool, FillError> {
        match self.registration.active() {
            Some(worker) => worker.is_content_cached(url).await,
            None => Ok(false),
        }
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn CacheStore>, AppError> {
    match settings.store.backend {
        StoreBackend::Memory => {
            info!(target = "podcache::runtime", backend = "memory", "cache store opened");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Filesystem => {
            let store = FsStore::open(&settings.store.directory).await?;
            info!(
                target = "podcache::runtime",
                backend = "filesystem",
                directory = %store.root().display(),
                "cache store opened"
            );
            Ok(Arc::new(store))
        }
    }
}
