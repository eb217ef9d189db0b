//! One cache version as an explicit service object.
//!
//! A `CacheWorker` is built once per version and owns everything that version
//! needs: its namespace names, the resolved manifest, the strategy router and
//! the on-demand controller. The store, origin and client hub are shared.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::info;
use url::Url;

use super::clients::ClientHub;
use super::config::CacheConfig;
use super::error::{FillError, LifecycleError};
use super::keys::{NamespaceNames, RequestKey, resolve};
use super::lifecycle::{CleanupReport, Lifecycle};
use super::lock::{rw_read, rw_write};
use super::on_demand::{OnDemandController, OnDemandOutcome};
use super::origin::{FetchRequest, Origin};
use super::store::CacheStore;
use super::strategy::{Classifier, Served, StrategyRouter};

const SOURCE: &str = "cache::worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(label)
    }
}

pub struct CacheWorker {
    config: CacheConfig,
    names: NamespaceNames,
    lifecycle: Lifecycle,
    router: StrategyRouter,
    on_demand: OnDemandController,
    hub: Arc<ClientHub>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl CacheWorker {
    /// Build the worker for `config.version`. Fails if a manifest entry or the
    /// offline shell cannot be resolved against `base`.
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn Origin>,
        hub: Arc<ClientHub>,
        base: &Url,
    ) -> Result<Self, LifecycleError> {
        let names = config.namespaces();

        let manifest = config
            .manifest
            .iter()
            .map(|asset| {
                resolve(base, asset).map_err(|source| LifecycleError::InvalidManifest {
                    asset: asset.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let shell = resolve(base, &config.offline_shell).map_err(|source| {
            LifecycleError::InvalidManifest {
                asset: config.offline_shell.clone(),
                source,
            }
        })?;

        let lifecycle = Lifecycle::new(
            Arc::clone(&store),
            Arc::clone(&origin),
            names.clone(),
            manifest,
        );
        let router = StrategyRouter::new(
            Arc::clone(&store),
            Arc::clone(&origin),
            names.clone(),
            Classifier::from_config(&config),
            RequestKey::get(&shell),
        );
        let on_demand = OnDemandController::new(
            store,
            origin,
            Arc::clone(&hub),
            names.content.clone(),
            base.clone(),
            config.notify_failures,
        );

        Ok(Self {
            config,
            names,
            lifecycle,
            router,
            on_demand,
            hub,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn names(&self) -> &NamespaceNames {
        &self.names
    }

    pub fn state(&self) -> WorkerState {
        *rw_read(&self.state, SOURCE, "state")
    }

    fn set_state(&self, state: WorkerState) {
        *rw_write(&self.state, SOURCE, "set_state") = state;
        info!(target = "podcache::worker", version = %self.config.version, %state, "worker state changed");
    }

    /// Ask to take over without waiting for existing clients to let go.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Pre-warm the core namespace. On failure the worker becomes redundant.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        self.set_state(WorkerState::Installing);
        match self.lifecycle.install().await {
            Ok(()) => {
                self.set_state(WorkerState::Installed);
                if self.config.eager_activation {
                    self.skip_waiting();
                }
                Ok(())
            }
            Err(err) => {
                self.set_state(WorkerState::Redundant);
                Err(err)
            }
        }
    }

    /// Mark the worker installed without fetching, if every manifest asset
    /// is already stored under this version's core namespace.
    pub async fn restore(&self) -> bool {
        if !self.lifecycle.is_warm().await {
            return false;
        }
        self.set_state(WorkerState::Installed);
        self.skip_waiting();
        true
    }

    /// First half of activation: garbage-collect stale namespaces.
    pub async fn activate(&self) -> CleanupReport {
        self.set_state(WorkerState::Activating);
        self.lifecycle.reconcile().await
    }

    /// Second half of activation: take control of every connected client.
    pub fn claim_clients(&self) -> usize {
        let claimed = self.hub.claim(&self.config.version);
        self.set_state(WorkerState::Activated);
        claimed
    }

    pub(crate) fn retire(&self) {
        self.set_state(WorkerState::Redundant);
    }

    pub async fn handle_fetch(&self, request: &FetchRequest) -> Served {
        self.router.handle(request).await
    }

    pub async fn cache_content(&self, url: &str) -> OnDemandOutcome {
        self.on_demand.cache_content(url).await
    }

    pub async fn is_content_cached(&self, url: &str) -> Result<bool, FillError> {
        self.on_demand.is_cached(url).await
    }
}
