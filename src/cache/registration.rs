//! Active/waiting worker slots and version hand-over.
//!
//! A newly registered worker installs first. If install fails, nothing
//! changes. If it succeeds the worker waits until either it asked to skip
//! waiting, no worker is active, or no client is still controlled by the
//! active one; then it activates: stale namespaces are deleted, the active
//! slot is swapped and every client is claimed. Fetches already running on
//! the old worker hold their own `Arc` and finish there.

use std::sync::{Arc, RwLock};

use podcache_protocol::Notification;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::clients::ClientHub;
use super::error::LifecycleError;
use super::lock::{rw_read, rw_write};
use super::origin::{FetchRequest, Origin};
use super::store::CachedResponse;
use super::strategy::{RequestClass, ResponseSource, Served};
use super::worker::CacheWorker;

const SOURCE: &str = "cache::registration";

pub struct Registration {
    hub: Arc<ClientHub>,
    origin: Arc<dyn Origin>,
    active: RwLock<Option<Arc<CacheWorker>>>,
    waiting: RwLock<Option<Arc<CacheWorker>>>,
    activation: Mutex<()>,
}

impl Registration {
    pub fn new(hub: Arc<ClientHub>, origin: Arc<dyn Origin>) -> Self {
        Self {
            hub,
            origin,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            activation: Mutex::new(()),
        }
    }

    pub fn hub(&self) -> &Arc<ClientHub> {
        &self.hub
    }

    pub fn active(&self) -> Option<Arc<CacheWorker>> {
        rw_read(&self.active, SOURCE, "active").clone()
    }

    pub fn waiting(&self) -> Option<Arc<CacheWorker>> {
        rw_read(&self.waiting, SOURCE, "waiting").clone()
    }

    /// Install `worker` and activate it when allowed.
    ///
    /// On install failure the worker is discarded and the active worker, if
    /// any, keeps serving.
    #[instrument(skip_all, fields(version = %worker.version()))]
    pub async fn register(&self, worker: Arc<CacheWorker>) -> Result<(), LifecycleError> {
        if self
            .active()
            .is_some_and(|active| active.version() == worker.version())
        {
            info!(target = "podcache::registration", "version already active; nothing to install");
            return Ok(());
        }

        worker.install().await?;
        self.stage(worker).await;
        Ok(())
    }

    /// Adopt a version whose core assets are already in the store.
    ///
    /// Used after a restart with a durable store: the worker skips the
    /// network pre-warm and is staged as if it had just installed. Returns
    /// false, leaving everything untouched, when any manifest asset is missing.
    pub async fn restore(&self, worker: Arc<CacheWorker>) -> bool {
        if self
            .active()
            .is_some_and(|active| active.version() == worker.version())
        {
            return true;
        }
        if !worker.restore().await {
            return false;
        }
        self.stage(worker).await;
        true
    }

    async fn stage(&self, worker: Arc<CacheWorker>) {
        let replaced = rw_write(&self.waiting, SOURCE, "stage").replace(Arc::clone(&worker));
        if let Some(previous) = replaced {
            previous.retire();
        }

        if self.active().is_some() {
            self.hub.broadcast(Notification::UpdateWaiting {
                version: worker.version().to_string(),
            });
        }

        self.try_activate().await;
    }

    /// Force the waiting worker, if any, to activate now.
    pub async fn skip_waiting(&self) -> bool {
        match self.waiting() {
            Some(worker) => {
                worker.skip_waiting();
                self.try_activate().await
            }
            None => {
                info!(target = "podcache::registration", "skip waiting requested with no waiting worker");
                false
            }
        }
    }

    async fn try_activate(&self) -> bool {
        let _serial = self.activation.lock().await;

        let Some(candidate) = self.waiting() else {
            return false;
        };

        let ready = candidate.wants_skip_waiting()
            || match self.active() {
                None => true,
                Some(active) => self.hub.controlled_by(active.version()) == 0,
            };
        if !ready {
            info!(
                target = "podcache::registration",
                version = candidate.version(),
                "new version installed; waiting for clients to release the old one"
            );
            return false;
        }

        {
            let mut slot = rw_write(&self.waiting, SOURCE, "try_activate.take");
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, &candidate) => {
                    slot.take();
                }
                _ => return false,
            }
        }

        let report = candidate.activate().await;
        if !report.failed.is_empty() {
            warn!(
                target = "podcache::registration",
                failed = ?report.failed,
                "some stale namespaces could not be deleted"
            );
        }

        let previous = rw_write(&self.active, SOURCE, "try_activate.swap")
            .replace(Arc::clone(&candidate));
        if let Some(previous) = previous {
            previous.retire();
        }

        let claimed = candidate.claim_clients();
        self.hub.broadcast(Notification::ControllerChanged {
            version: candidate.version().to_string(),
        });

        info!(
            target = "podcache::registration",
            version = candidate.version(),
            deleted = ?report.deleted,
            claimed,
            "worker activated"
        );
        true
    }

    /// Answer an intercepted request through the active worker.
    ///
    /// Without an active worker requests go straight to the origin.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Served {
        if let Some(worker) = self.active() {
            return worker.handle_fetch(request).await;
        }

        match self.origin.fetch(request).await {
            Ok(response) => Served {
                response,
                class: RequestClass::Core,
                source: ResponseSource::Network,
            },
            Err(err) => {
                warn!(error = %err, "uncontrolled request failed");
                Served {
                    response: CachedResponse::service_unavailable("Offline"),
                    class: RequestClass::Core,
                    source: ResponseSource::Unavailable,
                }
            }
        }
    }
}
