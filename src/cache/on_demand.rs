//! Explicit "keep this offline" requests.
//!
//! The content namespace is only ever written here. A request for a URL that
//! is already stored does no network work; a request for a URL that is
//! already being fetched is dropped, since the running fetch will notify
//! every client when it finishes.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use podcache_protocol::Notification;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::clients::ClientHub;
use super::error::FillError;
use super::keys::{RequestKey, resolve_client};
use super::origin::{FetchRequest, Origin};
use super::store::CacheStore;

const METRIC_ON_DEMAND_TOTAL: &str = "podcache_on_demand_total";

#[derive(Debug)]
pub enum OnDemandOutcome {
    /// Fetched and stored; clients notified.
    Stored,
    /// Already present; no fetch, clients notified again.
    AlreadyCached,
    /// Another request for the same URL is running.
    InFlight,
    Failed(FillError),
}

impl OnDemandOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnDemandOutcome::Stored => "stored",
            OnDemandOutcome::AlreadyCached => "already_cached",
            OnDemandOutcome::InFlight => "in_flight",
            OnDemandOutcome::Failed(_) => "failed",
        }
    }
}

pub struct OnDemandController {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn Origin>,
    hub: Arc<ClientHub>,
    namespace: String,
    base: Url,
    notify_failures: bool,
    in_flight: DashMap<String, ()>,
}

impl OnDemandController {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn Origin>,
        hub: Arc<ClientHub>,
        namespace: String,
        base: Url,
        notify_failures: bool,
    ) -> Self {
        Self {
            store,
            origin,
            hub,
            namespace,
            base,
            notify_failures,
            in_flight: DashMap::new(),
        }
    }

    /// Is `url` present in the content namespace?
    ///
    /// An unreadable entry counts as absent.
    pub async fn is_cached(&self, url: &str) -> Result<bool, FillError> {
        let resolved = self.resolve(url)?;
        Ok(self.stored(&RequestKey::get(&resolved)).await)
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn cache_content(&self, url: &str) -> OnDemandOutcome {
        let outcome = match self.resolve(url) {
            Ok(resolved) => self.fill_once(&resolved).await,
            Err(err) => OnDemandOutcome::Failed(err),
        };

        counter!(METRIC_ON_DEMAND_TOTAL, "result" => outcome.as_str()).increment(1);

        match &outcome {
            OnDemandOutcome::Stored | OnDemandOutcome::AlreadyCached => {
                info!(target = "podcache::on_demand", url, "audio cached successfully");
                self.hub.broadcast(Notification::ContentCached {
                    url: url.to_string(),
                });
            }
            OnDemandOutcome::InFlight => {
                debug!(target = "podcache::on_demand", url, "already caching; request dropped");
            }
            OnDemandOutcome::Failed(err) => {
                warn!(target = "podcache::on_demand", url, error = %err, "failed to cache audio");
                if self.notify_failures {
                    self.hub.broadcast(Notification::ContentCacheFailed {
                        url: url.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        outcome
    }

    async fn fill_once(&self, url: &Url) -> OnDemandOutcome {
        let claimed = match self.in_flight.entry(url.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(());
                true
            }
        };
        if !claimed {
            return OnDemandOutcome::InFlight;
        }

        let _guard = InFlightGuard {
            map: &self.in_flight,
            key: url.to_string(),
        };

        match self.fill(url).await {
            Ok(true) => OnDemandOutcome::Stored,
            Ok(false) => OnDemandOutcome::AlreadyCached,
            Err(err) => OnDemandOutcome::Failed(err),
        }
    }

    /// Returns false when the entry already existed.
    async fn fill(&self, url: &Url) -> Result<bool, FillError> {
        let key = RequestKey::get(url);
        if self.stored(&key).await {
            debug!(target = "podcache::on_demand", url = %url, "audio already cached");
            return Ok(false);
        }

        debug!(target = "podcache::on_demand", url = %url, "caching audio");
        let response = self.origin.fetch(&FetchRequest::get(url.clone())).await?;
        if !response.is_success() {
            return Err(FillError::Status {
                status: response.status,
            });
        }

        self.store.put(&self.namespace, key, response).await?;
        Ok(true)
    }

    async fn stored(&self, key: &RequestKey) -> bool {
        match self.store.get(&self.namespace, key).await {
            Ok(entry) => entry.is_some(),
            Err(err) => {
                warn!(
                    target = "podcache::on_demand",
                    namespace = %self.namespace,
                    key = %key,
                    error = %err,
                    "unreadable audio entry; refetching"
                );
                false
            }
        }
    }

    fn resolve(&self, url: &str) -> Result<Url, FillError> {
        resolve_client(&self.base, url).map_err(|source| FillError::InvalidUrl {
            url: url.to_string(),
            source,
        })
    }
}

struct InFlightGuard<'a> {
    map: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}
