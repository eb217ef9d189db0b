//! Install and activation steps for one cache version.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use metrics::{counter, histogram};
use tracing::{info, instrument, warn};
use url::Url;

use super::error::{FillError, LifecycleError};
use super::keys::{NamespaceNames, RequestKey};
use super::origin::{FetchRequest, Origin};
use super::store::CacheStore;

const METRIC_INSTALL_TOTAL: &str = "podcache_install_total";
const METRIC_INSTALL_MS: &str = "podcache_install_ms";
const METRIC_NAMESPACE_DELETED_TOTAL: &str = "podcache_namespace_deleted_total";

/// Namespaces touched by a reconcile pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Lifecycle {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn Origin>,
    names: NamespaceNames,
    manifest: Vec<Url>,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn Origin>,
        names: NamespaceNames,
        manifest: Vec<Url>,
    ) -> Self {
        Self {
            store,
            origin,
            names,
            manifest,
        }
    }

    pub fn names(&self) -> &NamespaceNames {
        &self.names
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Fetch and store every manifest asset into the core namespace.
    ///
    /// All-or-nothing: the first failed fetch, non-2xx answer or store write
    /// fails the whole install. Entries written before the failure may remain
    /// in the store but the caller must not treat the version as ready.
    #[instrument(skip_all, fields(namespace = %self.names.core, assets = self.manifest.len()))]
    pub async fn install(&self) -> Result<(), LifecycleError> {
        let started = Instant::now();
        info!(target = "podcache::lifecycle", "caching core assets");

        self.store.open(&self.names.core).await?;

        let result = try_join_all(self.manifest.iter().map(|asset| self.warm_asset(asset))).await;
        histogram!(METRIC_INSTALL_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(_) => {
                counter!(METRIC_INSTALL_TOTAL, "result" => "ok").increment(1);
                info!(target = "podcache::lifecycle", "core assets cached");
                Ok(())
            }
            Err(err) => {
                counter!(METRIC_INSTALL_TOTAL, "result" => "failed").increment(1);
                warn!(target = "podcache::lifecycle", error = %err, "failed to cache core assets");
                Err(err)
            }
        }
    }

    async fn warm_asset(&self, asset: &Url) -> Result<(), LifecycleError> {
        let request = FetchRequest::get(asset.clone());
        let response = self
            .origin
            .fetch(&request)
            .await
            .map_err(|err| LifecycleError::install_failed(asset.as_str(), err))?;

        if !response.is_success() {
            return Err(LifecycleError::install_failed(
                asset.as_str(),
                FillError::Status {
                    status: response.status,
                },
            ));
        }

        self.store
            .put(&self.names.core, RequestKey::get(asset), response)
            .await
            .map_err(|err| LifecycleError::install_failed(asset.as_str(), err))
    }

    /// True if every manifest asset is already stored in the core namespace.
    pub async fn is_warm(&self) -> bool {
        for asset in &self.manifest {
            match self.store.get(&self.names.core, &RequestKey::get(asset)).await {
                Ok(Some(_)) => {}
                Ok(None) => return false,
                Err(err) => {
                    warn!(target = "podcache::lifecycle", asset = %asset, error = %err, "core asset unreadable");
                    return false;
                }
            }
        }
        true
    }

    /// Delete every namespace that is not one of this version's.
    ///
    /// Best effort: a failed deletion is logged and retried on the next activation.
    #[instrument(skip_all, fields(core = %self.names.core, content = %self.names.content))]
    pub async fn reconcile(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        let existing = match self.store.namespaces().await {
            Ok(names) => names,
            Err(err) => {
                warn!(
                    target = "podcache::lifecycle",
                    error = %err,
                    "failed to enumerate namespaces; skipping cleanup"
                );
                return report;
            }
        };

        for name in existing {
            if self.names.is_current(&name) {
                continue;
            }
            info!(target = "podcache::lifecycle", namespace = %name, "deleting old cache");
            match self.store.delete(&name).await {
                Ok(_) => {
                    counter!(METRIC_NAMESPACE_DELETED_TOTAL).increment(1);
                    report.deleted.push(name);
                }
                Err(err) => {
                    warn!(
                        target = "podcache::lifecycle",
                        namespace = %name,
                        error = %err,
                        "namespace cleanup failed"
                    );
                    report.failed.push(name);
                }
            }
        }

        report
    }
}
