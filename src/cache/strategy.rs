//! Request strategy router.
//!
//! Every intercepted request is classified by its URL path and answered with
//! one of two cache-first strategies:
//!
//! - **Content** (media): served from the content namespace when present,
//!   otherwise fetched and returned without being stored. Only the on-demand
//!   controller writes to the content namespace.
//! - **Core** (shell and static assets): served from the core namespace when
//!   present, otherwise fetched and, when 2xx, stored before being returned.
//!
//! Neither path ever surfaces a raw transport error; failures become a 503 or,
//! for navigations, the cached offline shell.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument, warn};
use url::Url;

use super::config::CacheConfig;
use super::keys::{NamespaceNames, RequestKey};
use super::origin::{FetchRequest, Origin};
use super::store::{CacheStore, CachedResponse};

const METRIC_FETCH_TOTAL: &str = "podcache_fetch_total";
const CONTENT_OFFLINE_BODY: &str = "Audio not available offline";
const CORE_OFFLINE_BODY: &str = "Offline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    Content,
    Core,
}

impl RequestClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestClass::Content => "content",
            RequestClass::Core => "core",
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineShell,
    Unavailable,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::OfflineShell => "offline-shell",
            ResponseSource::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub response: CachedResponse,
    pub class: RequestClass,
    pub source: ResponseSource,
}

/// Decides the request class from the URL path alone.
#[derive(Debug, Clone)]
pub struct Classifier {
    suffix: String,
    segment: String,
}

impl Classifier {
    pub fn new(suffix: impl Into<String>, segment: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            segment: segment.into(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.content_suffix, &config.content_segment)
    }

    pub fn classify(&self, url: &Url) -> RequestClass {
        let path = url.path();
        let by_suffix = !self.suffix.is_empty() && path.ends_with(&self.suffix);
        let by_segment = !self.segment.is_empty() && path.contains(&self.segment);
        if by_suffix || by_segment {
            RequestClass::Content
        } else {
            RequestClass::Core
        }
    }
}

pub struct StrategyRouter {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn Origin>,
    names: NamespaceNames,
    classifier: Classifier,
    shell: RequestKey,
}

impl StrategyRouter {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn Origin>,
        names: NamespaceNames,
        classifier: Classifier,
        shell: RequestKey,
    ) -> Self {
        Self {
            store,
            origin,
            names,
            classifier,
            shell,
        }
    }

    pub fn classify(&self, url: &Url) -> RequestClass {
        self.classifier.classify(url)
    }

    #[instrument(skip_all, fields(method = %request.method, path = %request.url.path()))]
    pub async fn handle(&self, request: &FetchRequest) -> Served {
        let class = self.classify(&request.url);
        let served = if !request.is_cacheable() {
            self.forward(request, class).await
        } else {
            match class {
                RequestClass::Content => self.content_first(request).await,
                RequestClass::Core => self.core_first(request).await,
            }
        };

        counter!(
            METRIC_FETCH_TOTAL,
            "class" => served.class.as_str(),
            "outcome" => served.source.as_str()
        )
        .increment(1);
        debug!(
            class = served.class.as_str(),
            outcome = served.source.as_str(),
            status = served.response.status,
            "request answered"
        );
        served
    }

    async fn content_first(&self, request: &FetchRequest) -> Served {
        let class = RequestClass::Content;
        if let Some(cached) = self.lookup(&self.names.content, &request.key()).await {
            return served(cached, class, ResponseSource::Cache);
        }

        match self.origin.fetch(request).await {
            Ok(response) => served(response, class, ResponseSource::Network),
            Err(err) => {
                debug!(error = %err, "content fetch failed");
                served(
                    CachedResponse::service_unavailable(CONTENT_OFFLINE_BODY),
                    class,
                    ResponseSource::Unavailable,
                )
            }
        }
    }

    async fn core_first(&self, request: &FetchRequest) -> Served {
        let class = RequestClass::Core;
        let key = request.key();
        if let Some(cached) = self.lookup(&self.names.core, &key).await {
            return served(cached, class, ResponseSource::Cache);
        }

        match self.origin.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    if let Err(err) = self
                        .store
                        .put(&self.names.core, key, response.clone())
                        .await
                    {
                        warn!(
                            namespace = %self.names.core,
                            error = %err,
                            "failed to store core response; serving uncached"
                        );
                    }
                }
                served(response, class, ResponseSource::Network)
            }
            Err(err) => {
                debug!(error = %err, navigate = request.navigate, "core fetch failed");
                self.offline_fallback(request.navigate, class).await
            }
        }
    }

    async fn forward(&self, request: &FetchRequest, class: RequestClass) -> Served {
        match self.origin.fetch(request).await {
            Ok(response) => served(response, class, ResponseSource::Network),
            Err(err) => {
                debug!(error = %err, "uncacheable request failed");
                served(
                    CachedResponse::service_unavailable(CORE_OFFLINE_BODY),
                    class,
                    ResponseSource::Unavailable,
                )
            }
        }
    }

    async fn offline_fallback(&self, navigate: bool, class: RequestClass) -> Served {
        if navigate {
            if let Some(shell) = self.lookup(&self.names.core, &self.shell).await {
                return served(shell, class, ResponseSource::OfflineShell);
            }
        }
        served(
            CachedResponse::service_unavailable(CORE_OFFLINE_BODY),
            class,
            ResponseSource::Unavailable,
        )
    }

    /// Store read failures count as misses.
    async fn lookup(&self, namespace: &str, key: &RequestKey) -> Option<CachedResponse> {
        match self.store.get(namespace, key).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!(namespace, key = %key, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }
}

fn served(response: CachedResponse, class: RequestClass, source: ResponseSource) -> Served {
    Served {
        response,
        class,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://origin.test/")
            .and_then(|base| base.join(path))
            .expect("url")
    }

    #[test]
    fn classifies_by_suffix() {
        let classifier = Classifier::new(".mp3", "/audio/");
        assert_eq!(
            classifier.classify(&url("/episodes/ep1.mp3")),
            RequestClass::Content
        );
        assert_eq!(
            classifier.classify(&url("/episodes/ep1.mp3?t=30")),
            RequestClass::Content
        );
    }

    #[test]
    fn classifies_by_segment() {
        let classifier = Classifier::new(".mp3", "/audio/");
        assert_eq!(
            classifier.classify(&url("/assets/audio/ep1.ogg")),
            RequestClass::Content
        );
    }

    #[test]
    fn everything_else_is_core() {
        let classifier = Classifier::new(".mp3", "/audio/");
        assert_eq!(classifier.classify(&url("/")), RequestClass::Core);
        assert_eq!(
            classifier.classify(&url("/assets/app.js")),
            RequestClass::Core
        );
        // Query strings are not part of the path.
        assert_eq!(
            classifier.classify(&url("/player?file=ep1.mp3")),
            RequestClass::Core
        );
        assert_eq!(classifier.classify(&url("/audiobook")), RequestClass::Core);
    }

    #[test]
    fn empty_rules_never_match() {
        let classifier = Classifier::new("", "");
        assert_eq!(classifier.classify(&url("/a.mp3")), RequestClass::Core);
    }
}
