//! Versioned offline cache.
//!
//! Requests are split into two classes. Core assets are pre-warmed when a
//! version installs and served cache-first with write-back. Content (audio)
//! is served cache-first but only stored when a client explicitly asks for
//! it through a control message.
//!
//! Each version lives in its own pair of namespaces:
//!
//! ```text
//! {app}-core-{version}
//! {app}-audio-{version}
//! ```
//!
//! Activating a version deletes every other namespace, so bumping
//! `cache.version` is how stale entries are dropped.

mod clients;
mod config;
mod control;
mod error;
mod keys;
mod lifecycle;
mod lock;
mod on_demand;
mod origin;
mod registration;
mod store;
mod strategy;
mod worker;

pub use clients::{ClientHandle, ClientHub, ClientId};
pub use config::CacheConfig;
pub use control::{Dispatched, decode, dispatch};
pub use error::{ControlError, FillError, LifecycleError, UrlError};
pub use keys::{NamespaceNames, RequestKey, origin_url, resolve, resolve_client};
pub use lifecycle::{CleanupReport, Lifecycle};
pub use on_demand::{OnDemandController, OnDemandOutcome};
pub use origin::{FetchRequest, Origin, OriginError};
pub use registration::Registration;
pub use store::{CacheStore, CachedResponse, MemoryStore, StoreError};
pub use strategy::{Classifier, RequestClass, ResponseSource, Served, StrategyRouter};
pub use worker::{CacheWorker, WorkerState};
