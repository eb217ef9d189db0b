//! The network side of the cache.

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use super::keys::RequestKey;
use super::store::CachedResponse;

/// A request the cache may forward to the origin.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Full-page navigation; eligible for the offline shell fallback.
    pub navigate: bool,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            navigate: false,
        }
    }

    pub fn navigation(url: Url) -> Self {
        Self {
            navigate: true,
            ..Self::get(url)
        }
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }

    /// Only GET responses are eligible for storage.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

/// The origin could not produce any response (connection refused, DNS, timeout...).
///
/// A non-2xx answer is not an error here; callers decide what it means.
#[derive(Debug, Error)]
#[error("origin unavailable for `{url}`: {reason}")]
pub struct OriginError {
    pub url: String,
    pub reason: String,
}

impl OriginError {
    pub fn new(url: &Url, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, OriginError>;
}
