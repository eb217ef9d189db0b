//! Cache key definitions.
//!
//! `NamespaceNames` names the two versioned regions of the store and
//! `RequestKey` identifies one entry inside a region.

use std::fmt;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use super::error::UrlError;

/// The current namespace names for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceNames {
    /// Application shell and static assets, pre-warmed on install.
    pub core: String,
    /// Media content, populated only on demand.
    pub content: String,
}

impl NamespaceNames {
    pub fn for_version(app: &str, version: &str) -> Self {
        Self {
            core: format!("{app}-core-{version}"),
            content: format!("{app}-audio-{version}"),
        }
    }

    /// Returns true if `name` is one of this version's namespaces.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.core || name == self.content
    }
}

/// Identity of a request inside a namespace: method plus normalized absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: &Url) -> Self {
        Self::new(&Method::GET, url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stable hex digest used for on-disk file names.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Resolve a manifest entry against the origin base.
///
/// Absolute URLs pass through, `./x`, `x` and `/x` resolve like a browser would.
pub fn resolve(base: &Url, target: &str) -> Result<Url, url::ParseError> {
    let mut url = base.join(target)?;
    url.set_fragment(None);
    Ok(url)
}

/// Resolve a URL sent by a client.
///
/// Root-relative paths map the way intercepted requests do, so an entry pinned
/// by a client is found again when the same path is requested.
pub fn resolve_client(base: &Url, target: &str) -> Result<Url, UrlError> {
    if target.starts_with('/') && !target.starts_with("//") {
        return origin_url(base, target);
    }
    Ok(resolve(base, target)?)
}

/// Map the path-and-query of an intercepted request onto the origin.
///
/// The path is appended to the base path, so an origin mounted below a prefix
/// keeps it. The result never leaves the base's scheme, host, port or prefix.
pub fn origin_url(base: &Url, path_and_query: &str) -> Result<Url, UrlError> {
    let path_and_query = path_and_query
        .split_once('#')
        .map_or(path_and_query, |(head, _)| head);
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let prefix = base.path().trim_end_matches('/');
    let mut url = base.clone();
    url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
    url.set_query(query);
    url.set_fragment(None);

    let same_origin = url.scheme() == base.scheme()
        && url.host_str() == base.host_str()
        && url.port_or_known_default() == base.port_or_known_default();
    let below_prefix = prefix.is_empty()
        || url.path() == prefix
        || url.path().starts_with(&format!("{prefix}/"));
    if !same_origin || !below_prefix {
        return Err(UrlError::OutsideOrigin {
            url: url.to_string(),
        });
    }
    Ok(url)
}
