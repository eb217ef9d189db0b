use thiserror::Error;

use super::origin::OriginError;
use super::store::StoreError;

/// Why a single fetch-and-store attempt did not produce a stored entry.
#[derive(Debug, Error)]
pub enum FillError {
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error("origin answered with status {status}")]
    Status { status: u16 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: UrlError,
    },
}

/// A request or client URL that cannot be mapped onto the origin.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),
    #[error("`{url}` is outside the origin")]
    OutsideOrigin { url: String },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("install failed while warming `{asset}`: {source}")]
    InstallFailed {
        asset: String,
        #[source]
        source: FillError,
    },
    #[error("manifest entry `{asset}` is not a valid url: {source}")]
    InvalidManifest {
        asset: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub(crate) fn install_failed(asset: impl Into<String>, source: impl Into<FillError>) -> Self {
        Self::InstallFailed {
            asset: asset.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid control message: {0}")]
    Invalid(String),
}
