//! reqwest-backed origin.

use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use tracing::debug;

use crate::cache::{CachedResponse, FetchRequest, Origin, OriginError};
use crate::config::OriginSettings;

use super::error::InfraError;

const METRIC_ORIGIN_FETCH_MS: &str = "podcache_origin_fetch_ms";

/// Headers that describe one hop, not the resource.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

pub struct HttpOrigin {
    client: Client,
}

impl HttpOrigin {
    pub fn new(settings: &OriginSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedResponse, OriginError> {
        let started = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| OriginError::new(&request.url, err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| OriginError::new(&request.url, err.to_string()))?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_ORIGIN_FETCH_MS).record(elapsed_ms);
        debug!(
            target = "podcache::origin",
            method = %request.method,
            url = %request.url,
            status,
            elapsed_ms,
            "origin responded"
        );

        Ok(CachedResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_case_insensitive() {
        assert!(is_hop_by_hop("Content-Length"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("etag"));
    }
}
