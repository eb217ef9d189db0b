//! Every request outside the control prefix lands here and is answered by
//! the active cache version.

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{
        HeaderMap, HeaderValue, Method, Request, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use podcache_protocol::CONTROL_PREFIX;
use tracing::debug;

use crate::{
    application::error::HttpError,
    cache::{CachedResponse, FetchRequest, Served, origin_url},
};

use super::GatewayState;

/// Response header naming where the answer came from (`cache`, `network`, ...).
pub const SOURCE_HEADER: &str = "x-podcache-source";

const SOURCE: &str = "infra::http::intercept";
const SEC_FETCH_MODE: &str = "sec-fetch-mode";

pub(super) async fn intercept(
    State(state): State<GatewayState>,
    request: Request<Body>,
) -> Result<Response, HttpError> {
    let (parts, body) = request.into_parts();

    if is_control_path(parts.uri.path()) {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Unknown control endpoint",
            format!("no control route for {}", parts.uri.path()),
        ));
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = origin_url(state.runtime.base_url(), path_and_query).map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid request path", &err)
    })?;

    let body = to_bytes(body, state.body_limit_bytes).await.map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            &err,
        )
    })?;

    let navigate = is_navigation(&parts.method, &parts.headers);
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect();

    let fetch = FetchRequest {
        method: parts.method,
        url,
        headers,
        body,
        navigate,
    };
    let served = state.runtime.registration().handle_fetch(&fetch).await;
    debug!(
        url = %fetch.url,
        class = served.class.as_str(),
        source = served.source.as_str(),
        "intercepted"
    );

    Ok(build_response(served))
}

/// Unmatched paths under the control prefix are never sent to the origin.
fn is_control_path(path: &str) -> bool {
    path.strip_prefix(CONTROL_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Full-page loads get the offline shell when the origin is unreachable.
fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    let header_contains = |name: &str, needle: &str| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.to_ascii_lowercase().contains(needle))
    };

    if header_contains(SEC_FETCH_MODE, "navigate") {
        return true;
    }
    *method == Method::GET && header_contains("accept", "text/html")
}

fn build_response(served: Served) -> Response {
    let Served {
        response, source, ..
    } = served;
    let CachedResponse {
        status,
        headers,
        body,
    } = response;

    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
            continue;
        }
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }
    builder = builder.header(SOURCE_HEADER, source.as_str());

    builder.body(Body::from(body)).unwrap_or_else(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Malformed cached response",
        )
            .into_response()
    })
}
