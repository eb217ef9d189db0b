use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use podcache_protocol::{CachedQuery, CachedReport, SkipWaitingReport};
use tracing::{debug, instrument, warn};

use crate::{
    application::error::HttpError,
    cache::{self, Dispatched},
};

use super::GatewayState;

const SOURCE: &str = "infra::http::control";

#[instrument(skip_all)]
pub(super) async fn post_message(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<Response, HttpError> {
    let message = cache::decode(&body)?;
    let registration = state.runtime.registration();

    match cache::dispatch(registration, message).await {
        Dispatched::Activated(activated) => {
            Ok(Json(SkipWaitingReport { activated }).into_response())
        }
        Dispatched::CachingScheduled { .. } => Ok(StatusCode::ACCEPTED.into_response()),
        Dispatched::NoActiveWorker => Err(HttpError::new(
            SOURCE,
            StatusCode::SERVICE_UNAVAILABLE,
            "No active cache version",
            "caching requested before any version was activated",
        )),
    }
}

/// One connected client per open stream. Dropping the stream disconnects it.
pub(super) async fn events(State(state): State<GatewayState>) -> Response {
    let controller = state
        .runtime
        .registration()
        .active()
        .map(|worker| worker.version().to_string());
    let mut client = state.runtime.hub().connect(controller);
    debug!(client_id = %client.id(), "notification stream opened");

    let stream = stream! {
        while let Some(notification) = client.recv().await {
            match notification.to_json() {
                Ok(data) => {
                    yield Ok::<Event, Infallible>(
                        Event::default().event(notification.event_name()).data(data),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "failed to encode notification");
                }
            }
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

pub(super) async fn status(State(state): State<GatewayState>) -> Result<Response, HttpError> {
    let report = state.runtime.status().await?;
    Ok(Json(report).into_response())
}

pub(super) async fn cached(
    State(state): State<GatewayState>,
    Query(query): Query<CachedQuery>,
) -> Result<Response, HttpError> {
    let cached = state.runtime.is_cached(&query.url).await?;
    Ok(Json(CachedReport {
        url: query.url,
        cached,
    })
    .into_response())
}
