//! HTTP gateway: the control surface under `/_podcache` plus a fallback
//! that intercepts every other request.

mod control;
mod intercept;
mod middleware;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use podcache_protocol::{CACHED_PATH, EVENTS_PATH, MESSAGES_PATH, STATUS_PATH};

use crate::application::runtime::CacheRuntime;

use self::middleware::{log_responses, set_request_context};

pub use intercept::SOURCE_HEADER;

/// Largest request body forwarded to the origin.
const DEFAULT_BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct GatewayState {
    pub runtime: Arc<CacheRuntime>,
    pub body_limit_bytes: usize,
}

impl GatewayState {
    pub fn new(runtime: Arc<CacheRuntime>) -> Self {
        Self {
            runtime,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route(MESSAGES_PATH, post(control::post_message))
        .route(EVENTS_PATH, get(control::events))
        .route(STATUS_PATH, get(control::status))
        .route(CACHED_PATH, get(control::cached))
        .fallback(intercept::intercept)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
