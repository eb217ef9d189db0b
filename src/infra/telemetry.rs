use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "podcache_fetch_total",
            Unit::Count,
            "Intercepted requests by class and response source."
        );
        describe_histogram!(
            "podcache_origin_fetch_ms",
            Unit::Milliseconds,
            "Origin round-trip latency in milliseconds."
        );
        describe_counter!(
            "podcache_install_total",
            Unit::Count,
            "Install attempts by result."
        );
        describe_histogram!(
            "podcache_install_ms",
            Unit::Milliseconds,
            "Core asset pre-warm latency in milliseconds."
        );
        describe_counter!(
            "podcache_namespace_deleted_total",
            Unit::Count,
            "Stale namespaces deleted during activation."
        );
        describe_counter!(
            "podcache_on_demand_total",
            Unit::Count,
            "On-demand caching requests by result."
        );
        describe_gauge!(
            "podcache_clients_connected",
            Unit::Count,
            "Clients currently holding a notification stream."
        );
    });
}
