use std::{process, sync::Arc};

use podcache::{
    application::{error::AppError, runtime::CacheRuntime},
    config,
    infra::{
        error::InfraError,
        http::{self, GatewayState},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Warm(_) => run_warm(settings).await,
        config::Command::Namespaces(_) => run_namespaces(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let runtime = Arc::new(CacheRuntime::from_settings(&settings).await?);

    let installer = Arc::clone(&runtime);
    let install_handle = tokio::spawn(async move {
        if let Err(err) = installer.install_configured().await {
            warn!(
                target = "podcache::serve",
                error = %err,
                "cache version failed to install; serving without it"
            );
        }
    });

    let result = serve_http(&settings, GatewayState::new(runtime)).await;

    install_handle.abort();
    let _ = install_handle.await;
    result
}

async fn run_warm(settings: config::Settings) -> Result<(), AppError> {
    let runtime = CacheRuntime::from_settings(&settings).await?;
    info!(
        target = "podcache::warm",
        version = %settings.cache.version,
        origin = %settings.origin.base_url,
        "Starting warm"
    );
    runtime.warm().await?;

    let status = runtime.status().await?;
    info!(
        target = "podcache::warm",
        active = status.active_version.as_deref().unwrap_or(""),
        namespaces = ?status.namespaces,
        "Warm completed"
    );
    Ok(())
}

async fn run_namespaces(settings: config::Settings) -> Result<(), AppError> {
    let runtime = CacheRuntime::from_settings(&settings).await?;
    let names = runtime.store().namespaces().await?;
    let current = runtime.cache_config().namespaces();

    for name in names {
        let marker = if current.is_current(&name) { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: GatewayState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "podcache::serve",
        addr = %settings.server.addr,
        origin = %settings.origin.base_url,
        "gateway listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            info!(target = "podcache::serve", "shutdown signal received");
            trigger.notify_one();
        },
    );

    // Notification streams never finish on their own; bound the drain.
    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "podcache::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; closing open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
