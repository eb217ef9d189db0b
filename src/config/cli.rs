use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

/// Command-line arguments for the podcache binary.
#[derive(Debug, Parser)]
#[command(name = "podcache", version, about = "Offline-capable caching gateway")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PODCACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Install the configured version and serve the gateway.
    Serve(Box<ServeArgs>),
    /// Install and activate the configured version once, then exit.
    Warm(WarmArgs),
    /// List the namespaces present in the configured store.
    Namespaces(NamespacesArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WarmArgs {
    #[command(flatten)]
    pub origin: OriginOverrides,

    #[command(flatten)]
    pub store: StoreOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct NamespacesArgs {
    #[command(flatten)]
    pub store: StoreOverrides,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StoreBackendArg {
    Memory,
    Filesystem,
}

impl StoreBackendArg {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackendArg::Memory => "memory",
            StoreBackendArg::Filesystem => "filesystem",
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the cache store backend.
    #[arg(long = "store-backend", value_name = "BACKEND", value_enum)]
    pub store_backend: Option<StoreBackendArg>,

    /// Override the filesystem store directory.
    #[arg(long = "store-directory", value_name = "PATH")]
    pub store_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct OriginOverrides {
    /// Override the origin base URL.
    #[arg(long = "origin-url", value_name = "URL")]
    pub origin_url: Option<String>,

    /// Override the origin request timeout.
    #[arg(long = "origin-timeout-seconds", value_name = "SECONDS")]
    pub origin_timeout_seconds: Option<u64>,

    /// Override the cache version to install.
    #[arg(long = "cache-version", value_name = "VERSION")]
    pub cache_version: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub origin: OriginOverrides,

    #[command(flatten)]
    pub store: StoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle immediate activation after install.
    #[arg(
        long = "cache-eager-activation",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_eager_activation: Option<bool>,

    /// Override the notification channel capacity.
    #[arg(long = "clients-channel-capacity", value_name = "COUNT")]
    pub clients_channel_capacity: Option<u64>,
}
