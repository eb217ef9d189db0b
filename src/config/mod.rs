//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::CacheConfig;

pub use cli::{
    CliArgs, Command, NamespacesArgs, OriginOverrides, ServeArgs, ServeOverrides,
    StoreBackendArg, StoreOverrides, WarmArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "podcache";
const ENV_PREFIX: &str = "PODCACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_ORIGIN_URL: &str = "http://127.0.0.1:8080/";
const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("podcache/", env!("CARGO_PKG_VERSION"));
const DEFAULT_STORE_DIR: &str = "podcache-store";
const DEFAULT_CHANNEL_CAPACITY: u64 = 64;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub origin: OriginSettings,
    pub cache: CacheSettings,
    pub store: StoreSettings,
    pub clients: ClientSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    /// Always ends with `/` so relative manifest entries resolve beneath it.
    pub base_url: Url,
    pub request_timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub app_name: String,
    pub version: String,
    pub manifest: Vec<String>,
    pub content_suffix: String,
    pub content_segment: String,
    pub offline_shell: String,
    pub eager_activation: bool,
    pub notify_failures: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Filesystem,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub channel_capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cache.manifest")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Warm(args)) => {
            raw.apply_origin_overrides(&args.origin);
            raw.apply_store_overrides(&args.store);
        }
        Some(Command::Namespaces(args)) => raw.apply_store_overrides(&args.store),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    origin: RawOriginSettings,
    cache: RawCacheSettings,
    store: RawStoreSettings,
    clients: RawClientSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(eager) = overrides.cache_eager_activation {
            self.cache.eager_activation = Some(eager);
        }
        if let Some(capacity) = overrides.clients_channel_capacity {
            self.clients.channel_capacity = Some(capacity);
        }

        self.apply_origin_overrides(&overrides.origin);
        self.apply_store_overrides(&overrides.store);
    }

    fn apply_origin_overrides(&mut self, overrides: &OriginOverrides) {
        if let Some(url) = overrides.origin_url.as_ref() {
            self.origin.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.origin_timeout_seconds {
            self.origin.request_timeout_seconds = Some(seconds);
        }
        if let Some(version) = overrides.cache_version.as_ref() {
            self.cache.version = Some(version.clone());
        }
    }

    fn apply_store_overrides(&mut self, overrides: &StoreOverrides) {
        if let Some(backend) = overrides.store_backend {
            self.store.backend = Some(backend.as_str().to_string());
        }
        if let Some(directory) = overrides.store_directory.as_ref() {
            self.store.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            origin,
            cache,
            store,
            clients,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            origin: build_origin_settings(origin)?,
            cache: build_cache_settings(cache)?,
            store: build_store_settings(store)?,
            clients: build_client_settings(clients)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let raw_url = origin
        .base_url
        .unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string());
    let mut base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("origin.base_url", format!("`{raw_url}`: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "origin.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }
    base_url.set_fragment(None);
    base_url.set_query(None);
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let timeout_secs = origin
        .request_timeout_seconds
        .unwrap_or(DEFAULT_ORIGIN_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "origin.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let user_agent = origin
        .user_agent
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    Ok(OriginSettings {
        base_url,
        request_timeout: Duration::from_secs(timeout_secs),
        user_agent,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let app_name = cache.app_name.unwrap_or(defaults.app_name);
    validate_namespace_part(&app_name, "cache.app_name")?;

    let version = cache.version.unwrap_or(defaults.version);
    validate_namespace_part(&version, "cache.version")?;

    let manifest = cache.manifest.unwrap_or(defaults.manifest);
    if manifest.iter().any(|asset| asset.trim().is_empty()) {
        return Err(LoadError::invalid(
            "cache.manifest",
            "entries must not be empty",
        ));
    }

    let offline_shell = cache.offline_shell.unwrap_or(defaults.offline_shell);
    if offline_shell.trim().is_empty() {
        return Err(LoadError::invalid(
            "cache.offline_shell",
            "must not be empty",
        ));
    }

    Ok(CacheSettings {
        app_name,
        version,
        manifest,
        content_suffix: cache.content_suffix.unwrap_or(defaults.content_suffix),
        content_segment: cache.content_segment.unwrap_or(defaults.content_segment),
        offline_shell,
        eager_activation: cache.eager_activation.unwrap_or(defaults.eager_activation),
        notify_failures: cache.notify_failures.unwrap_or(defaults.notify_failures),
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend.as_deref().map(str::trim) {
        None | Some("filesystem") => StoreBackend::Filesystem,
        Some("memory") => StoreBackend::Memory,
        Some(other) => {
            return Err(LoadError::invalid(
                "store.backend",
                format!("expected `memory` or `filesystem`, got `{other}`"),
            ));
        }
    };

    let directory = store
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "store.directory",
            "path must not be empty",
        ));
    }

    Ok(StoreSettings { backend, directory })
}

fn build_client_settings(clients: RawClientSettings) -> Result<ClientSettings, LoadError> {
    let capacity = clients
        .channel_capacity
        .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
    Ok(ClientSettings {
        channel_capacity: non_zero_usize(capacity, "clients.channel_capacity")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    app_name: Option<String>,
    version: Option<String>,
    manifest: Option<Vec<String>>,
    content_suffix: Option<String>,
    content_segment: Option<String>,
    offline_shell: Option<String>,
    eager_activation: Option<bool>,
    notify_failures: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawClientSettings {
    channel_capacity: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// App names and versions become directory names in the filesystem store.
fn validate_namespace_part(value: &str, key: &'static str) -> Result<(), LoadError> {
    if value.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(LoadError::invalid(
            key,
            "only ASCII letters, digits, `.`, `-` and `_` are allowed",
        ));
    }
    if value.starts_with('.') {
        return Err(LoadError::invalid(key, "must not start with `.`"));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
