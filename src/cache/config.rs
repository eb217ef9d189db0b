//! Cache configuration.
//!
//! Names the version, the pre-warm manifest and the content classification
//! rules. Built from the validated `cache` settings, see
//! [`crate::config::CacheSettings`].

use super::keys::NamespaceNames;

const DEFAULT_APP_NAME: &str = "podcast";
const DEFAULT_VERSION: &str = "v1.02";
const DEFAULT_CONTENT_SUFFIX: &str = ".mp3";
const DEFAULT_CONTENT_SEGMENT: &str = "/audio/";
const DEFAULT_OFFLINE_SHELL: &str = "./index.html";
const DEFAULT_MANIFEST: [&str; 5] = [
    "./",
    "./index.html",
    "./assets/app.js",
    "./assets/style.css",
    "./assets/episodes.json",
];

/// Cache configuration for one version.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix of every namespace name.
    pub app_name: String,
    /// Bumped whenever the manifest or strategy logic changes.
    pub version: String,
    /// Assets that must all be fetched for install to succeed.
    pub manifest: Vec<String>,
    /// Paths ending with this are content-class.
    pub content_suffix: String,
    /// Paths containing this segment are content-class.
    pub content_segment: String,
    /// Core entry served to navigations when the origin is unreachable.
    pub offline_shell: String,
    /// Take over immediately after a successful install.
    pub eager_activation: bool,
    /// Broadcast a failure notification when on-demand caching fails.
    pub notify_failures: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            content_suffix: DEFAULT_CONTENT_SUFFIX.to_string(),
            content_segment: DEFAULT_CONTENT_SEGMENT.to_string(),
            offline_shell: DEFAULT_OFFLINE_SHELL.to_string(),
            eager_activation: true,
            notify_failures: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            app_name: settings.app_name.clone(),
            version: settings.version.clone(),
            manifest: settings.manifest.clone(),
            content_suffix: settings.content_suffix.clone(),
            content_segment: settings.content_segment.clone(),
            offline_shell: settings.offline_shell.clone(),
            eager_activation: settings.eager_activation,
            notify_failures: settings.notify_failures,
        }
    }
}

impl CacheConfig {
    pub fn namespaces(&self) -> NamespaceNames {
        NamespaceNames::for_version(&self.app_name, &self.version)
    }

    /// Same configuration under a different version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
