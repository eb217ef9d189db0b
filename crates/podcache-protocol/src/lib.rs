//! Wire types for the podcache control channel.
//!
//! Inbound messages are POSTed as JSON to [`MESSAGES_PATH`]; outbound
//! notifications are delivered as SSE `data:` payloads on [`EVENTS_PATH`].
//! Both use an internally tagged `type` field so the shapes match what
//! browser clients already post to a service worker.

use serde::{Deserialize, Serialize};

/// Path prefix reserved for the control surface. Everything else is intercepted,
/// and unknown paths below it are rejected rather than forwarded.
pub const CONTROL_PREFIX: &str = "/_podcache";
pub const MESSAGES_PATH: &str = "/_podcache/messages";
pub const EVENTS_PATH: &str = "/_podcache/events";
pub const STATUS_PATH: &str = "/_podcache/status";
pub const CACHED_PATH: &str = "/_podcache/cached";

/// A command sent by a client to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting worker now instead of waiting for clients to release the old one.
    SkipWaiting,
    /// Persist `url` into the content namespace.
    #[serde(rename = "CACHE_AUDIO")]
    CacheContent { url: String },
}

impl ControlMessage {
    /// Decode a message, rejecting unknown tags and missing fields.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::SkipWaiting => "SKIP_WAITING",
            ControlMessage::CacheContent { .. } => "CACHE_AUDIO",
        }
    }
}

/// An event broadcast to every connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// `url` is now available offline.
    #[serde(rename = "AUDIO_CACHED")]
    ContentCached { url: String },
    /// On-demand caching of `url` failed.
    #[serde(rename = "AUDIO_CACHE_FAILED")]
    ContentCacheFailed { url: String, reason: String },
    /// A new version finished installing and is waiting to take over.
    UpdateWaiting { version: String },
    /// A new version took control; clients should reload.
    ControllerChanged { version: String },
}

impl Notification {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// SSE event name used when streaming this notification.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::ContentCached { .. } => "audio-cached",
            Notification::ContentCacheFailed { .. } => "audio-cache-failed",
            Notification::UpdateWaiting { .. } => "update-waiting",
            Notification::ControllerChanged { .. } => "controller-changed",
        }
    }
}

/// Snapshot returned by [`STATUS_PATH`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub namespaces: Vec<String>,
    pub clients: usize,
}

/// Answer to a `SKIP_WAITING` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipWaitingReport {
    /// False when no worker was waiting.
    pub activated: bool,
}

/// Query and answer for [`CACHED_PATH`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedQuery {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedReport {
    pub url: String,
    pub cached: bool,
}
