//! Inbound control messages.

use std::sync::Arc;

use podcache_protocol::ControlMessage;
use tracing::{info, warn};

use super::error::ControlError;
use super::registration::Registration;

/// What a dispatched message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// `SKIP_WAITING`; `true` if a waiting worker was activated.
    Activated(bool),
    /// `CACHE_AUDIO`; the fetch runs in the background.
    CachingScheduled { url: String },
    /// `CACHE_AUDIO` with no worker in control.
    NoActiveWorker,
}

/// Decode a raw message body.
pub fn decode(bytes: &[u8]) -> Result<ControlMessage, ControlError> {
    ControlMessage::from_json(bytes).map_err(|err| {
        warn!(target = "podcache::control", error = %err, "rejected control message");
        ControlError::Invalid(err.to_string())
    })
}

/// Apply `message` to `registration`.
///
/// Caching is spawned so the caller does not wait on the network; the
/// outcome reaches clients as a notification.
pub async fn dispatch(registration: &Arc<Registration>, message: ControlMessage) -> Dispatched {
    info!(target = "podcache::control", kind = message.kind(), "control message received");

    match message {
        ControlMessage::SkipWaiting => Dispatched::Activated(registration.skip_waiting().await),
        ControlMessage::CacheContent { url } => {
            let Some(worker) = registration.active() else {
                warn!(target = "podcache::control", url, "no active worker; caching request ignored");
                return Dispatched::NoActiveWorker;
            };

            let task_url = url.clone();
            tokio::spawn(async move {
                worker.cache_content(&task_url).await;
            });
            Dispatched::CachingScheduled { url }
        }
    }
}
