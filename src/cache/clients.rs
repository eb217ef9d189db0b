//! Connected clients and notification fan-out.
//!
//! A client is anything holding a [`ClientHandle`], in practice one open
//! notification stream. The hub remembers which worker version controls each
//! client so activation can claim them all at once.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::gauge;
use podcache_protocol::Notification;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const METRIC_CLIENTS_CONNECTED: &str = "podcache_clients_connected";

pub type ClientId = Uuid;

pub struct ClientHub {
    tx: broadcast::Sender<Notification>,
    controllers: DashMap<ClientId, Option<String>>,
}

impl ClientHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            controllers: DashMap::new(),
        }
    }

    /// Register a client controlled by `controller` (if any) and subscribe it.
    pub fn connect(self: &Arc<Self>, controller: Option<String>) -> ClientHandle {
        let id = Uuid::new_v4();
        let receiver = self.tx.subscribe();
        self.controllers.insert(id, controller);
        gauge!(METRIC_CLIENTS_CONNECTED).set(self.controllers.len() as f64);
        debug!(client_id = %id, "client connected");
        ClientHandle {
            id,
            receiver,
            hub: Arc::clone(self),
        }
    }

    fn disconnect(&self, id: ClientId) {
        self.controllers.remove(&id);
        gauge!(METRIC_CLIENTS_CONNECTED).set(self.controllers.len() as f64);
        debug!(client_id = %id, "client disconnected");
    }

    /// Deliver `notification` to every connected client. Returns the number of receivers.
    pub fn broadcast(&self, notification: Notification) -> usize {
        match self.tx.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => 0,
        }
    }

    /// Make `version` the controller of every connected client.
    pub fn claim(&self, version: &str) -> usize {
        let mut claimed = 0;
        for mut entry in self.controllers.iter_mut() {
            *entry.value_mut() = Some(version.to_string());
            claimed += 1;
        }
        info!(version, claimed, "clients claimed");
        claimed
    }

    /// Number of clients currently controlled by `version`.
    pub fn controlled_by(&self, version: &str) -> usize {
        self.controllers
            .iter()
            .filter(|entry| entry.value().as_deref() == Some(version))
            .count()
    }

    pub fn controller_of(&self, id: ClientId) -> Option<String> {
        self.controllers
            .get(&id)
            .and_then(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// A connected client. Dropping it disconnects.
pub struct ClientHandle {
    id: ClientId,
    receiver: broadcast::Receiver<Notification>,
    hub: Arc<ClientHub>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next notification. Returns `None` once the hub is gone.
    ///
    /// A client that falls behind skips the notifications it missed.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(client_id = %self.id, skipped, "client lagged behind notifications");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.try_recv() {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_client() {
        let hub = Arc::new(ClientHub::new(8));
        let mut first = hub.connect(None);
        let mut second = hub.connect(None);

        let delivered = hub.broadcast(Notification::ContentCached {
            url: "http://x/a.mp3".to_string(),
        });
        assert_eq!(delivered, 2);

        for client in [&mut first, &mut second] {
            assert!(matches!(
                client.recv().await,
                Some(Notification::ContentCached { .. })
            ));
        }
    }

    #[test]
    fn dropping_handle_disconnects() {
        let hub = Arc::new(ClientHub::new(8));
        let handle = hub.connect(Some("v1".to_string()));
        assert_eq!(hub.len(), 1);
        drop(handle);
        assert!(hub.is_empty());
        assert_eq!(
            hub.broadcast(Notification::UpdateWaiting {
                version: "v2".to_string()
            }),
            0
        );
    }

    #[test]
    fn claim_moves_all_clients() {
        let hub = Arc::new(ClientHub::new(8));
        let old = hub.connect(Some("v1".to_string()));
        let fresh = hub.connect(None);
        assert_eq!(hub.controlled_by("v1"), 1);

        assert_eq!(hub.claim("v2"), 2);
        assert_eq!(hub.controlled_by("v1"), 0);
        assert_eq!(hub.controlled_by("v2"), 2);
        assert_eq!(hub.controller_of(old.id()).as_deref(), Some("v2"));
        assert_eq!(hub.controller_of(fresh.id()).as_deref(), Some("v2"));
    }
}
