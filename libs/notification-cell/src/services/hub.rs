use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{ConnectionId, LifecycleEvent};

pub type ConnectionSender = mpsc::UnboundedSender<String>;
pub type ConnectionReceiver = mpsc::UnboundedReceiver<String>;

/// Best-effort delivery of lifecycle events to a user's live connections.
///
/// Implementations must not block and must not fail the caller. An event for
/// a user with no live connection is dropped.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: Uuid, event: LifecycleEvent);
}

type ConnectionMap = HashMap<Uuid, HashMap<ConnectionId, ConnectionSender>>;

/// Per-process registry of user id to live connection handles.
///
/// Registration changes are taken under a synchronous lock with no await
/// inside, so concurrent connects and disconnects cannot interleave.
#[derive(Clone, Default)]
pub struct NotificationHub {
    connections: Arc<RwLock<ConnectionMap>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel pair for a new socket; the sender is handed to [`register`](Self::register).
    pub fn open_channel() -> (ConnectionSender, ConnectionReceiver) {
        mpsc::unbounded_channel()
    }

    pub fn register(&self, user_id: Uuid, connection_id: ConnectionId, sender: ConnectionSender) {
        let mut connections = self.write();
        let handles = connections.entry(user_id).or_default();
        handles.insert(connection_id, sender);

        info!(
            "User {} registered connection {:?} ({} live)",
            user_id,
            connection_id,
            handles.len()
        );
    }

    /// Removes exactly this handle; other connections of the same user stay live.
    pub fn deregister(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let mut connections = self.write();

        let Some(handles) = connections.get_mut(&user_id) else {
            return false;
        };

        let removed = handles.remove(&connection_id).is_some();
        if handles.is_empty() {
            connections.remove(&user_id);
        }

        debug!("Deregistered connection {:?} for user {}", connection_id, user_id);
        removed
    }

    /// Sends to every live connection of `user_id`, returning how many accepted it.
    pub fn deliver(&self, user_id: Uuid, event: &LifecycleEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize {} event: {}", event.name(), e);
                return 0;
            }
        };

        let connections = self.read();
        let Some(handles) = connections.get(&user_id) else {
            debug!("No live connection for user {}, dropping {}", user_id, event.name());
            return 0;
        };

        let delivered = handles
            .iter()
            .filter(|(connection_id, sender)| match sender.send(payload.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!("Connection {:?} of user {} already closed", connection_id, user_id);
                    false
                }
            })
            .count();

        debug!("Delivered {} to {} connection(s) of user {}", event.name(), delivered, user_id);
        delivered
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.read().get(&user_id).map_or(0, HashMap::len)
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.read().keys().copied().collect()
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, ConnectionMap> {
        self.connections.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConnectionMap> {
        self.connections.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, user_id: Uuid, event: LifecycleEvent) {
        self.deliver(user_id, &event);
    }
}
