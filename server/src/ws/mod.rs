pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use axum::extract::ws::{CloseFrame, Message};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Close code sent to a connection that was replaced by a newer one for the same player.
pub const CLOSE_SUPERSEDED: u16 = 4000;

/// Close code sent to a connection the dispatcher could no longer deliver to.
pub const CLOSE_UNDELIVERABLE: u16 = 4001;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one accepted socket.
pub type ConnectionId = u64;

/// Returned when a message cannot be handed to a connection's writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryError {
    pub connection_id: ConnectionId,
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Connection {} is no longer accepting messages", self.connection_id)
    }
}

impl std::error::Error for DeliveryError {}

/// Send capability for one live connection.
///
/// Cloning is cheap. Sending pushes onto the connection's writer channel and never
/// waits on the socket. Closing sends a close frame and wakes the owning session,
/// which then tears the socket down.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: ConnectionSender,
    shutdown: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            sender,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, msg: Message) -> Result<(), DeliveryError> {
        self.sender.send(msg).map_err(|_| DeliveryError {
            connection_id: self.id,
        })
    }

    /// Ask the owning session to close, sending a close frame first if the writer is still up.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.sender.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })));
        self.shutdown.notify_one();
    }

    /// Resolves once [`close`](Self::close) has been called, even if it was called first.
    pub async fn closed(&self) {
        self.shutdown.notified().await;
    }

    /// True once the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Connection registry: at most one live connection per player.
///
/// Backed by a DashMap, so every operation is atomic per key. `for_each` and
/// `snapshot` copy the entries out first, so callbacks may mutate the registry.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `player`, returning the handle it replaced (if any).
    /// The caller owns closing the replaced handle.
    pub fn register(&self, player: &str, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let previous = self.inner.insert(player.to_string(), handle);
        tracing::debug!(
            player = %player,
            replaced = previous.is_some(),
            connections = self.inner.len(),
            "Connection registered"
        );
        previous
    }

    /// Remove whatever is registered for `player`. No-op if absent.
    pub fn unregister(&self, player: &str) -> Option<ConnectionHandle> {
        self.inner.remove(player).map(|(_, handle)| handle)
    }

    /// Remove `player` only if it is still bound to `connection_id`.
    pub fn unregister_connection(&self, player: &str, connection_id: ConnectionId) -> bool {
        self.inner
            .remove_if(player, |_, handle| handle.id() == connection_id)
            .is_some()
    }

    /// Session teardown. Unbinds `connection_id` and reports whether it still owned
    /// `player`: true if it was registered or nobody is, false if a newer connection
    /// has taken over.
    pub fn release(&self, player: &str, connection_id: ConnectionId) -> bool {
        if self.unregister_connection(player, connection_id) {
            return true;
        }
        !self.inner.contains_key(player)
    }

    pub fn lookup(&self, player: &str) -> Option<ConnectionHandle> {
        self.inner.get(player).map(|entry| entry.value().clone())
    }

    pub fn snapshot(&self) -> Vec<(String, ConnectionHandle)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &ConnectionHandle),
    {
        for (player, handle) in self.snapshot() {
            f(&player, &handle);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
