use std::sync::Arc;
use std::time::Duration;

use crate::directory::{CredentialStore, PositionStore};
use crate::presence::PresenceTracker;
use crate::ws::broadcast;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Live WebSocket connection per player
    pub connections: ConnectionRegistry,
    /// Handle to the task owning positions and adjacency
    pub presence: PresenceTracker,
    /// Credential check used by the login endpoint
    pub credentials: Arc<dyn CredentialStore>,
    /// Persisted spawn positions used by the login endpoint
    pub positions: Arc<dyn PositionStore>,
    /// Close a session after this long without an inbound frame
    pub idle_timeout: Option<Duration>,
}

impl AppState {
    /// Build the state and start its background tasks (dispatcher and presence tracker).
    /// Must be called from within a tokio runtime.
    pub fn start(
        credentials: Arc<dyn CredentialStore>,
        positions: Arc<dyn PositionStore>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let connections = ConnectionRegistry::new();
        let (broadcaster, queue) = broadcast::channel();
        broadcast::spawn_dispatcher(queue, connections.clone());
        let presence = PresenceTracker::spawn(broadcaster);

        Self {
            connections,
            presence,
            credentials,
            positions,
            idle_timeout,
        }
    }
}
