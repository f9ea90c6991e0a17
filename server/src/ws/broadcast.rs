use axum::extract::ws::Message;
use tokio::sync::mpsc;

use super::{ConnectionRegistry, CLOSE_UNDELIVERABLE};
use crate::proto::Envelope;

/// Producer side of the broadcast queue. Clone freely.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Consumer side of the broadcast queue. Exactly one dispatcher drains it.
pub type BroadcastQueue = mpsc::UnboundedReceiver<Envelope>;

/// Create the FIFO queue that feeds the dispatcher.
pub fn channel() -> (Broadcaster, BroadcastQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Broadcaster { tx }, rx)
}

impl Broadcaster {
    /// Queue an envelope for delivery to every connected player.
    pub fn publish(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            tracing::error!("Broadcast dispatcher is not running, event dropped");
        }
    }
}

/// Encode an envelope as a JSON text frame.
pub fn encode(envelope: &Envelope) -> Option<Message> {
    match serde_json::to_string(envelope) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode envelope");
            None
        }
    }
}

/// Spawn the dispatcher task draining `queue` into `registry`.
pub fn spawn_dispatcher(queue: BroadcastQueue, registry: ConnectionRegistry) {
    tokio::spawn(run_dispatcher(queue, registry));
}

/// Drain the queue in order, delivering each envelope to every registered connection.
/// Returns when every [`Broadcaster`] has been dropped.
pub async fn run_dispatcher(mut queue: BroadcastQueue, registry: ConnectionRegistry) {
    tracing::info!("Broadcast dispatcher started");

    while let Some(envelope) = queue.recv().await {
        let delivered = broadcast_to_all(&registry, &envelope);
        tracing::debug!(
            kind = ?envelope.resolved_kind(),
            player = %envelope.username,
            delivered,
            "Event dispatched"
        );
    }

    tracing::info!("Broadcast dispatcher stopped");
}

/// Deliver one envelope to every registered connection.
///
/// A connection that can no longer accept messages is closed and removed from the
/// registry; delivery to the others continues. Returns the number of successful sends.
pub fn broadcast_to_all(registry: &ConnectionRegistry, envelope: &Envelope) -> usize {
    let Some(msg) = encode(envelope) else {
        return 0;
    };

    let mut delivered = 0;
    registry.for_each(|player, handle| match handle.send(msg.clone()) {
        Ok(()) => delivered += 1,
        Err(e) => {
            tracing::warn!(player = %player, error = %e, "Dropping dead connection");
            handle.close(CLOSE_UNDELIVERABLE, "Delivery failed");
            registry.unregister_connection(player, handle.id());
        }
    });
    delivered
}

/// Send an envelope to one player only. Returns false if the player is not
/// connected or its connection is gone.
pub fn send_to_player(registry: &ConnectionRegistry, player: &str, envelope: &Envelope) -> bool {
    let Some(handle) = registry.lookup(player) else {
        return false;
    };
    let Some(msg) = encode(envelope) else {
        return false;
    };
    handle.send(msg).is_ok()
}
