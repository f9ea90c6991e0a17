//! Direct chat routing.
//!
//! Chat bypasses the broadcast queue and is written straight to the
//! recipient's connection. Nobody else sees it, and it never touches presence.

use crate::proto::Envelope;
use crate::ws::broadcast::send_to_player;
use crate::ws::ConnectionRegistry;

/// Deliver `body` from `sender` to `recipient`.
///
/// Returns whether the message was handed to the recipient's connection. An
/// offline or unknown recipient is not an error; the message is dropped.
pub fn route_chat(registry: &ConnectionRegistry, sender: &str, recipient: &str, body: &str) -> bool {
    let envelope = Envelope::chat(sender, recipient, body);
    let delivered = send_to_player(registry, recipient, &envelope);

    if delivered {
        tracing::debug!(sender = %sender, recipient = %recipient, "Chat delivered");
    } else {
        tracing::debug!(sender = %sender, recipient = %recipient, "Chat recipient offline, dropped");
    }
    delivered
}
