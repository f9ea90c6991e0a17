use crate::chat::direct::route_chat;
use crate::presence::Position;
use crate::proto::{Envelope, MessageKind};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Move(Position),
    Chat { recipient: String, body: String },
}

/// Why a client frame could not be decoded. Any of these ends the session.
#[derive(Debug)]
pub enum ProtocolError {
    /// Not a JSON envelope
    Malformed(String),
    /// A move without both `row` and `col`
    MissingCoordinates,
    /// A chat without a non-empty `recipient`
    MissingRecipient,
    /// A kind clients are not allowed to send
    UnsupportedKind(MessageKind),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "Malformed envelope: {}", e),
            Self::MissingCoordinates => write!(f, "Move requires row and col"),
            Self::MissingRecipient => write!(f, "Chat requires a recipient"),
            Self::UnsupportedKind(kind) => write!(f, "Clients may not send {:?} messages", kind),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Decode a JSON frame (text or binary payload).
///
/// `username` and `sender` on input are ignored: the connection identity is authoritative.
pub fn decode_frame(data: &[u8]) -> Result<Inbound, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_slice(data).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    match envelope.resolved_kind() {
        MessageKind::Move => match (envelope.row, envelope.col) {
            (Some(row), Some(col)) => Ok(Inbound::Move(Position::new(row, col))),
            _ => Err(ProtocolError::MissingCoordinates),
        },
        MessageKind::Chat => match envelope.recipient {
            Some(recipient) if !recipient.is_empty() => Ok(Inbound::Chat {
                recipient,
                body: envelope.message.unwrap_or_default(),
            }),
            _ => Err(ProtocolError::MissingRecipient),
        },
        kind => Err(ProtocolError::UnsupportedKind(kind)),
    }
}

/// Apply a decoded frame on behalf of `player` over `connection`.
pub fn dispatch(inbound: Inbound, state: &AppState, player: &str, connection: ConnectionId) {
    match inbound {
        Inbound::Move(position) => {
            state.presence.record_move(player, connection, position);
        }
        Inbound::Chat { recipient, body } => {
            route_chat(&state.connections, player, &recipient, &body);
        }
    }
}
