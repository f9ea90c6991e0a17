//! JSON wire envelope shared by inbound client frames and outbound server events.
//!
//! Every frame on the socket is one [`Envelope`]. The `type` field selects the
//! meaning; the remaining fields are populated per kind:
//!
//! | type        | fields                                   |
//! |-------------|------------------------------------------|
//! | `move`      | `username`, `row`, `col`                 |
//! | `chat`      | `sender`, `recipient`, `message`         |
//! | `proximity` | `username` (subject), `target`, `action` |

use serde::{Deserialize, Serialize};

use crate::presence::Position;

/// Discriminator carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Older clients send `"position"` or an empty string for moves.
    #[serde(alias = "", alias = "position")]
    Move,
    Chat,
    Proximity,
}

/// Direction of an adjacency transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProximityAction {
    Approach,
    Leave,
}

impl ProximityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approach => "approach",
            Self::Leave => "leave",
        }
    }
}

/// A single frame on the socket, in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ProximityAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl Envelope {
    /// Raw position broadcast for `player`.
    pub fn movement(player: &str, position: Position) -> Self {
        Self {
            username: player.to_string(),
            row: Some(position.row),
            col: Some(position.col),
            kind: Some(MessageKind::Move),
            ..Default::default()
        }
    }

    /// Proximity transition as seen by `subject` with respect to `target`.
    pub fn proximity(subject: &str, target: &str, action: ProximityAction) -> Self {
        Self {
            username: subject.to_string(),
            kind: Some(MessageKind::Proximity),
            target: Some(target.to_string()),
            action: Some(action),
            ..Default::default()
        }
    }

    /// Direct chat line from `sender` to `recipient`.
    pub fn chat(sender: &str, recipient: &str, body: &str) -> Self {
        Self {
            kind: Some(MessageKind::Chat),
            sender: Some(sender.to_string()),
            recipient: Some(recipient.to_string()),
            message: Some(body.to_string()),
            ..Default::default()
        }
    }

    /// The kind this envelope resolves to; a missing `type` means a move.
    pub fn resolved_kind(&self) -> MessageKind {
        self.kind.unwrap_or(MessageKind::Move)
    }
}
