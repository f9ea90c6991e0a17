//! The presence owner task.
//!
//! All reads and writes of the presence store and adjacency set happen on one
//! task, fed by an unbounded command channel. Sessions hold a cheap
//! [`PresenceTracker`] handle; concurrent moves from different players are
//! applied strictly one after another in arrival order.
//!
//! Each player's presence belongs to the connection that last claimed it.
//! Commands from a superseded connection that arrive after the claim are ignored.

use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

use super::proximity::ProximityEngine;
use super::store::Position;
use crate::state::AppState;
use crate::ws::broadcast::Broadcaster;
use crate::ws::ConnectionId;

/// Commands accepted by the tracker task.
#[derive(Debug)]
pub enum PresenceCommand {
    /// Start a fresh session: drop any presence left by an earlier connection.
    Claim { player: String, connection: ConnectionId },
    Move { player: String, connection: ConnectionId, position: Position },
    Remove { player: String, connection: ConnectionId },
    Snapshot { reply: oneshot::Sender<Vec<PlayerPosition>> },
}

/// One row of a presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerPosition {
    pub username: String,
    pub row: i64,
    pub col: i64,
}

/// Handle to the tracker task. Clone freely.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    tx: mpsc::UnboundedSender<PresenceCommand>,
}

impl PresenceTracker {
    /// Spawn the tracker task. Events it derives go to `broadcaster`.
    pub fn spawn(broadcaster: Broadcaster) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_tracker(rx, ProximityEngine::new(), broadcaster));
        Self { tx }
    }

    /// Hand the player's presence to `connection`, purging the position and
    /// adjacency pairs of any connection it replaces.
    pub fn claim(&self, player: &str, connection: ConnectionId) {
        self.send(PresenceCommand::Claim {
            player: player.to_string(),
            connection,
        });
    }

    pub fn record_move(&self, player: &str, connection: ConnectionId, position: Position) {
        self.send(PresenceCommand::Move {
            player: player.to_string(),
            connection,
            position,
        });
    }

    /// Remove the player's position and every adjacency pair it is part of, in one step.
    /// Ignored when another connection has claimed the player since.
    pub fn remove_player(&self, player: &str, connection: ConnectionId) {
        self.send(PresenceCommand::Remove {
            player: player.to_string(),
            connection,
        });
    }

    /// Current positions of every tracked player, sorted by name.
    /// Empty if the tracker task has stopped.
    pub async fn snapshot(&self) -> Vec<PlayerPosition> {
        let (reply, rx) = oneshot::channel();
        self.send(PresenceCommand::Snapshot { reply });
        rx.await.unwrap_or_default()
    }

    fn send(&self, command: PresenceCommand) {
        if self.tx.send(command).is_err() {
            tracing::error!("Presence tracker is not running, command dropped");
        }
    }
}

async fn run_tracker(
    mut rx: mpsc::UnboundedReceiver<PresenceCommand>,
    mut engine: ProximityEngine,
    broadcaster: Broadcaster,
) {
    tracing::info!("Presence tracker started");

    let mut owners: HashMap<String, ConnectionId> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            PresenceCommand::Claim { player, connection } => {
                if engine.remove_player(&player) {
                    tracing::debug!(player = %player, connection, "Purged presence of replaced connection");
                }
                owners.insert(player, connection);
            }
            PresenceCommand::Move {
                player,
                connection,
                position,
            } => {
                let owner = *owners.entry(player.clone()).or_insert(connection);
                if owner != connection {
                    tracing::debug!(player = %player, connection, "Dropping move from superseded connection");
                    continue;
                }
                for event in engine.apply_move(&player, position) {
                    broadcaster.publish(event);
                }
            }
            PresenceCommand::Remove { player, connection } => {
                if owners.get(&player).is_some_and(|owner| *owner != connection) {
                    continue;
                }
                owners.remove(&player);
                engine.remove_player(&player);
            }
            PresenceCommand::Snapshot { reply } => {
                let rows = engine
                    .store()
                    .snapshot()
                    .into_iter()
                    .map(|(username, pos)| PlayerPosition {
                        username,
                        row: pos.row,
                        col: pos.col,
                    })
                    .collect();
                let _ = reply.send(rows);
            }
        }
    }

    tracing::info!("Presence tracker stopped");
}

// --- REST endpoint handlers ---

/// GET /api/presence — Positions of every player that has moved since connecting.
pub async fn get_presence(State(state): State<AppState>) -> Json<Vec<PlayerPosition>> {
    Json(state.presence.snapshot().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{Envelope, MessageKind, ProximityAction};
    use crate::ws::broadcast;

    #[tokio::test]
    async fn test_moves_are_published_in_order() {
        let (broadcaster, mut queue) = broadcast::channel();
        let tracker = PresenceTracker::spawn(broadcaster);

        tracker.record_move("A", 1, Position::new(0, 0));
        tracker.record_move("B", 2, Position::new(1, 0));

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(queue.recv().await.unwrap());
        }

        assert_eq!(received[0], Envelope::movement("A", Position::new(0, 0)));
        assert_eq!(received[1].kind, Some(MessageKind::Proximity));
        assert_eq!(received[1].username, "B");
        assert_eq!(received[1].action, Some(ProximityAction::Approach));
        assert_eq!(received[2].username, "A");
        assert_eq!(received[3], Envelope::movement("B", Position::new(1, 0)));
    }

    #[tokio::test]
    async fn test_remove_clears_snapshot() {
        let (broadcaster, _queue) = broadcast::channel();
        let tracker = PresenceTracker::spawn(broadcaster);

        tracker.record_move("A", 1, Position::new(2, 3));
        tracker.record_move("B", 2, Position::new(4, 5));
        tracker.remove_player("A", 1);

        let snapshot = tracker.snapshot().await;
        assert_eq!(
            snapshot,
            vec![PlayerPosition {
                username: "B".to_string(),
                row: 4,
                col: 5,
            }]
        );
    }

    #[tokio::test]
    async fn test_claim_starts_fresh_session() {
        let (broadcaster, mut queue) = broadcast::channel();
        let tracker = PresenceTracker::spawn(broadcaster);

        tracker.claim("A", 1);
        tracker.claim("B", 2);
        tracker.record_move("A", 1, Position::new(0, 0));
        tracker.record_move("B", 2, Position::new(0, 1));
        for _ in 0..4 {
            queue.recv().await.unwrap();
        }

        // B reconnects: old position and pair are gone before it moves again.
        tracker.claim("B", 3);
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].username, "A");

        tracker.record_move("B", 3, Position::new(1, 0));
        let first = queue.recv().await.unwrap();
        assert_eq!(first.kind, Some(MessageKind::Proximity));
        assert_eq!(first.action, Some(ProximityAction::Approach));
        assert_eq!(first.username, "B");
    }

    #[tokio::test]
    async fn test_superseded_connection_is_ignored() {
        let (broadcaster, _queue) = broadcast::channel();
        let tracker = PresenceTracker::spawn(broadcaster);

        tracker.claim("A", 1);
        tracker.claim("A", 2);
        tracker.record_move("A", 1, Position::new(5, 5));
        assert!(tracker.snapshot().await.is_empty());

        tracker.record_move("A", 2, Position::new(6, 6));
        tracker.remove_player("A", 1);
        assert_eq!(tracker.snapshot().await.len(), 1);

        tracker.remove_player("A", 2);
        assert!(tracker.snapshot().await.is_empty());
    }
}
