//! Adjacency transition detection.
//!
//! Each move is compared against every other tracked player. The previous
//! adjacency state is kept as a set of canonical pair keys; only changes to
//! that set produce events.

use std::collections::HashSet;

use super::store::{Position, PresenceStore};
use crate::proto::{Envelope, ProximityAction};

/// Unordered player pair. `(a, b)` and `(b, a)` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdjacencyKey {
    first: String,
    second: String,
}

impl AdjacencyKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn involves(&self, player: &str) -> bool {
        self.first == player || self.second == player
    }

    pub fn members(&self) -> (&str, &str) {
        (&self.first, &self.second)
    }
}

/// Pairs that were adjacent as of the last evaluation.
#[derive(Debug, Default)]
pub struct AdjacencySet {
    pairs: HashSet<AdjacencyKey>,
}

impl AdjacencySet {
    pub fn contains(&self, key: &AdjacencyKey) -> bool {
        self.pairs.contains(key)
    }

    pub fn insert(&mut self, key: AdjacencyKey) -> bool {
        self.pairs.insert(key)
    }

    pub fn remove(&mut self, key: &AdjacencyKey) -> bool {
        self.pairs.remove(key)
    }

    /// Drop every pair that mentions `player`. Returns how many were removed.
    pub fn remove_player(&mut self, player: &str) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|key| !key.involves(player));
        before - self.pairs.len()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Presence store plus the adjacency state derived from it.
#[derive(Debug, Default)]
pub struct ProximityEngine {
    store: PresenceStore,
    adjacent: AdjacencySet,
}

impl ProximityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a move and return the events it produces, in emission order:
    /// proximity transitions first (two per changed pair), then the move itself.
    pub fn apply_move(&mut self, player: &str, position: Position) -> Vec<Envelope> {
        self.store.upsert(player, position);

        let mut events = Vec::new();
        for (other, other_pos) in self.store.others(player) {
            let key = AdjacencyKey::new(player, other);
            let adjacent_now = position.is_adjacent_to(&other_pos);
            let adjacent_before = self.adjacent.contains(&key);

            let action = match (adjacent_before, adjacent_now) {
                (false, true) => {
                    self.adjacent.insert(key);
                    ProximityAction::Approach
                }
                (true, false) => {
                    self.adjacent.remove(&key);
                    ProximityAction::Leave
                }
                _ => continue,
            };

            tracing::debug!(
                player = %player,
                other = %other,
                action = action.as_str(),
                "Proximity transition"
            );
            events.push(Envelope::proximity(player, other, action));
            events.push(Envelope::proximity(other, player, action));
        }

        events.push(Envelope::movement(player, position));
        events
    }

    /// Forget a player: its position and every adjacency pair that mentions it.
    /// Emits nothing; remaining players simply stop seeing it.
    pub fn remove_player(&mut self, player: &str) -> bool {
        let pairs = self.adjacent.remove_player(player);
        let removed = self.store.remove(player).is_some();
        if removed || pairs > 0 {
            tracing::debug!(player = %player, pairs, "Presence removed");
        }
        removed
    }

    pub fn are_adjacent(&self, a: &str, b: &str) -> bool {
        self.adjacent.contains(&AdjacencyKey::new(a, b))
    }

    pub fn store(&self) -> &PresenceStore {
        &self.store
    }

    pub fn adjacency(&self) -> &AdjacencySet {
        &self.adjacent
    }
}
