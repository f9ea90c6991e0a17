use serde::Serialize;
use std::collections::HashMap;

/// A cell on the (unbounded) world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub row: i64,
    pub col: i64,
}

impl Position {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Manhattan distance, saturating instead of overflowing on extreme coordinates.
    pub fn manhattan_distance(&self, other: &Position) -> u64 {
        self.row
            .abs_diff(other.row)
            .saturating_add(self.col.abs_diff(other.col))
    }

    /// True only for the four cardinal neighbours.
    pub fn is_adjacent_to(&self, other: &Position) -> bool {
        self.manhattan_distance(other) == 1
    }
}

/// Player -> last reported position.
///
/// Entries appear on a player's first move and disappear on disconnect.
#[derive(Debug, Default)]
pub struct PresenceStore {
    positions: HashMap<String, Position>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the player's position.
    pub fn upsert(&mut self, player: &str, position: Position) {
        self.positions.insert(player.to_string(), position);
    }

    pub fn get(&self, player: &str) -> Option<Position> {
        self.positions.get(player).copied()
    }

    pub fn remove(&mut self, player: &str) -> Option<Position> {
        self.positions.remove(player)
    }

    pub fn contains(&self, player: &str) -> bool {
        self.positions.contains_key(player)
    }

    /// Every tracked player except `player`.
    pub fn others<'a>(&'a self, player: &'a str) -> impl Iterator<Item = (&'a str, Position)> + 'a {
        self.positions
            .iter()
            .filter(move |(id, _)| id.as_str() != player)
            .map(|(id, pos)| (id.as_str(), *pos))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Owned copy of all entries, sorted by player for stable output.
    pub fn snapshot(&self) -> Vec<(String, Position)> {
        let mut entries: Vec<(String, Position)> = self
            .positions
            .iter()
            .map(|(id, pos)| (id.clone(), *pos))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
