//! Player directory: the two collaborator contracts the real-time layer relies on.
//!
//! - [`CredentialStore`] gates HTTP login (and owns sign-up).
//! - [`PositionStore`] hands out a persisted spawn point at login.
//!
//! Neither is consulted by the WebSocket layer itself: presence only learns a
//! player's position from that player's first move.

pub mod login;
pub mod sqlite;

use serde::Serialize;

pub use sqlite::SqliteDirectory;

/// Persisted position handed to a client at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnPoint {
    pub row: i64,
    pub col: i64,
    pub room_id: String,
}

/// Error type for directory operations.
#[derive(Debug)]
pub enum DirectoryError {
    /// Sign-up for a username that is taken
    AlreadyExists,
    /// Underlying storage failed
    Storage(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "Username already taken"),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<rusqlite::Error> for DirectoryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Username/password check. Implementations may block; call from `spawn_blocking`.
pub trait CredentialStore: Send + Sync {
    /// Create a player. Fails with [`DirectoryError::AlreadyExists`] if the name is taken.
    fn register(&self, username: &str, password: &str) -> Result<(), DirectoryError>;

    /// True if the player exists and the password matches.
    fn validate(&self, username: &str, password: &str) -> Result<bool, DirectoryError>;
}

/// Persisted player positions. Implementations may block; call from `spawn_blocking`.
pub trait PositionStore: Send + Sync {
    /// The player's stored spawn point, creating one at the default location if none exists.
    fn get_or_create_position(&self, username: &str) -> Result<SpawnPoint, DirectoryError>;
}
