use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use rusqlite::{params, OptionalExtension};

use super::{CredentialStore, DirectoryError, PositionStore, SpawnPoint};
use crate::db::DbPool;

/// SQLite-backed implementation of both directory contracts.
#[derive(Clone)]
pub struct SqliteDirectory {
    db: DbPool,
    default_spawn: SpawnPoint,
}

impl SqliteDirectory {
    pub fn new(db: DbPool, default_spawn: SpawnPoint) -> Self {
        Self { db, default_spawn }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, DirectoryError> {
        self.db
            .lock()
            .map_err(|_| DirectoryError::Storage("DB lock poisoned".to_string()))
    }
}

/// Salted Argon2 hash of the password in PHC string form.
fn hash_password(password: &str) -> Result<String, DirectoryError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DirectoryError::Storage(format!("failed to hash password: {e}")))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, DirectoryError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| DirectoryError::Storage(format!("invalid stored hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

impl CredentialStore for SqliteDirectory {
    fn register(&self, username: &str, password: &str) -> Result<(), DirectoryError> {
        let password_hash = hash_password(password)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO players (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, chrono::Utc::now().to_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(DirectoryError::AlreadyExists);
        }
        tracing::info!(player = %username, "Player registered");
        Ok(())
    }

    fn validate(&self, username: &str, password: &str) -> Result<bool, DirectoryError> {
        let conn = self.lock()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM players WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);
        match stored {
            Some(hash) => verify_password(password, &hash),
            None => Ok(false),
        }
    }
}

impl PositionStore for SqliteDirectory {
    fn get_or_create_position(&self, username: &str) -> Result<SpawnPoint, DirectoryError> {
        let conn = self.lock()?;
        let existing = conn
            .query_row(
                "SELECT tile_row, tile_col, room_id FROM characters WHERE username = ?1",
                params![username],
                |row| {
                    Ok(SpawnPoint {
                        row: row.get(0)?,
                        col: row.get(1)?,
                        room_id: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(spawn) = existing {
            return Ok(spawn);
        }

        let spawn = self.default_spawn.clone();
        conn.execute(
            "INSERT INTO characters (username, room_id, tile_row, tile_col, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                username,
                spawn.room_id,
                spawn.row,
                spawn.col,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        tracing::debug!(player = %username, room = %spawn.room_id, "Spawn point created");
        Ok(spawn)
    }
}
