//! HTTP sign-up and login.
//!
//! Thin glue over the directory contracts. A successful login returns the
//! player's persisted spawn point; the client then opens `/ws?username=...`.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::{DirectoryError, SpawnPoint};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerInfo {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PlayerInfo,
    pub position: SpawnPoint,
}

fn require_credentials(req: &CredentialsRequest) -> Result<(), (StatusCode, String)> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username or password missing".to_string(),
        ));
    }
    Ok(())
}

fn storage_failure(e: DirectoryError) -> (StatusCode, String) {
    tracing::error!(error = %e, "Directory operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
}

/// POST /api/signup — Create a player. Body: { "username": "...", "password": "..." }
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<PlayerInfo>, (StatusCode, String)> {
    require_credentials(&req)?;

    let credentials = state.credentials.clone();
    let username = req.username.trim().to_string();
    let name = username.clone();

    tokio::task::spawn_blocking(move || credentials.register(&name, &req.password))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))?
        .map_err(|e| match e {
            DirectoryError::AlreadyExists => (StatusCode::CONFLICT, e.to_string()),
            other => storage_failure(other),
        })?;

    Ok(Json(PlayerInfo { username }))
}

/// POST /api/login — Check credentials and return the player's spawn point.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    require_credentials(&req)?;

    let credentials = state.credentials.clone();
    let positions = state.positions.clone();
    let username = req.username.trim().to_string();
    let name = username.clone();

    let spawn = tokio::task::spawn_blocking(move || {
        if !credentials.validate(&name, &req.password)? {
            return Ok(None);
        }
        positions.get_or_create_position(&name).map(Some)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))?
    .map_err(storage_failure)?;

    match spawn {
        Some(position) => {
            tracing::info!(player = %username, room = %position.room_id, "Login successful");
            Ok(Json(LoginResponse {
                user: PlayerInfo { username },
                position,
            }))
        }
        None => {
            tracing::warn!(player = %username, "Login failed");
            Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))
        }
    }
}
