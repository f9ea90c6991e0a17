use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::actor;

/// Query parameters for WebSocket connection.
/// The identity is taken as claimed; login happens upstream over HTTP.
#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    pub username: Option<String>,
}

/// GET /ws?username=NAME
/// WebSocket upgrade endpoint. A missing or blank username is rejected with
/// 400 before the upgrade; otherwise the connection is handed to a session actor.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let player = match params.username.map(|u| u.trim().to_string()) {
        Some(name) if !name.is_empty() => name,
        _ => {
            tracing::warn!("WebSocket request rejected: username missing");
            return (StatusCode::BAD_REQUEST, "username required").into_response();
        }
    };

    tracing::info!(player = %player, "Incoming WebSocket connection");
    ws.on_upgrade(move |socket| actor::run_connection(socket, state, player))
}
