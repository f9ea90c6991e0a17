use axum::{
    routing::{get, post},
    Router,
};

use crate::directory::login;
use crate::presence::tracker;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Sign-up and login (directory glue)
    let auth_routes = Router::new()
        .route("/api/signup", post(login::signup))
        .route("/api/login", post(login::login));

    // Read-only view of tracked positions
    let presence_routes = Router::new().route("/api/presence", get(tracker::get_presence));

    // WebSocket endpoint (identity via ?username= query param)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(presence_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
