//! HTTP route definitions.

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

pub mod health;
pub mod maps;

/// All routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(maps::router())
}

/// The WebSocket endpoint, mounted at root level.
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws::ws_handler))
}
