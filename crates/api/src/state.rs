use std::sync::Arc;

use mapforge_core::storage::MapStorage;

use crate::config::ServerConfig;
use crate::rooms::RoomRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, when running against Postgres. Absent in
    /// tests that use an in-memory storage implementation.
    pub pool: Option<mapforge_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Map persistence.
    pub storage: Arc<dyn MapStorage>,
    /// Live room registry.
    pub rooms: Arc<RoomRegistry>,
}
