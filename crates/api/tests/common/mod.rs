//! Shared helpers for integration tests.
//!
//! Rooms are exercised against an in-memory storage implementation so the
//! tests cover the full join/mutate/broadcast/evict cycle without a
//! database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;

use mapforge_api::config::ServerConfig;
use mapforge_api::rooms::RoomRegistry;
use mapforge_api::router::build_app_router;
use mapforge_api::state::AppState;
use mapforge_core::error::CoreError;
use mapforge_core::protocol::ServerMessage;
use mapforge_core::storage::{MapRecord, MapStorage, OverlayKind};
use mapforge_core::types::MapId;

/// In-memory [`MapStorage`] for tests.
#[derive(Default)]
pub struct MemoryStorage {
    maps: Mutex<HashMap<MapId, MapRecord>>,
    overlays: Mutex<HashMap<(MapId, &'static str), Vec<Value>>>,
}

#[async_trait]
impl MapStorage for MemoryStorage {
    async fn load_map(&self, uuid: MapId) -> Result<Option<MapRecord>, CoreError> {
        let maps = self.maps.lock().unwrap();
        Ok(maps
            .get(&uuid)
            .filter(|r| r.properties.deleted_at.is_none())
            .cloned())
    }

    async fn save_map(&self, record: &MapRecord) -> Result<(), CoreError> {
        self.maps
            .lock()
            .unwrap()
            .insert(record.properties.uuid, record.clone());
        Ok(())
    }

    async fn delete_map(&self, uuid: MapId) -> Result<(), CoreError> {
        self.maps
            .lock()
            .unwrap()
            .remove(&uuid)
            .map(|_| ())
            .ok_or(CoreError::MapNotFound(uuid))
    }

    async fn load_overlay(
        &self,
        kind: OverlayKind,
        map_id: MapId,
    ) -> Result<Vec<Value>, CoreError> {
        Ok(self
            .overlays
            .lock()
            .unwrap()
            .get(&(map_id, kind.as_str()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save_overlay(
        &self,
        kind: OverlayKind,
        map_id: MapId,
        entities: &[Value],
    ) -> Result<(), CoreError> {
        self.overlays
            .lock()
            .unwrap()
            .insert((map_id, kind.as_str()), entities.to_vec());
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CoreError> {
        let now = Utc::now();
        let mut maps = self.maps.lock().unwrap();
        let mut purged = 0;
        maps.retain(|_, record| {
            let window = chrono::Duration::days(record.properties.delete_after_days as i64);
            let stale = record.properties.last_modified + window < now;
            if stale {
                purged += 1;
            }
            !stale
        });
        Ok(purged)
    }
}

/// A registry backed by a shared in-memory storage.
pub fn test_registry() -> (Arc<RoomRegistry>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::default());
    let registry = Arc::new(RoomRegistry::new(
        Arc::clone(&storage) as Arc<dyn MapStorage>
    ));
    (registry, storage)
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:4200".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        reaper_interval_secs: 3600,
    }
}

/// Build the full application router against in-memory storage, mirroring
/// the construction in `main.rs` so tests exercise the same middleware
/// stack.
pub fn build_test_app() -> axum::Router {
    let (registry, storage) = test_registry();
    let config = test_config();
    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        storage: storage as Arc<dyn MapStorage>,
        rooms: registry,
    };
    build_app_router(state, &config)
}

/// Receive the next broadcast with a timeout, panicking on silence.
pub async fn recv(rx: &mut broadcast::Receiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("broadcast channel closed")
}
