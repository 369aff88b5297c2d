//! Postgres implementation of the core storage trait.

use async_trait::async_trait;
use serde_json::Value;

use mapforge_core::error::CoreError;
use mapforge_core::storage::{MapRecord, MapStorage, OverlayKind};
use mapforge_core::types::MapId;

use crate::repositories::{MapRepo, OverlayRepo};
use crate::DbPool;

/// Map storage backed by the repositories in this crate.
#[derive(Clone)]
pub struct PgMapStorage {
    pool: DbPool,
}

impl PgMapStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn persistence_error(err: sqlx::Error) -> CoreError {
    CoreError::Persistence(err.to_string())
}

#[async_trait]
impl MapStorage for PgMapStorage {
    async fn load_map(&self, uuid: MapId) -> Result<Option<MapRecord>, CoreError> {
        MapRepo::find_by_uuid(&self.pool, uuid)
            .await
            .map_err(persistence_error)
    }

    async fn save_map(&self, record: &MapRecord) -> Result<(), CoreError> {
        MapRepo::save(&self.pool, record)
            .await
            .map_err(persistence_error)
    }

    async fn delete_map(&self, uuid: MapId) -> Result<(), CoreError> {
        let removed = MapRepo::delete(&self.pool, uuid)
            .await
            .map_err(persistence_error)?;
        if !removed {
            return Err(CoreError::MapNotFound(uuid));
        }
        Ok(())
    }

    async fn load_overlay(
        &self,
        kind: OverlayKind,
        map_id: MapId,
    ) -> Result<Vec<Value>, CoreError> {
        OverlayRepo::find(&self.pool, map_id, kind.as_str())
            .await
            .map_err(persistence_error)
    }

    async fn save_overlay(
        &self,
        kind: OverlayKind,
        map_id: MapId,
        entities: &[Value],
    ) -> Result<(), CoreError> {
        OverlayRepo::save(&self.pool, map_id, kind.as_str(), entities)
            .await
            .map_err(persistence_error)
    }

    async fn purge_expired(&self) -> Result<u64, CoreError> {
        let purged = MapRepo::purge_expired(&self.pool)
            .await
            .map_err(persistence_error)?;
        if purged > 0 {
            tracing::info!(purged, "expired maps removed");
        }
        Ok(purged)
    }
}
