//! Storage collaborator interface.
//!
//! The room layer reads and writes maps exclusively through this trait, so
//! the persistence engine stays swappable (Postgres in production, an
//! in-memory store in tests). Persistence is fire-and-forget from the
//! mutator's perspective: changesets are broadcast before a save confirms.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::MapSecurity;
use crate::error::CoreError;
use crate::map::MapProperties;
use crate::types::MapId;

/// Overlay entity kinds persisted per map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Links,
    Shapes,
}

impl OverlayKind {
    /// Storage discriminator for display, logging, and database rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Shapes => "shapes",
        }
    }
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of map persistence: public properties plus the private
/// security fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub properties: MapProperties,
    pub security: MapSecurity,
}

impl MapRecord {
    /// Allocate a fresh map with generated security artifacts.
    pub fn new() -> Self {
        Self {
            properties: MapProperties::new(),
            security: MapSecurity::generate(),
        }
    }
}

impl Default for MapRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence collaborator for maps and their overlay collections.
#[async_trait]
pub trait MapStorage: Send + Sync {
    /// Load a map by uuid. `Ok(None)` when it does not exist or is
    /// soft-deleted.
    async fn load_map(&self, uuid: MapId) -> Result<Option<MapRecord>, CoreError>;

    /// Persist the full map record, inserting or replacing.
    async fn save_map(&self, record: &MapRecord) -> Result<(), CoreError>;

    /// Hard-delete a map and everything that cascades from it.
    async fn delete_map(&self, uuid: MapId) -> Result<(), CoreError>;

    /// Load the persisted overlay collection of one kind for one map.
    async fn load_overlay(&self, kind: OverlayKind, map_id: MapId)
        -> Result<Vec<Value>, CoreError>;

    /// Replace the persisted overlay collection of one kind for one map.
    async fn save_overlay(
        &self,
        kind: OverlayKind,
        map_id: MapId,
        entities: &[Value],
    ) -> Result<(), CoreError>;

    /// Remove maps idle past their `delete_after_days`. Returns how many
    /// maps were purged.
    async fn purge_expired(&self) -> Result<u64, CoreError>;
}
