//! Row model for the `overlays` table.
//!
//! Overlay collections (links, shapes) are stored as one JSONB array per
//! map and kind. The server never interprets individual entities beyond
//! their `id` field, so the payload stays opaque at this layer.

use sqlx::FromRow;
use uuid::Uuid;

use mapforge_core::types::Timestamp;

/// A row from the `overlays` table.
#[derive(Debug, Clone, FromRow)]
pub struct OverlayRow {
    pub map_id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub updated_at: Timestamp,
}

impl OverlayRow {
    /// The stored entities, or an empty list when the payload is not an
    /// array (the column default, or a corrupted write).
    pub fn entities(&self) -> Vec<serde_json::Value> {
        match &self.payload {
            serde_json::Value::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }
}
