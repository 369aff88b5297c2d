//! Repository for the `overlays` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::overlay::OverlayRow;

const COLUMNS: &str = "map_id, kind, payload, updated_at";

/// Provides persistence for per-map overlay collections.
pub struct OverlayRepo;

impl OverlayRepo {
    /// Load one overlay collection. A map with no stored overlay of this
    /// kind yields an empty list.
    pub async fn find(
        pool: &PgPool,
        map_id: Uuid,
        kind: &str,
    ) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM overlays WHERE map_id = $1 AND kind = $2");
        let row = sqlx::query_as::<_, OverlayRow>(&query)
            .bind(map_id)
            .bind(kind)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.entities()).unwrap_or_default())
    }

    /// Replace one overlay collection wholesale.
    pub async fn save(
        pool: &PgPool,
        map_id: Uuid,
        kind: &str,
        entities: &[serde_json::Value],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO overlays (map_id, kind, payload, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (map_id, kind) DO UPDATE SET
                payload = EXCLUDED.payload,
                updated_at = NOW()",
        )
        .bind(map_id)
        .bind(kind)
        .bind(serde_json::Value::Array(entities.to_vec()))
        .execute(pool)
        .await?;
        Ok(())
    }
}
