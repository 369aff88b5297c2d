//! Repository for the `maps`, `nodes`, and `connections` tables.
//!
//! A map is always persisted as a unit: the map row plus the full set of
//! node and connection rows, written in one transaction. Partial writes
//! would let a crashed save leave orphaned connections behind.

use sqlx::PgPool;
use uuid::Uuid;

use mapforge_core::storage::MapRecord;

use crate::models::map::{ConnectionRow, MapRow, NodeRow};

/// Column list shared across queries to avoid repetition.
const MAP_COLUMNS: &str = "uuid, created_at, last_modified, deleted_at, \
    delete_after_days, options, admin_id, modification_secret";

const NODE_COLUMNS: &str = "id, map_id, parent_id, name, coordinates_x, \
    coordinates_y, image_src, image_size, name_color, background_color, \
    branch_color, font_style, font_size, font_weight, locked, hidden";

const CONNECTION_COLUMNS: &str = "id, map_id, from_node_id, to_node_id, color, width";

/// Provides persistence for complete map records.
pub struct MapRepo;

impl MapRepo {
    /// Load a map with all of its nodes and connections. Soft-deleted maps
    /// are treated as absent.
    pub async fn find_by_uuid(
        pool: &PgPool,
        uuid: Uuid,
    ) -> Result<Option<MapRecord>, sqlx::Error> {
        let query =
            format!("SELECT {MAP_COLUMNS} FROM maps WHERE uuid = $1 AND deleted_at IS NULL");
        let Some(map_row) = sqlx::query_as::<_, MapRow>(&query)
            .bind(uuid)
            .fetch_optional(pool)
            .await?
        else {
            return Ok(None);
        };

        let query = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE map_id = $1");
        let nodes = sqlx::query_as::<_, NodeRow>(&query)
            .bind(uuid)
            .fetch_all(pool)
            .await?;

        let query = format!("SELECT {CONNECTION_COLUMNS} FROM connections WHERE map_id = $1");
        let connections = sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(uuid)
            .fetch_all(pool)
            .await?;

        Ok(Some(map_row.into_record(nodes, connections)))
    }

    /// Write a complete map record. Upserts the map row, then replaces the
    /// node and connection sets wholesale inside one transaction.
    pub async fn save(pool: &PgPool, record: &MapRecord) -> Result<(), sqlx::Error> {
        let map_row = MapRow::from_record(record);
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO maps ({MAP_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (uuid) DO UPDATE SET
                last_modified = EXCLUDED.last_modified,
                deleted_at = EXCLUDED.deleted_at,
                delete_after_days = EXCLUDED.delete_after_days,
                options = EXCLUDED.options"
        );
        sqlx::query(&query)
            .bind(map_row.uuid)
            .bind(map_row.created_at)
            .bind(map_row.last_modified)
            .bind(map_row.deleted_at)
            .bind(map_row.delete_after_days)
            .bind(&map_row.options)
            .bind(map_row.admin_id)
            .bind(map_row.modification_secret)
            .execute(&mut *tx)
            .await?;

        // Connections reference nodes, so they go first on delete and last
        // on insert.
        sqlx::query("DELETE FROM connections WHERE map_id = $1")
            .bind(map_row.uuid)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM nodes WHERE map_id = $1")
            .bind(map_row.uuid)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO nodes ({NODE_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        );
        for node in record.properties.content.nodes.values() {
            let row = NodeRow::from_node(map_row.uuid, node);
            sqlx::query(&query)
                .bind(row.id)
                .bind(row.map_id)
                .bind(row.parent_id)
                .bind(&row.name)
                .bind(row.coordinates_x)
                .bind(row.coordinates_y)
                .bind(&row.image_src)
                .bind(row.image_size)
                .bind(&row.name_color)
                .bind(&row.background_color)
                .bind(&row.branch_color)
                .bind(&row.font_style)
                .bind(row.font_size)
                .bind(&row.font_weight)
                .bind(row.locked)
                .bind(row.hidden)
                .execute(&mut *tx)
                .await?;
        }

        let query = format!(
            "INSERT INTO connections ({CONNECTION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        for connection in record.properties.content.connections.values() {
            let row = ConnectionRow::from_connection(map_row.uuid, connection);
            sqlx::query(&query)
                .bind(row.id)
                .bind(row.map_id)
                .bind(row.from_node_id)
                .bind(row.to_node_id)
                .bind(&row.color)
                .bind(row.width)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await
    }

    /// Hard-delete a map. Nodes, connections, and overlays cascade.
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, uuid: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM maps WHERE uuid = $1")
            .bind(uuid)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Expire stale maps: soft-delete maps idle past their per-map retention
    /// window, then hard-delete maps that have been soft-deleted for the
    /// same window again. Returns the number of rows touched.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let soft = sqlx::query(
            "UPDATE maps SET deleted_at = NOW()
             WHERE deleted_at IS NULL
               AND last_modified < NOW() - make_interval(days => delete_after_days)",
        )
        .execute(pool)
        .await?;

        let hard = sqlx::query(
            "DELETE FROM maps
             WHERE deleted_at IS NOT NULL
               AND deleted_at < NOW() - make_interval(days => delete_after_days)",
        )
        .execute(pool)
        .await?;

        Ok(soft.rows_affected() + hard.rows_affected())
    }
}
