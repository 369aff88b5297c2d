//! Row models for the `maps`, `nodes`, and `connections` tables, with
//! conversions to and from the domain types.
//!
//! Nodes are stored flat (one column per display property); the nested
//! `coordinates`/`colors`/`font` groups exist only in the domain and wire
//! representations.

use serde_json::json;
use sqlx::FromRow;
use uuid::Uuid;

use mapforge_core::access::MapSecurity;
use mapforge_core::map::{Connection, MapContent, MapOptions, MapProperties};
use mapforge_core::node::{Colors, Font, Image, Node, Point};
use mapforge_core::storage::MapRecord;
use mapforge_core::types::Timestamp;

// ---------------------------------------------------------------------------
// MapRow
// ---------------------------------------------------------------------------

/// A row from the `maps` table.
#[derive(Debug, Clone, FromRow)]
pub struct MapRow {
    pub uuid: Uuid,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub delete_after_days: i32,
    pub options: serde_json::Value,
    pub admin_id: Uuid,
    pub modification_secret: Uuid,
}

impl MapRow {
    /// Assemble a full map record from its rows.
    pub fn into_record(self, nodes: Vec<NodeRow>, connections: Vec<ConnectionRow>) -> MapRecord {
        let options: MapOptions =
            serde_json::from_value(self.options).unwrap_or_default();

        let mut content = MapContent::default();
        for row in nodes {
            let node = row.into_node();
            content.nodes.insert(node.id, node);
        }
        for row in connections {
            let connection = row.into_connection();
            content.connections.insert(connection.id, connection);
        }

        MapRecord {
            properties: MapProperties {
                uuid: self.uuid,
                created_at: self.created_at,
                last_modified: self.last_modified,
                deleted_at: self.deleted_at,
                delete_after_days: self.delete_after_days,
                options,
                content,
            },
            security: MapSecurity {
                admin_id: self.admin_id,
                modification_secret: self.modification_secret,
            },
        }
    }

    /// Column values for persisting a record's map row.
    pub fn from_record(record: &MapRecord) -> Self {
        Self {
            uuid: record.properties.uuid,
            created_at: record.properties.created_at,
            last_modified: record.properties.last_modified,
            deleted_at: record.properties.deleted_at,
            delete_after_days: record.properties.delete_after_days,
            options: serde_json::to_value(&record.properties.options)
                .unwrap_or_else(|_| json!({})),
            admin_id: record.security.admin_id,
            modification_secret: record.security.modification_secret,
        }
    }
}

// ---------------------------------------------------------------------------
// NodeRow
// ---------------------------------------------------------------------------

/// A row from the `nodes` table.
#[derive(Debug, Clone, FromRow)]
pub struct NodeRow {
    pub id: Uuid,
    pub map_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub coordinates_x: f64,
    pub coordinates_y: f64,
    pub image_src: Option<String>,
    pub image_size: Option<i32>,
    pub name_color: Option<String>,
    pub background_color: Option<String>,
    pub branch_color: Option<String>,
    pub font_style: Option<String>,
    pub font_size: i32,
    pub font_weight: Option<String>,
    pub locked: bool,
    pub hidden: bool,
}

impl NodeRow {
    pub fn into_node(self) -> Node {
        Node {
            id: self.id,
            parent: self.parent_id,
            name: self.name,
            coordinates: Point {
                x: self.coordinates_x,
                y: self.coordinates_y,
            },
            image: self.image_src.map(|src| Image {
                src,
                size: self.image_size.unwrap_or(0).max(0) as u32,
            }),
            colors: Colors {
                name: self.name_color,
                background: self.background_color,
                branch: self.branch_color,
            },
            font: Font {
                style: self.font_style,
                size: self.font_size.max(0) as u32,
                weight: self.font_weight,
            },
            locked: self.locked,
            hidden: self.hidden,
        }
    }

    pub fn from_node(map_id: Uuid, node: &Node) -> Self {
        Self {
            id: node.id,
            map_id,
            parent_id: node.parent,
            name: node.name.clone(),
            coordinates_x: node.coordinates.x,
            coordinates_y: node.coordinates.y,
            image_src: node.image.as_ref().map(|i| i.src.clone()),
            image_size: node.image.as_ref().map(|i| i.size as i32),
            name_color: node.colors.name.clone(),
            background_color: node.colors.background.clone(),
            branch_color: node.colors.branch.clone(),
            font_style: node.font.style.clone(),
            font_size: node.font.size as i32,
            font_weight: node.font.weight.clone(),
            locked: node.locked,
            hidden: node.hidden,
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionRow
// ---------------------------------------------------------------------------

/// A row from the `connections` table.
#[derive(Debug, Clone, FromRow)]
pub struct ConnectionRow {
    pub id: Uuid,
    pub map_id: Uuid,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub color: Option<String>,
    pub width: Option<f64>,
}

impl ConnectionRow {
    pub fn into_connection(self) -> Connection {
        Connection {
            id: self.id,
            from_node_id: self.from_node_id,
            to_node_id: self.to_node_id,
            color: self.color,
            width: self.width,
        }
    }

    pub fn from_connection(map_id: Uuid, connection: &Connection) -> Self {
        Self {
            id: connection.id,
            map_id,
            from_node_id: connection.from_node_id,
            to_node_id: connection.to_node_id,
            color: connection.color.clone(),
            width: connection.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_row_roundtrip() {
        let mut node = Node::root();
        node.image = Some(Image {
            src: "https://example.com/icon.png".into(),
            size: 48,
        });
        node.font.size = 22;
        node.locked = true;

        let map_id = Uuid::new_v4();
        let row = NodeRow::from_node(map_id, &node);
        assert_eq!(row.map_id, map_id);
        assert_eq!(row.into_node(), node);
    }

    #[test]
    fn connection_row_roundtrip() {
        let connection = Connection {
            id: Uuid::new_v4(),
            from_node_id: Uuid::new_v4(),
            to_node_id: Uuid::new_v4(),
            color: Some("#abcdef".into()),
            width: Some(1.5),
        };
        let row = ConnectionRow::from_connection(Uuid::new_v4(), &connection);
        assert_eq!(row.into_connection(), connection);
    }

    #[test]
    fn map_record_roundtrip_through_rows() {
        let record = MapRecord::new();
        let map_row = MapRow::from_record(&record);
        let node_rows: Vec<NodeRow> = record
            .properties
            .content
            .nodes
            .values()
            .map(|n| NodeRow::from_node(record.properties.uuid, n))
            .collect();

        let rebuilt = map_row.into_record(node_rows, Vec::new());
        assert_eq!(rebuilt, record);
    }
}
