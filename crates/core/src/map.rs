//! Authoritative map state: the node tree, its cross connections, and the
//! map-wide lifecycle and option fields.
//!
//! All mutations are atomic per intent: every operation validates fully
//! before touching state, so a failed intent leaves the map untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::Snapshot;
use crate::error::CoreError;
use crate::node::Node;
use crate::types::{MapId, NodeId, Timestamp};

// ---------------------------------------------------------------------------
// Lifecycle constants
// ---------------------------------------------------------------------------

/// Default number of idle days before a map is soft-deleted by the reaper.
pub const DEFAULT_DELETE_AFTER_DAYS: i32 = 30;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A simple line between two nodes of the same map, independent of the
/// tree's parent/child edges. Cascade-deleted when either endpoint goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: Uuid,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
}

// ---------------------------------------------------------------------------
// Map options
// ---------------------------------------------------------------------------

/// Map-wide presentation and permission options. Changing these requires
/// admin capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub font_min_size: u32,
    pub font_max_size: u32,
    pub font_increment: u32,
    /// When `false`, guests may not mutate nodes or connections.
    pub guest_write: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            font_min_size: 15,
            font_max_size: 70,
            font_increment: 5,
            guest_write: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Map content (the history snapshot unit)
// ---------------------------------------------------------------------------

/// Everything the undo/redo history snapshots: nodes plus connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapContent {
    #[serde(rename = "data")]
    pub nodes: Snapshot<Node>,
    pub connections: Snapshot<Connection>,
}

/// Result of a cascading node removal.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedSubtree {
    /// The removed node and all its descendants.
    pub node_ids: Vec<NodeId>,
    /// Connections dropped because an endpoint was removed.
    pub connection_ids: Vec<Uuid>,
}

impl MapContent {
    /// Content of a fresh map: a single root node, no connections.
    pub fn with_root(root: Node) -> Self {
        let mut nodes = Snapshot::new();
        nodes.insert(root.id, root);
        Self {
            nodes,
            connections: Snapshot::new(),
        }
    }

    /// Id of the root node.
    pub fn root_id(&self) -> Option<NodeId> {
        self.nodes.values().find(|n| n.is_root()).map(|n| n.id)
    }

    /// Insert a batch of nodes; all-or-nothing.
    ///
    /// Every node must be new, non-root, and reference a parent that exists
    /// either in the map or earlier in the same batch (so a subtree can be
    /// pasted in one intent).
    pub fn add_nodes(&mut self, nodes: &[Node]) -> Result<(), CoreError> {
        let mut incoming: Vec<Uuid> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Some(parent) = node.parent else {
                return Err(CoreError::Validation(
                    "a map has exactly one root node".to_string(),
                ));
            };
            if self.nodes.contains_key(&node.id) || incoming.contains(&node.id) {
                return Err(CoreError::Validation(format!(
                    "node {} already exists",
                    node.id
                )));
            }
            if !self.nodes.contains_key(&parent) && !incoming.contains(&parent) {
                return Err(CoreError::NodeNotFound(parent));
            }
            incoming.push(node.id);
        }
        for node in nodes {
            self.nodes.insert(node.id, node.clone());
        }
        Ok(())
    }

    /// Replace an existing node's properties. The root keeps its root
    /// status; no node may be reparented onto a missing node.
    pub fn update_node(&mut self, node: &Node) -> Result<(), CoreError> {
        let current = self
            .nodes
            .get(&node.id)
            .ok_or(CoreError::NodeNotFound(node.id))?;
        if current.is_root() != node.is_root() {
            return Err(CoreError::Validation(
                "the root node cannot be reparented".to_string(),
            ));
        }
        if let Some(parent) = node.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(CoreError::NodeNotFound(parent));
            }
        }
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    /// Remove a node, its entire subtree, and every connection touching a
    /// removed node. The root cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Result<RemovedSubtree, CoreError> {
        let node = self.nodes.get(&id).ok_or(CoreError::NodeNotFound(id))?;
        if node.is_root() {
            return Err(CoreError::Validation(
                "the root node cannot be removed".to_string(),
            ));
        }

        let node_ids = self.subtree_of(id);
        for node_id in &node_ids {
            self.nodes.remove(node_id);
        }

        let connection_ids: Vec<Uuid> = self
            .connections
            .values()
            .filter(|c| node_ids.contains(&c.from_node_id) || node_ids.contains(&c.to_node_id))
            .map(|c| c.id)
            .collect();
        for connection_id in &connection_ids {
            self.connections.remove(connection_id);
        }

        Ok(RemovedSubtree {
            node_ids,
            connection_ids,
        })
    }

    /// Add a cross connection. Both endpoints must exist; re-adding an id
    /// replaces the previous value (last writer wins).
    pub fn add_connection(&mut self, connection: &Connection) -> Result<(), CoreError> {
        if !self.nodes.contains_key(&connection.from_node_id) {
            return Err(CoreError::NodeNotFound(connection.from_node_id));
        }
        if !self.nodes.contains_key(&connection.to_node_id) {
            return Err(CoreError::NodeNotFound(connection.to_node_id));
        }
        self.connections.insert(connection.id, connection.clone());
        Ok(())
    }

    /// Remove a cross connection by id.
    pub fn remove_connection(&mut self, id: Uuid) -> Result<Connection, CoreError> {
        self.connections
            .remove(&id)
            .ok_or_else(|| CoreError::Validation(format!("connection {id} not found")))
    }

    /// Ids of `id` and all its descendants, in breadth-first order.
    fn subtree_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut collected = vec![id];
        let mut cursor = 0;
        while cursor < collected.len() {
            let current = collected[cursor];
            cursor += 1;
            for node in self.nodes.values() {
                if node.parent == Some(current) && !collected.contains(&node.id) {
                    collected.push(node.id);
                }
            }
        }
        collected
    }
}

// ---------------------------------------------------------------------------
// Map properties
// ---------------------------------------------------------------------------

/// The public map record: lifecycle fields, options, and content. Never
/// carries the admin id or modification secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapProperties {
    pub uuid: MapId,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
    pub delete_after_days: i32,
    pub options: MapOptions,
    #[serde(flatten)]
    pub content: MapContent,
}

impl MapProperties {
    /// Allocate a fresh map with a generated uuid and a single root node.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            created_at: now,
            last_modified: now,
            deleted_at: None,
            delete_after_days: DEFAULT_DELETE_AFTER_DAYS,
            options: MapOptions::default(),
            content: MapContent::with_root(Node::root()),
        }
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

impl Default for MapProperties {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Point;

    fn child_of(content: &MapContent) -> Node {
        Node::child(content.root_id().unwrap(), Point { x: 10.0, y: 0.0 })
    }

    #[test]
    fn new_map_has_exactly_one_root() {
        let map = MapProperties::new();
        let roots: Vec<_> = map.content.nodes.values().filter(|n| n.is_root()).collect();
        assert_eq!(roots.len(), 1);
        assert!(map.content.connections.is_empty());
    }

    #[test]
    fn add_nodes_rejects_unknown_parent_without_mutating() {
        let mut content = MapContent::with_root(Node::root());
        let orphan = Node::child(Uuid::new_v4(), Point::default());
        let sibling = child_of(&content);

        // Batch is all-or-nothing: the valid sibling must not land either.
        let result = content.add_nodes(&[sibling, orphan]);
        assert!(matches!(result, Err(CoreError::NodeNotFound(_))));
        assert_eq!(content.nodes.len(), 1);
    }

    #[test]
    fn add_nodes_accepts_parent_within_batch() {
        let mut content = MapContent::with_root(Node::root());
        let child = child_of(&content);
        let grandchild = Node::child(child.id, Point { x: 20.0, y: 0.0 });

        content.add_nodes(&[child, grandchild]).unwrap();
        assert_eq!(content.nodes.len(), 3);
    }

    #[test]
    fn add_nodes_rejects_second_root() {
        let mut content = MapContent::with_root(Node::root());
        let result = content.add_nodes(&[Node::root()]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn update_unknown_node_fails() {
        let mut content = MapContent::with_root(Node::root());
        // Built but never inserted: a stale intent after a remote delete.
        let stray = child_of(&content);
        assert!(matches!(
            content.update_node(&stray),
            Err(CoreError::NodeNotFound(_))
        ));
    }

    #[test]
    fn root_cannot_be_reparented() {
        let mut content = MapContent::with_root(Node::root());
        let child = child_of(&content);
        content.add_nodes(&[child.clone()]).unwrap();

        let mut hijacked = content.nodes[&content.root_id().unwrap()].clone();
        hijacked.parent = Some(child.id);
        assert!(matches!(
            content.update_node(&hijacked),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn remove_node_cascades_subtree_and_connections() {
        let mut content = MapContent::with_root(Node::root());
        let child = child_of(&content);
        let grandchild = Node::child(child.id, Point { x: 5.0, y: 5.0 });
        let other = child_of(&content);
        content
            .add_nodes(&[child.clone(), grandchild.clone(), other.clone()])
            .unwrap();

        // One connection inside the doomed subtree, one crossing out of it,
        // one untouched.
        let inside = Connection {
            id: Uuid::new_v4(),
            from_node_id: child.id,
            to_node_id: grandchild.id,
            color: None,
            width: None,
        };
        let crossing = Connection {
            id: Uuid::new_v4(),
            from_node_id: other.id,
            to_node_id: grandchild.id,
            color: Some("#ff0000".into()),
            width: Some(2.0),
        };
        let untouched = Connection {
            id: Uuid::new_v4(),
            from_node_id: content.root_id().unwrap(),
            to_node_id: other.id,
            color: None,
            width: None,
        };
        content.add_connection(&inside).unwrap();
        content.add_connection(&crossing).unwrap();
        content.add_connection(&untouched).unwrap();

        let removed = content.remove_node(child.id).unwrap();
        assert_eq!(removed.node_ids.len(), 2);
        assert!(removed.connection_ids.contains(&inside.id));
        assert!(removed.connection_ids.contains(&crossing.id));
        assert!(!removed.connection_ids.contains(&untouched.id));
        assert!(!content.nodes.contains_key(&grandchild.id));
        assert_eq!(content.connections.len(), 1);
    }

    #[test]
    fn root_removal_is_rejected() {
        let mut content = MapContent::with_root(Node::root());
        let root_id = content.root_id().unwrap();
        assert!(matches!(
            content.remove_node(root_id),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(content.nodes.len(), 1);
    }

    #[test]
    fn connection_requires_both_endpoints() {
        let mut content = MapContent::with_root(Node::root());
        let connection = Connection {
            id: Uuid::new_v4(),
            from_node_id: content.root_id().unwrap(),
            to_node_id: Uuid::new_v4(),
            color: None,
            width: None,
        };
        assert!(matches!(
            content.add_connection(&connection),
            Err(CoreError::NodeNotFound(_))
        ));
    }

    #[test]
    fn map_serializes_nodes_under_data_key() {
        let map = MapProperties::new();
        let value = serde_json::to_value(&map).unwrap();
        assert!(value.get("data").is_some());
        assert!(value.get("connections").is_some());
        assert!(value.get("modificationSecret").is_none());
    }

    #[test]
    fn lifecycle_fields_serialize_camel_case() {
        let map = MapProperties::new();
        let value = serde_json::to_value(&map).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("lastModified").is_some());
        assert!(value.get("deleteAfterDays").is_some());
        assert!(value.get("last_modified").is_none());
        assert!(value["options"].get("guestWrite").is_some());
    }
}
