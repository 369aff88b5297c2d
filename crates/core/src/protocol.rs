//! Wire protocol for the collaborative map transport.
//!
//! Messages are serialized as JSON with an internally-tagged `"type"`
//! discriminator so clients can route by type string; field names are
//! camelCase on the wire. Every server push carries the `clientId` of the
//! triggering connection; originators use it to suppress their own echoes
//! and avoid endless update loops.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::ChangeSet;
use crate::map::{Connection, MapOptions, MapProperties};
use crate::node::Node;
use crate::types::{ClientId, MapId, NodeId};

// ---------------------------------------------------------------------------
// Client -> server requests
// ---------------------------------------------------------------------------

/// Requests a client sends over its room connection.
///
/// The first request on a fresh connection must be `map.join`; everything
/// else is rejected until a session exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// Join a room; the optional modification secret claims admin
    /// capability (carried out-of-band, e.g. in a URL fragment).
    #[serde(rename = "map.join", rename_all = "camelCase")]
    Join {
        map_id: MapId,
        #[serde(default)]
        modification_secret: Option<Uuid>,
    },

    /// Add one or more nodes (a single node or a pasted subtree).
    #[serde(rename = "nodes.add", rename_all = "camelCase")]
    AddNodes { nodes: Vec<Node> },

    /// Replace a node's properties; `property` names the field the client
    /// changed, for targeted re-rendering on other clients.
    #[serde(rename = "node.update", rename_all = "camelCase")]
    UpdateNode { node: Node, property: String },

    /// Remove a node and its subtree.
    #[serde(rename = "node.remove", rename_all = "camelCase")]
    RemoveNode { node_id: NodeId },

    #[serde(rename = "connection.add", rename_all = "camelCase")]
    AddConnection { connection: Connection },

    #[serde(rename = "connection.remove", rename_all = "camelCase")]
    RemoveConnection { connection_id: Uuid },

    /// Change map-wide options. Admin only.
    #[serde(rename = "map.options.update", rename_all = "camelCase")]
    UpdateMapOptions { options: MapOptions },

    /// Ephemeral selection highlight; relayed, never stored.
    #[serde(rename = "selection.update", rename_all = "camelCase")]
    UpdateSelection { node_id: NodeId, selected: bool },

    #[serde(rename = "map.undo")]
    Undo,

    #[serde(rename = "map.redo")]
    Redo,

    /// Explicit leave; disconnecting has the same effect.
    #[serde(rename = "map.leave")]
    Leave,
}

// ---------------------------------------------------------------------------
// Server -> client messages
// ---------------------------------------------------------------------------

/// Severity of a [`ServerMessage::ClientNotification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Success,
}

/// Messages the server pushes to room subscribers.
///
/// Subscribers receive these in the exact order the room applied the
/// corresponding mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full authoritative map; sent to a client right after it joins.
    #[serde(rename = "map.updated", rename_all = "camelCase")]
    MapUpdated {
        client_id: ClientId,
        map: MapProperties,
    },

    #[serde(rename = "nodes.added", rename_all = "camelCase")]
    NodesAdded {
        client_id: ClientId,
        nodes: Vec<Node>,
    },

    #[serde(rename = "node.updated", rename_all = "camelCase")]
    NodeUpdated {
        client_id: ClientId,
        node: Node,
        property: String,
    },

    #[serde(rename = "node.removed", rename_all = "camelCase")]
    NodeRemoved {
        client_id: ClientId,
        node_id: NodeId,
    },

    #[serde(rename = "connection.added", rename_all = "camelCase")]
    ConnectionAdded {
        client_id: ClientId,
        connection: Connection,
    },

    #[serde(rename = "connection.removed", rename_all = "camelCase")]
    ConnectionRemoved {
        client_id: ClientId,
        connection_id: Uuid,
    },

    #[serde(rename = "map.options.updated", rename_all = "camelCase")]
    MapOptionsUpdated {
        client_id: ClientId,
        options: MapOptions,
    },

    /// Node diff produced by an undo or redo; reconciled by every client
    /// exactly like a normal mutation.
    #[serde(rename = "map.undo_redo", rename_all = "camelCase")]
    UndoRedoChanges {
        client_id: ClientId,
        diff: ChangeSet,
    },

    #[serde(rename = "selection.updated", rename_all = "camelCase")]
    SelectionUpdated {
        client_id: ClientId,
        node_id: NodeId,
        selected: bool,
    },

    /// User-visible failure or status report, addressed to one client.
    #[serde(rename = "client.notification", rename_all = "camelCase")]
    ClientNotification {
        client_id: ClientId,
        message: String,
        severity: Severity,
    },
}

impl ServerMessage {
    /// The id of the connection that triggered this message.
    pub fn client_id(&self) -> &str {
        match self {
            Self::MapUpdated { client_id, .. }
            | Self::NodesAdded { client_id, .. }
            | Self::NodeUpdated { client_id, .. }
            | Self::NodeRemoved { client_id, .. }
            | Self::ConnectionAdded { client_id, .. }
            | Self::ConnectionRemoved { client_id, .. }
            | Self::MapOptionsUpdated { client_id, .. }
            | Self::UndoRedoChanges { client_id, .. }
            | Self::SelectionUpdated { client_id, .. }
            | Self::ClientNotification { client_id, .. } => client_id,
        }
    }
}

/// Transport connection lifecycle as observed by one client. Synthesized
/// locally by the transport layer, never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Point;

    #[test]
    fn join_request_roundtrip() {
        let request = ClientRequest::Join {
            map_id: Uuid::new_v4(),
            modification_secret: Some(Uuid::new_v4()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"map.join"#));

        let back: ClientRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);
    }

    #[test]
    fn join_secret_is_optional() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"type":"map.join","mapId":"{id}"}}"#);
        let request: ClientRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(
            request,
            ClientRequest::Join {
                map_id: id,
                modification_secret: None
            }
        );
    }

    #[test]
    fn nodes_added_roundtrip() {
        let root = Node::root();
        let msg = ServerMessage::NodesAdded {
            client_id: "c1".into(),
            nodes: vec![Node::child(root.id, Point { x: 1.0, y: 2.0 })],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"nodes.added"#));

        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn notification_severity_serializes_lowercase() {
        let msg = ServerMessage::ClientNotification {
            client_id: "c1".into(),
            message: "Map not found".into(),
            severity: Severity::Error,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""severity":"error"#));
    }

    #[test]
    fn wire_fields_serialize_camel_case() {
        let msg = ServerMessage::NodeRemoved {
            client_id: "c1".into(),
            node_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""clientId":"c1""#));
        assert!(json.contains(r#""nodeId""#));
        assert!(!json.contains("client_id"));
    }

    #[test]
    fn client_id_accessor_covers_all_variants() {
        let msg = ServerMessage::NodeRemoved {
            client_id: "origin".into(),
            node_id: Uuid::new_v4(),
        };
        assert_eq!(msg.client_id(), "origin");
    }

    #[test]
    fn undo_redo_diff_roundtrip() {
        let msg = ServerMessage::UndoRedoChanges {
            client_id: "c2".into(),
            diff: ChangeSet::default(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
