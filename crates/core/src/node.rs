//! Node tree element: display and content properties of a single map node.
//!
//! Field layout mirrors the wire contract: nested `coordinates`, `colors`,
//! and `font` groups, each diffed as one top-level key by the diff engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::NodeId;

// ---------------------------------------------------------------------------
// Display defaults
// ---------------------------------------------------------------------------

/// Default node name for freshly created child nodes.
pub const DEFAULT_NODE_NAME: &str = "";

/// Default root node name.
pub const DEFAULT_ROOT_NAME: &str = "Root node";

/// Default font size in points.
pub const DEFAULT_FONT_SIZE: u32 = 16;

/// Default branch color for non-root nodes.
pub const DEFAULT_BRANCH_COLOR: &str = "#9fad9c";

/// Default name color.
pub const DEFAULT_NAME_COLOR: &str = "#787878";

// ---------------------------------------------------------------------------
// Value groups
// ---------------------------------------------------------------------------

/// A point in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Optional image attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub size: u32,
}

/// Color group of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colors {
    /// Name (label) color.
    pub name: Option<String>,
    /// Fill color behind the label.
    pub background: Option<String>,
    /// Color of the branch leading to this node.
    pub branch: Option<String>,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            name: Some(DEFAULT_NAME_COLOR.to_string()),
            background: None,
            branch: Some(DEFAULT_BRANCH_COLOR.to_string()),
        }
    }
}

/// Font group of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub style: Option<String>,
    pub size: u32,
    pub weight: Option<String>,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            style: None,
            size: DEFAULT_FONT_SIZE,
            weight: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single element of the map tree.
///
/// Invariants (enforced by [`crate::map::MapContent`], not here):
/// exactly one node per map has `parent == None` (the root); every other
/// node's parent exists in the same map. Cycles are impossible by
/// construction because nodes are only ever created as children of an
/// existing node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// `None` for the root node.
    pub parent: Option<NodeId>,
    pub name: String,
    pub coordinates: Point,
    #[serde(default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub colors: Colors,
    #[serde(default)]
    pub font: Font,
    /// Locked nodes cannot be dragged by the rendering layer.
    #[serde(default)]
    pub locked: bool,
    /// Hidden nodes are skipped by the rendering layer but stay in the tree.
    #[serde(default)]
    pub hidden: bool,
}

impl Node {
    /// Create the root node of a new map, centered at the origin.
    pub fn root() -> Self {
        Self {
            id: Uuid::new_v4(),
            parent: None,
            name: DEFAULT_ROOT_NAME.to_string(),
            coordinates: Point::default(),
            image: None,
            colors: Colors::default(),
            font: Font::default(),
            locked: false,
            hidden: false,
        }
    }

    /// Create a child of `parent` at the given coordinates.
    pub fn child(parent: NodeId, coordinates: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent: Some(parent),
            name: DEFAULT_NODE_NAME.to_string(),
            coordinates,
            image: None,
            colors: Colors::default(),
            font: Font::default(),
            locked: false,
            hidden: false,
        }
    }

    /// `true` when this node is the root of its map.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_no_parent() {
        let root = Node::root();
        assert!(root.is_root());
        assert_eq!(root.name, DEFAULT_ROOT_NAME);
    }

    #[test]
    fn child_references_parent() {
        let root = Node::root();
        let child = Node::child(root.id, Point { x: 40.0, y: -10.0 });
        assert_eq!(child.parent, Some(root.id));
        assert!(!child.is_root());
    }

    #[test]
    fn serde_roundtrip_preserves_groups() {
        let mut node = Node::root();
        node.image = Some(Image {
            src: "data:image/png;base64,xyz".into(),
            size: 64,
        });
        node.font.size = 22;

        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn missing_optional_groups_default() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"id":"{id}","parent":null,"name":"n","coordinates":{{"x":0.0,"y":0.0}}}}"#
        );
        let node: Node = serde_json::from_str(&json).unwrap();
        assert!(node.image.is_none());
        assert_eq!(node.font.size, DEFAULT_FONT_SIZE);
        assert!(!node.locked);
    }
}
