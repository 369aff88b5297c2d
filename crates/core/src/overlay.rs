//! Overlay entities (cross links, free-floating shapes) and the generic
//! keyed-collection store that manages them.
//!
//! Overlays sit on top of the canonical node tree but are not part of it:
//! each kind has its own collection, its own undo/redo stack, and is
//! persisted per map through the storage collaborator. Every mutation
//! returns the [`ChangeSet`] against the previous state, so a caller can
//! either persist-only or feed a room broadcast with the same data.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::diff::{self, ChangeSet, Snapshot};
use crate::error::CoreError;
use crate::history::History;
use crate::types::{MapId, NodeId};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Default fill color for new shapes.
pub const DEFAULT_SHAPE_COLOR: &str = "#1976d2";

/// Default radius for new circles, in pixels.
pub const DEFAULT_CIRCLE_RADIUS: f64 = 40.0;

/// Styling of a cross link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkStyle {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    /// Dash pattern, e.g. `"5 5"`.
    #[serde(default)]
    pub dash: Option<String>,
    /// Stroke opacity in `0..=1`.
    #[serde(default)]
    pub opacity: Option<f64>,
}

/// A presentation-layer link between two nodes. Distinct from
/// [`crate::map::Connection`]: links live in the overlay layer and are not
/// replicated through the room diff protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: Uuid,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    #[serde(default)]
    pub style: Option<LinkStyle>,
}

/// Geometry of a drawable shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeGeometry {
    Circle { x: f64, y: f64, radius: f64 },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
}

/// A free-floating shape drawn over the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: Uuid,
    #[serde(flatten)]
    pub geometry: ShapeGeometry,
    pub color: String,
}

impl Shape {
    /// A default-sized circle at the given position.
    pub fn circle(x: f64, y: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            geometry: ShapeGeometry::Circle {
                x,
                y,
                radius: DEFAULT_CIRCLE_RADIUS,
            },
            color: DEFAULT_SHAPE_COLOR.to_string(),
        }
    }
}

/// An entity managed by an [`OverlayStore`].
pub trait OverlayEntity: Clone + PartialEq + Serialize + DeserializeOwned {
    fn id(&self) -> Uuid;
    fn assign_id(&mut self, id: Uuid);
}

impl OverlayEntity for Link {
    fn id(&self) -> Uuid {
        self.id
    }
    fn assign_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

impl OverlayEntity for Shape {
    fn id(&self) -> Uuid {
        self.id
    }
    fn assign_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Generic keyed overlay collection with optimistic local mutation and
/// snapshot-based undo/redo. Instantiated once per overlay kind.
///
/// `update` deliberately records no history: it serves continuous
/// drag/resize gestures. Call [`commit`](OverlayStore::commit) once when
/// the gesture ends to record the accumulated updates as one undoable
/// step.
#[derive(Debug, Clone)]
pub struct OverlayStore<T: OverlayEntity> {
    map_id: Option<MapId>,
    entities: Snapshot<T>,
    history: History<Snapshot<T>>,
}

impl<T: OverlayEntity> OverlayStore<T> {
    /// An unbound, empty store.
    pub fn new() -> Self {
        Self {
            map_id: None,
            entities: Snapshot::new(),
            history: History::new(Snapshot::new()),
        }
    }

    /// Bind the store to a map and seed it with the persisted collection.
    /// Resets the undo/redo history to the loaded snapshot. Duplicate ids
    /// in `loaded` collapse, later value winning.
    pub fn bind(&mut self, map_id: MapId, loaded: Vec<T>) {
        let mut entities = Snapshot::new();
        for entity in loaded {
            entities.insert(entity.id(), entity);
        }
        self.map_id = Some(map_id);
        self.entities = entities.clone();
        self.history = History::new(entities);
    }

    pub fn map_id(&self) -> Option<MapId> {
        self.map_id
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Current collection in key order.
    pub fn all(&self) -> Vec<T> {
        self.entities.values().cloned().collect()
    }

    /// Current snapshot, e.g. for persistence.
    pub fn snapshot(&self) -> &Snapshot<T> {
        &self.entities
    }

    /// Add an entity, generating an id when the caller supplied a nil one.
    /// Re-adding an existing id replaces the entity (later value wins, at
    /// most one entity per id). Records one undoable step.
    pub fn add(&mut self, mut entity: T) -> (Uuid, ChangeSet) {
        if entity.id().is_nil() {
            entity.assign_id(Uuid::new_v4());
        }
        let id = entity.id();
        let before = self.entities.clone();
        self.entities.insert(id, entity);
        let changes = diff::diff(&before, &self.entities);
        self.history.commit(self.entities.clone());
        (id, changes)
    }

    /// Replace the whole collection. Records one undoable step.
    pub fn set_all(&mut self, entities: Vec<T>) -> ChangeSet {
        let before = self.entities.clone();
        self.entities.clear();
        for entity in entities {
            self.entities.insert(entity.id(), entity);
        }
        let changes = diff::diff(&before, &self.entities);
        self.history.commit(self.entities.clone());
        changes
    }

    /// Patch an entity's fields without recording history (gesture phase).
    pub fn update(&mut self, id: Uuid, patch: Value) -> Result<ChangeSet, CoreError> {
        let before = self.entities.clone();
        let current = self
            .entities
            .get(&id)
            .ok_or_else(|| CoreError::Validation(format!("overlay entity {id} not found")))?;

        let mut merged = serde_json::to_value(current)
            .map_err(|e| CoreError::Validation(format!("unserializable entity {id}: {e}")))?;
        if let (Value::Object(target), Value::Object(fields)) = (&mut merged, &patch) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        let entity: T = serde_json::from_value(merged)
            .map_err(|e| CoreError::Validation(format!("malformed patch for {id}: {e}")))?;
        self.entities.insert(id, entity);
        Ok(diff::diff(&before, &self.entities))
    }

    /// Checkpoint the collection after a gesture: the accumulated `update`
    /// calls become a single undoable step.
    pub fn commit(&mut self) {
        self.history.commit(self.entities.clone());
    }

    /// Remove an entity. Records one undoable step.
    pub fn remove(&mut self, id: Uuid) -> Result<ChangeSet, CoreError> {
        if !self.entities.contains_key(&id) {
            return Err(CoreError::Validation(format!(
                "overlay entity {id} not found"
            )));
        }
        let before = self.entities.clone();
        self.entities.remove(&id);
        let changes = diff::diff(&before, &self.entities);
        self.history.commit(self.entities.clone());
        Ok(changes)
    }

    /// Step back one checkpoint. Returns the changeset that turns the
    /// previous state into the restored one, or `None` at the floor.
    pub fn undo(&mut self) -> Option<ChangeSet> {
        let before = self.entities.clone();
        let restored = self.history.undo()?.clone();
        self.entities = restored;
        Some(diff::diff(&before, &self.entities))
    }

    /// Step forward one checkpoint.
    pub fn redo(&mut self) -> Option<ChangeSet> {
        let before = self.entities.clone();
        let restored = self.history.redo()?.clone();
        self.entities = restored;
        Some(diff::diff(&before, &self.entities))
    }
}

impl<T: OverlayEntity> Default for OverlayStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(from: Uuid, to: Uuid) -> Link {
        Link {
            id: Uuid::new_v4(),
            from_node_id: from,
            to_node_id: to,
            style: None,
        }
    }

    #[test]
    fn add_assigns_id_when_nil() {
        let mut store = OverlayStore::<Shape>::new();
        let mut shape = Shape::circle(0.0, 0.0);
        shape.id = Uuid::nil();

        let (id, changes) = store.add(shape);
        assert!(!id.is_nil());
        assert_eq!(changes.added.len(), 1);
        assert!(store.get(id).is_some());
    }

    #[test]
    fn add_with_same_id_keeps_one_entity_later_wins() {
        let mut store = OverlayStore::<Shape>::new();
        let first = Shape::circle(0.0, 0.0);
        let mut second = Shape::circle(50.0, 50.0);
        second.id = first.id;
        second.color = "#000000".to_string();

        store.add(first.clone());
        store.add(second.clone());

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.get(first.id).unwrap().color, "#000000");
    }

    #[test]
    fn bind_dedups_and_resets_history() {
        let mut store = OverlayStore::<Link>::new();
        let a = link(Uuid::new_v4(), Uuid::new_v4());
        let mut b = a.clone();
        b.style = Some(LinkStyle {
            color: Some("#123456".into()),
            ..LinkStyle::default()
        });

        store.bind(Uuid::new_v4(), vec![a, b.clone()]);
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.get(b.id).unwrap(), &b);
        // Loaded snapshot is the history floor.
        assert!(store.undo().is_none());
    }

    #[test]
    fn update_records_no_history_until_commit() {
        let mut store = OverlayStore::<Shape>::new();
        store.bind(Uuid::new_v4(), vec![]);
        let (id, _) = store.add(Shape::circle(0.0, 0.0));

        // Simulate a drag: many updates, one commit.
        for radius in [41.0, 55.0, 80.0] {
            store.update(id, json!({ "radius": radius })).unwrap();
        }
        store.commit();

        // One undo reverts the whole gesture, a second removes the add.
        let changes = store.undo().unwrap();
        assert_eq!(changes.updated.len(), 1);
        assert!(matches!(
            store.get(id).unwrap().geometry,
            ShapeGeometry::Circle { radius, .. } if radius == DEFAULT_CIRCLE_RADIUS
        ));

        let changes = store.undo().unwrap();
        assert_eq!(changes.deleted.len(), 1);
        assert!(store.get(id).is_none());
    }

    #[test]
    fn update_patch_yields_changed_fields_only() {
        let mut store = OverlayStore::<Shape>::new();
        let (id, _) = store.add(Shape::circle(10.0, 10.0));

        let changes = store.update(id, json!({ "color": "#ff0000" })).unwrap();
        let fields = changes.updated[&id].as_object().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["color"], "#ff0000");
    }

    #[test]
    fn update_unknown_id_fails() {
        let mut store = OverlayStore::<Shape>::new();
        assert!(store.update(Uuid::new_v4(), json!({})).is_err());
    }

    #[test]
    fn remove_then_undo_restores_entity() {
        let mut store = OverlayStore::<Link>::new();
        let entity = link(Uuid::new_v4(), Uuid::new_v4());
        store.add(entity.clone());

        let changes = store.remove(entity.id).unwrap();
        assert_eq!(changes.deleted.len(), 1);

        let changes = store.undo().unwrap();
        assert_eq!(changes.added.len(), 1);
        assert_eq!(store.get(entity.id).unwrap(), &entity);
    }

    #[test]
    fn mutation_after_undo_clears_redo() {
        let mut store = OverlayStore::<Shape>::new();
        store.add(Shape::circle(0.0, 0.0));
        store.add(Shape::circle(1.0, 1.0));
        store.undo();

        store.add(Shape::circle(2.0, 2.0));
        assert!(store.redo().is_none());
    }

    #[test]
    fn shape_geometry_serializes_flattened() {
        let shape = Shape::circle(3.0, 4.0);
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value["type"], "circle");
        assert_eq!(value["x"], 3.0);
        assert_eq!(value["radius"], DEFAULT_CIRCLE_RADIUS);
    }
}
