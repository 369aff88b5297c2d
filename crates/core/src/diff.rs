//! Keyed changeset computation between two entity-collection snapshots.
//!
//! The diff engine is the single source of truth for "what changed": rooms
//! diff the authoritative tree around every mutation and undo/redo, and
//! overlay stores diff their local collections the same way. Updates carry
//! only the changed top-level fields as a partial JSON object, which bounds
//! message size for large trees.
//!
//! Determinism: snapshots are `BTreeMap`s and serde_json objects iterate
//! their keys in sorted order, so diffing the same two snapshots always
//! serializes identically.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::CoreError;

/// A keyed snapshot of an entity collection at one instant.
pub type Snapshot<T> = BTreeMap<Uuid, T>;

/// Keyed `{added, deleted, updated}` patch between two snapshots.
///
/// - `added`: full entities present only in the newer snapshot.
/// - `deleted`: ids present only in the older snapshot; the value carries
///   the last-known state (or `None` when unavailable) so the change is
///   reversible on replay.
/// - `updated`: partial objects holding only the changed top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeMap<Uuid, Value>,
    pub deleted: BTreeMap<Uuid, Option<Value>>,
    pub updated: BTreeMap<Uuid, Value>,
}

impl ChangeSet {
    /// `true` when the two snapshots were identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Compute the changeset that turns `before` into `after`.
///
/// An entity added and deleted again between the two snapshots is simply
/// absent from both and therefore appears in none of the three sets.
pub fn diff<T: Serialize>(before: &Snapshot<T>, after: &Snapshot<T>) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (id, entity) in after {
        match before.get(id) {
            None => {
                changes.added.insert(*id, to_object(entity));
            }
            Some(previous) => {
                let old = to_object(previous);
                let new = to_object(entity);
                if let Some(patch) = field_patch(&old, &new) {
                    changes.updated.insert(*id, patch);
                }
            }
        }
    }

    for (id, entity) in before {
        if !after.contains_key(id) {
            changes.deleted.insert(*id, Some(to_object(entity)));
        }
    }

    changes
}

/// Apply a changeset to `base`, producing the snapshot it was diffed
/// against.
///
/// Law: `apply_changeset(before, &diff(before, after)) == after` for any
/// two snapshots of the same entity type.
pub fn apply_changeset<T>(base: &Snapshot<T>, changes: &ChangeSet) -> Result<Snapshot<T>, CoreError>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut next = base.clone();

    for (id, value) in &changes.added {
        let entity: T = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("malformed added entity {id}: {e}")))?;
        next.insert(*id, entity);
    }

    for id in changes.deleted.keys() {
        next.remove(id);
    }

    for (id, patch) in &changes.updated {
        let current = next
            .get(id)
            .ok_or_else(|| CoreError::Validation(format!("update for unknown id {id}")))?;
        let mut merged = to_object(current);
        if let (Value::Object(target), Value::Object(fields)) = (&mut merged, patch) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        let entity: T = serde_json::from_value(merged)
            .map_err(|e| CoreError::Validation(format!("malformed patch for {id}: {e}")))?;
        next.insert(*id, entity);
    }

    Ok(next)
}

/// Serialize an entity to a JSON object.
///
/// Entities are plain structs, so serialization cannot fail in practice;
/// a non-object would be a programming error caught by tests.
fn to_object<T: Serialize>(entity: &T) -> Value {
    serde_json::to_value(entity).unwrap_or(Value::Null)
}

/// Partial object containing the top-level fields that differ, taken from
/// the newer side. `None` when the two objects are identical.
fn field_patch(old: &Value, new: &Value) -> Option<Value> {
    let (Value::Object(old_fields), Value::Object(new_fields)) = (old, new) else {
        // Non-object entities fall back to whole-value replacement.
        return (old != new).then(|| new.clone());
    };

    let mut patch = serde_json::Map::new();
    for (key, value) in new_fields {
        if old_fields.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in old_fields.keys() {
        if !new_fields.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }

    if patch.is_empty() {
        None
    } else {
        Some(Value::Object(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, Point};

    fn snapshot(nodes: &[Node]) -> Snapshot<Node> {
        nodes.iter().map(|n| (n.id, n.clone())).collect()
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let root = Node::root();
        let snap = snapshot(&[root]);
        let changes = diff(&snap, &snap);
        assert!(changes.is_empty());
    }

    #[test]
    fn added_entity_appears_with_full_state() {
        let root = Node::root();
        let child = Node::child(root.id, Point { x: 10.0, y: 5.0 });
        let before = snapshot(&[root.clone()]);
        let after = snapshot(&[root, child.clone()]);

        let changes = diff(&before, &after);
        assert_eq!(changes.added.len(), 1);
        assert!(changes.deleted.is_empty());
        assert!(changes.updated.is_empty());
        assert_eq!(changes.added[&child.id]["name"], child.name);
    }

    #[test]
    fn deleted_entity_carries_last_known_state() {
        let root = Node::root();
        let child = Node::child(root.id, Point::default());
        let before = snapshot(&[root.clone(), child.clone()]);
        let after = snapshot(&[root]);

        let changes = diff(&before, &after);
        assert_eq!(changes.deleted.len(), 1);
        let last_known = changes.deleted[&child.id].as_ref().unwrap();
        assert_eq!(last_known["id"], child.id.to_string());
    }

    #[test]
    fn updated_entity_carries_only_changed_fields() {
        let root = Node::root();
        let mut renamed = root.clone();
        renamed.name = "Center".to_string();

        let before = snapshot(&[root]);
        let after = snapshot(&[renamed.clone()]);

        let changes = diff(&before, &after);
        let patch = &changes.updated[&renamed.id];
        let fields = patch.as_object().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "Center");
    }

    #[test]
    fn nested_group_change_diffs_as_one_field() {
        let root = Node::root();
        let mut moved = root.clone();
        moved.coordinates = Point { x: 99.0, y: -3.5 };

        let changes = diff(&snapshot(&[root]), &snapshot(&[moved.clone()]));
        let fields = changes.updated[&moved.id].as_object().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["coordinates"]["x"], 99.0);
    }

    #[test]
    fn roundtrip_law_reconstructs_after() {
        let root = Node::root();
        let child_a = Node::child(root.id, Point { x: 1.0, y: 2.0 });
        let child_b = Node::child(root.id, Point { x: -4.0, y: 0.0 });
        let mut renamed_root = root.clone();
        renamed_root.name = "Topic".to_string();

        let before = snapshot(&[root, child_a]);
        let after = snapshot(&[renamed_root, child_b]);

        let changes = diff(&before, &after);
        let rebuilt = apply_changeset(&before, &changes).unwrap();
        assert_eq!(rebuilt, after);
    }

    #[test]
    fn add_then_delete_within_transaction_is_noop() {
        // A node created and removed inside one logical transaction is
        // absent from both boundary snapshots, so no set mentions it.
        let root = Node::root();
        let ephemeral = Node::child(root.id, Point::default());

        let before = snapshot(&[root.clone()]);
        let mut mid = before.clone();
        mid.insert(ephemeral.id, ephemeral.clone());
        mid.remove(&ephemeral.id);

        let changes = diff(&before, &mid);
        assert!(changes.is_empty());
        assert!(!changes.added.contains_key(&ephemeral.id));
        assert!(!changes.deleted.contains_key(&ephemeral.id));
        assert!(!changes.updated.contains_key(&ephemeral.id));
    }

    #[test]
    fn apply_rejects_update_for_unknown_id() {
        let root = Node::root();
        let mut renamed = root.clone();
        renamed.name = "x".into();
        let changes = diff(&snapshot(&[root]), &snapshot(&[renamed]));

        let empty: Snapshot<Node> = Snapshot::new();
        assert!(apply_changeset(&empty, &changes).is_err());
    }

    #[test]
    fn deterministic_serialization() {
        let root = Node::root();
        let child = Node::child(root.id, Point { x: 3.0, y: 4.0 });
        let before = snapshot(&[root.clone()]);
        let after = snapshot(&[root, child]);

        let a = serde_json::to_string(&diff(&before, &after)).unwrap();
        let b = serde_json::to_string(&diff(&before, &after)).unwrap();
        assert_eq!(a, b);
    }
}
