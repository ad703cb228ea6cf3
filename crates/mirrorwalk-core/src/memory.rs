//! Arena-backed object graph.
//!
//! Cyclic and self-referential graphs are modeled as arena slots addressed
//! by [`ObjectId`]; back-references are plain ids, so building a cycle is
//! just inserting an id that already exists.

use crate::error::{SourceError, SourceResult};
use crate::node::{Key, MirrorNode, Scalar};
use crate::source::{ObjectId, ObjectSource, ValueClass};

#[derive(Debug, Clone)]
enum Slot {
    Scalar(Scalar),
    Opaque {
        display: String,
    },
    Sequence {
        label: Option<String>,
        display: Option<String>,
        items: Vec<ObjectId>,
    },
    Mapping {
        label: Option<String>,
        display: Option<String>,
        entries: Vec<(Key, ObjectId)>,
    },
}

/// An in-memory object graph implementing [`ObjectSource`].
///
/// Used three ways: built by hand (tests, fixtures), loaded from a JSON
/// document (CLI input), or lifted from an existing mirror tree so decoded
/// snapshots and diff results can be re-walked into transcripts.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    slots: Vec<Slot>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, slot: Slot) -> ObjectId {
        let id = ObjectId(self.slots.len() as u64);
        self.slots.push(slot);
        id
    }

    fn slot(&self, id: ObjectId) -> SourceResult<&Slot> {
        self.slots
            .get(id.0 as usize)
            .ok_or(SourceError::UnknownObject(id))
    }

    // Builders.

    pub fn scalar(&mut self, value: Scalar) -> ObjectId {
        self.push(Slot::Scalar(value))
    }

    pub fn null(&mut self) -> ObjectId {
        self.scalar(Scalar::Null)
    }

    pub fn boolean(&mut self, b: bool) -> ObjectId {
        self.scalar(Scalar::Bool(b))
    }

    pub fn int(&mut self, i: i64) -> ObjectId {
        self.scalar(Scalar::Int(i))
    }

    pub fn float(&mut self, x: f64) -> ObjectId {
        self.scalar(Scalar::Float(x))
    }

    pub fn string(&mut self, s: impl Into<String>) -> ObjectId {
        self.scalar(Scalar::Str(s.into()))
    }

    pub fn opaque(&mut self, display: impl Into<String>) -> ObjectId {
        self.push(Slot::Opaque {
            display: display.into(),
        })
    }

    /// New empty sequence; fill it with [`push_item`](Self::push_item).
    pub fn sequence(&mut self, label: Option<&str>) -> ObjectId {
        self.push(Slot::Sequence {
            label: label.map(str::to_string),
            display: None,
            items: Vec::new(),
        })
    }

    /// New empty mapping; fill it with [`insert`](Self::insert).
    pub fn mapping(&mut self, label: Option<&str>) -> ObjectId {
        self.push(Slot::Mapping {
            label: label.map(str::to_string),
            display: None,
            entries: Vec::new(),
        })
    }

    /// Append an item to a sequence. Inserting an ancestor's id is how a
    /// cycle is built.
    pub fn push_item(&mut self, seq: ObjectId, child: ObjectId) {
        if let Some(Slot::Sequence { items, .. }) = self.slots.get_mut(seq.0 as usize) {
            items.push(child);
        }
    }

    /// Insert a key/value entry into a mapping, preserving insertion order.
    pub fn insert(&mut self, map: ObjectId, key: Key, child: ObjectId) {
        if let Some(Slot::Mapping { entries, .. }) = self.slots.get_mut(map.0 as usize) {
            entries.push((key, child));
        }
    }

    /// Attach a custom display string to a container.
    pub fn set_display(&mut self, id: ObjectId, display: impl Into<String>) {
        match self.slots.get_mut(id.0 as usize) {
            Some(Slot::Sequence { display: d, .. }) | Some(Slot::Mapping { display: d, .. }) => {
                *d = Some(display.into());
            }
            _ => {}
        }
    }

    /// Load a JSON document into a graph, returning the root id.
    ///
    /// Objects become mappings (insertion order preserved), arrays become
    /// sequences, scalars become scalars. JSON cannot express cycles, so
    /// the result is always a tree.
    pub fn from_json(value: &serde_json::Value) -> (Self, ObjectId) {
        let mut graph = Self::new();
        let root = graph.add_json(value);
        (graph, root)
    }

    fn add_json(&mut self, value: &serde_json::Value) -> ObjectId {
        use serde_json::Value;
        match value {
            Value::Null => self.null(),
            Value::Bool(b) => self.boolean(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.int(i)
                } else {
                    self.float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => self.string(s.clone()),
            Value::Array(items) => {
                let seq = self.sequence(None);
                for item in items {
                    let child = self.add_json(item);
                    self.push_item(seq, child);
                }
                seq
            }
            Value::Object(map) => {
                let node = self.mapping(None);
                for (k, v) in map {
                    let child = self.add_json(v);
                    self.insert(node, Key::Str(k.clone()), child);
                }
                node
            }
        }
    }

    /// Lift a mirror tree into a walkable graph, returning the root id.
    ///
    /// Containers keep their labels; diff pairs, run groups, recursion
    /// markers and truncation markers collapse to opaque leaves carrying
    /// their display form, which is what a transcript shows for them.
    pub fn from_mirror(node: &MirrorNode) -> (Self, ObjectId) {
        let mut graph = Self::new();
        let root = graph.add_mirror(node);
        (graph, root)
    }

    fn add_mirror(&mut self, node: &MirrorNode) -> ObjectId {
        match node {
            MirrorNode::Scalar(s) => self.scalar(s.clone()),
            MirrorNode::Opaque { display } => self.opaque(display.clone()),
            MirrorNode::Sequence { children, meta, .. } => {
                let seq = self.sequence(Some(&meta.label));
                if let Some(d) = &meta.display {
                    self.set_display(seq, d.clone());
                }
                for child in children {
                    let id = self.add_mirror(child);
                    self.push_item(seq, id);
                }
                seq
            }
            MirrorNode::Mapping { entries, meta } => {
                let map = self.mapping(Some(&meta.label));
                if let Some(d) = &meta.display {
                    self.set_display(map, d.clone());
                }
                for (key, child) in entries {
                    let id = self.add_mirror(child);
                    self.insert(map, key.clone(), id);
                }
                map
            }
            other => self.opaque(other.display_string()),
        }
    }
}

impl ObjectSource for MemoryGraph {
    fn classify(&self, id: ObjectId) -> SourceResult<ValueClass> {
        Ok(match self.slot(id)? {
            Slot::Scalar(_) => ValueClass::Scalar,
            Slot::Opaque { .. } => ValueClass::Opaque,
            Slot::Sequence { .. } => ValueClass::Sequence,
            Slot::Mapping { .. } => ValueClass::Mapping,
        })
    }

    fn try_scalar(&self, id: ObjectId) -> Option<Scalar> {
        match self.slot(id).ok()? {
            Slot::Scalar(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn try_children(&self, id: ObjectId) -> Option<Vec<(Key, ObjectId)>> {
        match self.slot(id).ok()? {
            Slot::Sequence { items, .. } => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, child)| (Key::Int(i as i64 + 1), *child))
                    .collect(),
            ),
            Slot::Mapping { entries, .. } => Some(entries.clone()),
            _ => None,
        }
    }

    fn try_display(&self, id: ObjectId) -> Option<String> {
        match self.slot(id).ok()? {
            Slot::Opaque { display } => Some(display.clone()),
            Slot::Sequence { display, .. } | Slot::Mapping { display, .. } => display.clone(),
            _ => None,
        }
    }

    fn try_type_label(&self, id: ObjectId) -> Option<String> {
        match self.slot(id).ok()? {
            Slot::Sequence { label, .. } | Slot::Mapping { label, .. } => label.clone(),
            _ => None,
        }
    }

    fn try_identifier(&self, id: ObjectId) -> Option<Scalar> {
        match self.slot(id).ok()? {
            Slot::Mapping { entries, .. } => entries
                .iter()
                .find(|(k, _)| matches!(k, Key::Str(s) if s == "id"))
                .and_then(|(_, child)| self.try_scalar(*child)),
            _ => None,
        }
    }

    fn sequence_len(&self, id: ObjectId) -> Option<u64> {
        match self.slot(id).ok()? {
            Slot::Sequence { items, .. } => Some(items.len() as u64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_children_order() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(Some("Config"));
        let b = graph.boolean(true);
        let n = graph.int(7);
        graph.insert(root, Key::Str("flag".into()), b);
        graph.insert(root, Key::Int(2), n);

        let children = graph.try_children(root).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].0, Key::Str("flag".into()));
        assert_eq!(children[1].0, Key::Int(2));
        assert_eq!(graph.try_type_label(root), Some("Config".into()));
    }

    #[test]
    fn test_identifier_probe() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let id_val = graph.int(42);
        graph.insert(root, Key::Str("id".into()), id_val);
        assert_eq!(graph.try_identifier(root), Some(Scalar::Int(42)));

        let seq = graph.sequence(None);
        assert_eq!(graph.try_identifier(seq), None);
    }

    #[test]
    fn test_from_json_preserves_shape() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"name":"a","items":[1,2,3],"on":true}"#).unwrap();
        let (graph, root) = MemoryGraph::from_json(&value);

        assert_eq!(graph.classify(root).unwrap(), ValueClass::Mapping);
        let children = graph.try_children(root).unwrap();
        assert_eq!(children[0].0, Key::Str("name".into()));
        let items = children[1].1;
        assert_eq!(graph.classify(items).unwrap(), ValueClass::Sequence);
        assert_eq!(graph.sequence_len(items), Some(3));
    }

    #[test]
    fn test_from_mirror_collapses_markers() {
        let node = MirrorNode::Mapping {
            entries: vec![(
                Key::Str("loop".into()),
                MirrorNode::Recursion {
                    identity: ObjectId(0),
                    offset: 2,
                },
            )],
            meta: crate::node::Metadata::labeled("map"),
        };
        let (graph, root) = MemoryGraph::from_mirror(&node);
        let children = graph.try_children(root).unwrap();
        assert_eq!(graph.classify(children[0].1).unwrap(), ValueClass::Opaque);
        assert_eq!(
            graph.try_display(children[0].1),
            Some("<recursion ^2>".into())
        );
    }

    #[test]
    fn test_cycle_construction() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        graph.insert(root, Key::Str("me".into()), root);
        let children = graph.try_children(root).unwrap();
        assert_eq!(children[0].1, root);
    }
}
