//! Object source capability and ancestor tracking.

use crate::error::SourceResult;
use crate::node::{Key, Scalar};
use std::collections::HashMap;
use std::fmt;

/// Identity of a value inside an object source.
///
/// Identities are only meaningful relative to the source that issued them;
/// a snapshot round-trips them as opaque integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broad shape of a value, as far as the walker is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueClass {
    Scalar,
    Opaque,
    Sequence,
    Mapping,
}

impl ValueClass {
    /// Generic display label when the source exposes no explicit one.
    pub fn generic_label(self) -> &'static str {
        match self {
            ValueClass::Scalar => "scalar",
            ValueClass::Opaque => "opaque",
            ValueClass::Sequence => "array",
            ValueClass::Mapping => "map",
        }
    }
}

/// Fallible introspection of a live object graph.
///
/// Everything here except [`classify`](ObjectSource::classify) is a
/// best-effort probe: absence (`None`) is an answer, never an abort. The
/// walker composes these probes and degrades gracefully when they come
/// back empty.
pub trait ObjectSource {
    /// Classify the value behind `id`.
    fn classify(&self, id: ObjectId) -> SourceResult<ValueClass>;

    /// The scalar payload, when `id` classifies as a scalar.
    fn try_scalar(&self, id: ObjectId) -> Option<Scalar>;

    /// Child key/value pairs in source order. `None` means the value is
    /// not enumerable (opaque handle); the walker never recurses into it.
    fn try_children(&self, id: ObjectId) -> Option<Vec<(Key, ObjectId)>>;

    /// Custom display string, if the value exposes one.
    fn try_display(&self, id: ObjectId) -> Option<String>;

    /// Explicit type name, if the value exposes one.
    fn try_type_label(&self, id: ObjectId) -> Option<String>;

    /// A primitive identifier field (`id`), if the value exposes one.
    fn try_identifier(&self, id: ObjectId) -> Option<Scalar>;

    /// Addressable length, when `id` classifies as a sequence.
    fn sequence_len(&self, id: ObjectId) -> Option<u64>;
}

/// Owned record of the container identities open on the current
/// root-to-node path, with the depth at which each was first entered.
///
/// Every recursive call receives its own copy: insertions in one branch
/// never leak to siblings, which scopes cycle detection to the current
/// path rather than "anything seen so far".
#[derive(Debug, Clone, Default)]
pub struct AncestorPath {
    entries: HashMap<ObjectId, usize>,
}

impl AncestorPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth at which `id` was first entered on this path, if it is open.
    pub fn depth_of(&self, id: ObjectId) -> Option<usize> {
        self.entries.get(&id).copied()
    }

    /// A copy of this path with `id` recorded at `depth`.
    ///
    /// Depths are strictly increasing along any path.
    pub fn entered(&self, id: ObjectId, depth: usize) -> AncestorPath {
        debug_assert!(
            self.entries.values().all(|&d| d < depth),
            "ancestor depth must increase strictly"
        );
        let mut copy = self.clone();
        copy.entries.insert(id, depth);
        copy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
