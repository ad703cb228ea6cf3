//! Mirror tree node types.

use crate::source::ObjectId;
use std::fmt;

/// A scalar value carried by a mirror tree leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Type label used in transcripts and run-group renderings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) | Scalar::Float(_) => "number",
            Scalar::Str(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    /// Literal rendering: strings are quoted, everything else uses its
    /// natural display form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// A mapping key. Keys are scalar-typed but not restricted to strings;
/// wire formats coerce them to strings, which is why containers carry an
/// explicit key-order list in their [`Metadata`].
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Key {
    /// The string form a JSON-like wire format coerces this key to.
    pub fn coerced(&self) -> String {
        match self {
            Key::Bool(b) => b.to_string(),
            Key::Int(i) => i.to_string(),
            Key::Float(x) => x.to_string(),
            Key::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Float(x) => write!(f, "{x}"),
            Key::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

/// Metadata attached to every non-scalar mirror node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    /// Display/type label, e.g. `Config` or `array[150]`.
    pub label: String,

    /// Explicit key order. Authoritative for iteration order after a
    /// decode, since the wire format coerces keys to strings.
    pub key_order: Vec<Key>,

    /// Set when walking this subtree exceeded the time budget. Once set it
    /// is never cleared; the codec uses it to pick chunked encoding.
    pub slow_subtree: bool,

    /// Preserved display-string override, if the source value carried one.
    pub display: Option<String>,
}

impl Metadata {
    /// Metadata with a label and no further annotations.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// One node of a mirror tree: the in-memory, structured result of a walk,
/// independent of its eventual transcript or snapshot rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorNode {
    /// A plain value.
    Scalar(Scalar),

    /// A value whose internals cannot be enumerated; carries its display
    /// string and is never recursed into.
    Opaque { display: String },

    /// Ordered container with contiguous integer keys `1..=len`. After
    /// run-grouping, `children.len()` may be smaller than `len`.
    Sequence {
        len: u64,
        children: Vec<MirrorNode>,
        meta: Metadata,
    },

    /// Container with arbitrary scalar-typed keys; entry order is
    /// significant and preserved.
    Mapping {
        entries: Vec<(Key, MirrorNode)>,
        meta: Metadata,
    },

    /// A collapsed run of `count` consecutive identical sequence values.
    RunGroup { count: u64, value: Box<MirrorNode> },

    /// Marker replacing a child that would re-enter an open ancestor.
    /// `offset` is the distance back up the path, always >= 1.
    Recursion { identity: ObjectId, offset: u32 },

    /// Emitted when the depth limit is reached; carries the display string
    /// and, best-effort, a primitive identifier field of the source value.
    Truncated {
        display: String,
        ident: Option<Scalar>,
    },

    /// Used only inside diff results: both originals for a pair of nodes
    /// whose structural comparison was not possible. Either side may be
    /// absent (key present on one side only).
    DiffPair {
        value: Option<Box<MirrorNode>>,
        compare: Option<Box<MirrorNode>>,
    },
}

impl MirrorNode {
    /// Metadata, for container nodes.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            MirrorNode::Sequence { meta, .. } | MirrorNode::Mapping { meta, .. } => Some(meta),
            _ => None,
        }
    }

    /// Mutable metadata, for container nodes.
    pub fn metadata_mut(&mut self) -> Option<&mut Metadata> {
        match self {
            MirrorNode::Sequence { meta, .. } | MirrorNode::Mapping { meta, .. } => Some(meta),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            MirrorNode::Sequence { .. } | MirrorNode::Mapping { .. }
        )
    }

    /// True if this node or any descendant is flagged as a slow subtree.
    pub fn any_slow(&self) -> bool {
        match self {
            MirrorNode::Sequence { children, meta, .. } => {
                meta.slow_subtree || children.iter().any(MirrorNode::any_slow)
            }
            MirrorNode::Mapping { entries, meta } => {
                meta.slow_subtree || entries.iter().any(|(_, n)| n.any_slow())
            }
            MirrorNode::RunGroup { value, .. } => value.any_slow(),
            _ => false,
        }
    }

    /// One-line display form, used for diff-pair renderings and when a
    /// structured node has to collapse to a single label.
    pub fn display_string(&self) -> String {
        match self {
            MirrorNode::Scalar(s) => s.to_string(),
            MirrorNode::Opaque { display } => display.clone(),
            MirrorNode::Sequence { meta, .. } | MirrorNode::Mapping { meta, .. } => meta
                .display
                .clone()
                .unwrap_or_else(|| format!("<{}>", meta.label)),
            MirrorNode::RunGroup { count, value } => {
                format!("{count}x({})", value.display_string())
            }
            MirrorNode::Recursion { offset, .. } => format!("<recursion ^{offset}>"),
            MirrorNode::Truncated { display, ident } => match ident {
                Some(id) => format!("{display} (id={id})"),
                None => display.clone(),
            },
            MirrorNode::DiffPair { value, compare } => {
                let side = |n: &Option<Box<MirrorNode>>| match n {
                    Some(n) => truncate_display(&n.display_string()),
                    None => "<absent>".to_string(),
                };
                format!("{} -> {}", side(value), side(compare))
            }
        }
    }
}

/// Diff-pair sides render as a short prefix of their display form.
const DISPLAY_PREFIX_LEN: usize = 60;

fn truncate_display(s: &str) -> String {
    if s.chars().count() <= DISPLAY_PREFIX_LEN {
        return s.to_string();
    }
    let prefix: String = s.chars().take(DISPLAY_PREFIX_LEN).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literal_rendering() {
        assert_eq!(Scalar::Str("bob".into()).to_string(), "\"bob\"");
        assert_eq!(Scalar::Int(5).to_string(), "5");
        assert_eq!(Scalar::Bool(true).to_string(), "true");
        assert_eq!(Scalar::Null.to_string(), "null");
    }

    #[test]
    fn test_key_coercion() {
        assert_eq!(Key::Int(1).coerced(), "1");
        assert_eq!(Key::Bool(false).coerced(), "false");
        assert_eq!(Key::Str("x".into()).coerced(), "x");
    }

    #[test]
    fn test_any_slow_propagates() {
        let mut meta = Metadata::labeled("map");
        meta.slow_subtree = true;
        let slow = MirrorNode::Mapping {
            entries: vec![],
            meta,
        };
        let outer = MirrorNode::Sequence {
            len: 1,
            children: vec![slow],
            meta: Metadata::labeled("array[1]"),
        };
        assert!(outer.any_slow());
        assert!(!outer.metadata().unwrap().slow_subtree);
    }

    #[test]
    fn test_diff_pair_display_truncates() {
        let long = "x".repeat(200);
        let pair = MirrorNode::DiffPair {
            value: Some(Box::new(MirrorNode::Opaque { display: long })),
            compare: None,
        };
        let shown = pair.display_string();
        assert!(shown.starts_with("xxxx"));
        assert!(shown.contains("... -> <absent>"));
    }
}
