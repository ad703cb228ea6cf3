//! Structural diff over mirror trees.
//!
//! [`compare`] walks two mirror trees (decoded from snapshots or freshly
//! walked) and produces a sparse difference tree: `None` means no
//! difference, a container holds only the keys that differ, and a
//! [`MirrorNode::DiffPair`] leaf carries both originals where structural
//! comparison was not possible. The result is itself a mirror tree, so it
//! can be re-walked into a transcript and re-encoded as a snapshot.
//!
//! Inputs are read-only; comparison never mutates caller-owned state.
//!
//! # Example
//!
//! ```
//! use mirrorwalk_core::{Key, Metadata, MirrorNode, Scalar};
//! use mirrorwalk_diff::compare;
//!
//! let three = MirrorNode::Scalar(Scalar::Int(3));
//! assert!(compare(Some(&three), Some(&three)).is_none());
//! ```

use mirrorwalk_core::{Key, Metadata, MirrorNode};
use tracing::trace;

/// Compare two optional mirror nodes. `None` result means no difference.
pub fn compare(a: Option<&MirrorNode>, b: Option<&MirrorNode>) -> Option<MirrorNode> {
    if a == b {
        return None;
    }

    // Function-like values are incomparable, not diffed; and two opaques
    // offer nothing structural to compare either way.
    if function_like(a) || function_like(b) {
        return None;
    }
    if is_opaque(a) && is_opaque(b) {
        return None;
    }

    match (a, b) {
        (Some(x), Some(y))
            if x.is_container() && y.is_container() && label_prefix(x) == label_prefix(y) =>
        {
            compare_containers(x, y)
        }
        (
            Some(MirrorNode::RunGroup {
                count: ca,
                value: va,
            }),
            Some(MirrorNode::RunGroup {
                count: cb,
                value: vb,
            }),
        ) if ca == cb => compare(Some(va), Some(vb)),
        _ => Some(pair(a, b)),
    }
}

fn compare_containers(a: &MirrorNode, b: &MirrorNode) -> Option<MirrorNode> {
    let a_entries = entries_of(a);
    let b_entries = entries_of(b);

    let mut diffs: Vec<(Key, MirrorNode)> = Vec::new();

    // Keys of `a`, in `a`'s order.
    for (key, a_child) in &a_entries {
        let b_child = lookup(&b_entries, key);
        if let Some(diff) = compare(Some(a_child), b_child) {
            diffs.push((key.clone(), diff));
        }
    }
    // Keys present only in `b`.
    for (key, b_child) in &b_entries {
        if lookup(&a_entries, key).is_none() {
            if let Some(diff) = compare(None, Some(b_child)) {
                diffs.push((key.clone(), diff));
            }
        }
    }

    if diffs.is_empty() {
        return None;
    }
    if let Some(inner) = unwrap_wrapper(&diffs) {
        return Some(inner);
    }

    let label = combined_label(label_of(a), label_of(b));
    let key_order = diffs.iter().map(|(k, _)| k.clone()).collect();
    Some(MirrorNode::Mapping {
        entries: diffs,
        meta: Metadata {
            label,
            key_order,
            slow_subtree: false,
            display: None,
        },
    })
}

/// Primitive-wrapper collapse: a difference container whose keys are
/// exactly `value`, or exactly `value` and `type`, stands for a wrapped
/// primitive; its result is the inner comparison of the `value` entries,
/// not a one-level-deeper container.
fn unwrap_wrapper(diffs: &[(Key, MirrorNode)]) -> Option<MirrorNode> {
    let is = |key: &Key, name: &str| matches!(key, Key::Str(s) if s == name);
    match diffs {
        [(k, d)] if is(k, "value") => Some(d.clone()),
        [(k1, d), (k2, _)] if is(k1, "value") && is(k2, "type") => Some(d.clone()),
        [(k1, _), (k2, d)] if is(k1, "type") && is(k2, "value") => Some(d.clone()),
        _ => None,
    }
}

fn pair(a: Option<&MirrorNode>, b: Option<&MirrorNode>) -> MirrorNode {
    trace!("structural mismatch, recording both sides");
    MirrorNode::DiffPair {
        value: a.cloned().map(Box::new),
        compare: b.cloned().map(Box::new),
    }
}

/// Container entries with a uniform key view: sequences expose 1-based
/// integer keys over their (possibly run-grouped) children.
fn entries_of(node: &MirrorNode) -> Vec<(Key, &MirrorNode)> {
    match node {
        MirrorNode::Mapping { entries, .. } => {
            entries.iter().map(|(k, n)| (k.clone(), n)).collect()
        }
        MirrorNode::Sequence { children, .. } => children
            .iter()
            .enumerate()
            .map(|(i, n)| (Key::Int(i as i64 + 1), n))
            .collect(),
        _ => Vec::new(),
    }
}

fn lookup<'e>(entries: &'e [(Key, &'e MirrorNode)], key: &Key) -> Option<&'e MirrorNode> {
    entries.iter().find(|(k, _)| k == key).map(|(_, n)| *n)
}

fn label_of(node: &MirrorNode) -> &str {
    node.metadata().map(|m| m.label.as_str()).unwrap_or("")
}

fn label_prefix(node: &MirrorNode) -> &str {
    split_label(label_of(node)).0
}

/// Split a trailing bracketed annotation off a label:
/// `array[150]` -> (`array`, `Some("150")`).
fn split_label(label: &str) -> (&str, Option<&str>) {
    if let Some(stripped) = label.strip_suffix(']') {
        if let Some(open) = stripped.rfind('[') {
            return (&label[..open], Some(&stripped[open + 1..]));
        }
    }
    (label, None)
}

fn combined_label(a: &str, b: &str) -> String {
    let (prefix, sa) = split_label(a);
    let (_, sb) = split_label(b);
    match (sa, sb) {
        (Some(x), Some(y)) if x != y => format!("{prefix}[{x} -> {y}]"),
        (Some(x), _) => format!("{prefix}[{x}]"),
        (None, Some(y)) => format!("{prefix}[{y}]"),
        (None, None) => prefix.to_string(),
    }
}

fn function_like(node: Option<&MirrorNode>) -> bool {
    matches!(node, Some(MirrorNode::Opaque { display }) if display.starts_with("function"))
}

fn is_opaque(node: Option<&MirrorNode>) -> bool {
    matches!(node, Some(MirrorNode::Opaque { .. }))
}
