//! Mirror tree <-> snapshot lowering and raising.

use crate::error::{SnapshotError, SnapshotResult};
use mirrorwalk_core::{Key, Metadata, MirrorNode, ObjectId, Scalar};
use serde_json::{Map, Number, Value};
use tracing::warn;

/// Sidecar key carrying a container's metadata. The wire format can carry
/// only data, not behavior, so labels, key order and the slow flag travel
/// as a nested object.
const META_KEY: &str = "__meta";
/// Key carrying a sequence's ordered items.
const ITEMS_KEY: &str = "__items";
const OPAQUE_KEY: &str = "__opaque";
const RUN_KEY: &str = "__run";
const RECURSION_KEY: &str = "__recursion";
const TRUNCATED_KEY: &str = "__truncated";
const DIFF_KEY: &str = "__diff";

/// Encode a mirror tree to compact snapshot text.
pub fn encode(node: &MirrorNode) -> SnapshotResult<String> {
    Ok(serde_json::to_string(&lower(node)?)?)
}

/// Encode a mirror tree to pretty-printed snapshot text.
pub fn encode_pretty(node: &MirrorNode) -> SnapshotResult<String> {
    Ok(serde_json::to_string_pretty(&lower(node)?)?)
}

/// Chunked encoding: every direct child flagged as a slow subtree is
/// encoded independently and spliced over a sentinel in the parent's own
/// whole encoding; the rule recurses into slow grandchildren. This bounds
/// peak memory: a slow subtree's bytes are never materialized inside a
/// larger buffer.
///
/// Any failure in any chunk abandons the chunked path and falls back to
/// one-shot whole-tree encoding.
pub fn encode_chunked(node: &MirrorNode) -> SnapshotResult<String> {
    let nonce = node as *const MirrorNode as usize;
    let mut counter = 0u64;
    match chunked(node, nonce, &mut counter) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!("chunked encoding failed, falling back to whole-tree: {e}");
            encode(node)
        }
    }
}

/// Decode snapshot text back into a mirror tree.
pub fn decode(text: &str) -> SnapshotResult<MirrorNode> {
    let value: Value = serde_json::from_str(text)?;
    raise(&value)
}

fn lower(node: &MirrorNode) -> SnapshotResult<Value> {
    Ok(match node {
        MirrorNode::Scalar(s) => lower_scalar(s),
        MirrorNode::Opaque { display } => {
            single_key(OPAQUE_KEY, Value::String(display.clone()))
        }
        MirrorNode::RunGroup { count, value } => {
            let mut inner = Map::new();
            inner.insert("count".into(), Value::Number((*count).into()));
            inner.insert("value".into(), lower(value)?);
            single_key(RUN_KEY, Value::Object(inner))
        }
        MirrorNode::Recursion { identity, offset } => {
            let mut inner = Map::new();
            inner.insert("identity".into(), Value::Number(identity.0.into()));
            inner.insert("offset".into(), Value::Number((*offset).into()));
            single_key(RECURSION_KEY, Value::Object(inner))
        }
        MirrorNode::Truncated { display, ident } => {
            let mut inner = Map::new();
            inner.insert("display".into(), Value::String(display.clone()));
            if let Some(id) = ident {
                inner.insert("id".into(), lower_scalar(id));
            }
            single_key(TRUNCATED_KEY, Value::Object(inner))
        }
        MirrorNode::DiffPair { value, compare } => {
            // An absent side is an omitted key; a present null is data
            // (a literal null scalar on that side).
            let mut inner = Map::new();
            if let Some(v) = value {
                inner.insert("value".into(), lower(v)?);
            }
            if let Some(c) = compare {
                inner.insert("compare".into(), lower(c)?);
            }
            single_key(DIFF_KEY, Value::Object(inner))
        }
        MirrorNode::Mapping { entries, meta } => {
            let keys: Vec<Key> = entries.iter().map(|(k, _)| k.clone()).collect();
            let mut obj = Map::new();
            obj.insert(META_KEY.into(), lower_meta(meta, "mapping", Some(&keys), None));
            for (key, child) in entries {
                let coerced = key.coerced();
                let lowered = lower(child)?;
                if obj.insert(coerced.clone(), lowered).is_some() {
                    return Err(SnapshotError::KeyCollision(coerced));
                }
            }
            Value::Object(obj)
        }
        MirrorNode::Sequence {
            len,
            children,
            meta,
        } => {
            let mut obj = Map::new();
            obj.insert(META_KEY.into(), lower_meta(meta, "sequence", None, Some(*len)));
            obj.insert(
                ITEMS_KEY.into(),
                Value::Array(children.iter().map(lower).collect::<SnapshotResult<Vec<_>>>()?),
            );
            Value::Object(obj)
        }
    })
}

/// Lower a metadata sidecar. The node's own sidecar is preserved
/// structurally (deep); the sidecar's own attributes are coerced to plain
/// bool/number/string to bound the metadata chain — the key-order list is
/// the only deeply-structured exception.
fn lower_meta(meta: &Metadata, kind: &str, keys: Option<&[Key]>, len: Option<u64>) -> Value {
    let mut m = Map::new();
    m.insert("kind".into(), Value::String(kind.into()));
    m.insert("label".into(), Value::String(meta.label.clone()));
    if let Some(keys) = keys {
        m.insert(
            "keyOrder".into(),
            Value::Array(keys.iter().map(lower_key).collect()),
        );
    }
    if let Some(len) = len {
        m.insert("len".into(), Value::Number(len.into()));
    }
    if meta.slow_subtree {
        m.insert("slow".into(), Value::Bool(true));
    }
    if let Some(display) = &meta.display {
        m.insert("display".into(), Value::String(display.clone()));
    }
    Value::Object(m)
}

fn lower_scalar(s: &Scalar) -> Value {
    match s {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::Number((*i).into()),
        Scalar::Float(x) => Number::from_f64(*x).map(Value::Number).unwrap_or(Value::Null),
        Scalar::Str(s) => Value::String(s.clone()),
    }
}

fn lower_key(key: &Key) -> Value {
    match key {
        Key::Bool(b) => Value::Bool(*b),
        Key::Int(i) => Value::Number((*i).into()),
        Key::Float(x) => Number::from_f64(*x).map(Value::Number).unwrap_or(Value::Null),
        Key::Str(s) => Value::String(s.clone()),
    }
}

fn single_key(key: &str, value: Value) -> Value {
    let mut obj = Map::new();
    obj.insert(key.into(), value);
    Value::Object(obj)
}

fn raise(value: &Value) -> SnapshotResult<MirrorNode> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Ok(MirrorNode::Scalar(raise_scalar(value)?))
        }
        // Bare arrays only appear in hand-written snapshots; accept them
        // as label-less sequences.
        Value::Array(items) => {
            let children = items.iter().map(raise).collect::<SnapshotResult<Vec<_>>>()?;
            let len = children.len() as u64;
            Ok(MirrorNode::Sequence {
                len,
                children,
                meta: Metadata::labeled(format!("array[{len}]")),
            })
        }
        Value::Object(obj) => raise_object(obj),
    }
}

fn raise_object(obj: &Map<String, Value>) -> SnapshotResult<MirrorNode> {
    if let Some(display) = obj.get(OPAQUE_KEY) {
        let display = expect_str(display, "__opaque display")?;
        return Ok(MirrorNode::Opaque { display });
    }
    if let Some(run) = obj.get(RUN_KEY) {
        let run = expect_obj(run, "__run body")?;
        let count = run
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| corrupted("run group without a count"))?;
        let value = run
            .get("value")
            .ok_or_else(|| corrupted("run group without a value"))?;
        return Ok(MirrorNode::RunGroup {
            count,
            value: Box::new(raise(value)?),
        });
    }
    if let Some(rec) = obj.get(RECURSION_KEY) {
        let rec = expect_obj(rec, "__recursion body")?;
        let identity = rec
            .get("identity")
            .and_then(Value::as_u64)
            .ok_or_else(|| corrupted("recursion marker without an identity"))?;
        let offset = rec
            .get("offset")
            .and_then(Value::as_u64)
            .ok_or_else(|| corrupted("recursion marker without an offset"))?;
        return Ok(MirrorNode::Recursion {
            identity: ObjectId(identity),
            offset: offset as u32,
        });
    }
    if let Some(trunc) = obj.get(TRUNCATED_KEY) {
        let trunc = expect_obj(trunc, "__truncated body")?;
        let display = trunc
            .get("display")
            .map(|v| expect_str(v, "truncation display"))
            .transpose()?
            .unwrap_or_default();
        let ident = trunc.get("id").map(raise_scalar).transpose()?;
        return Ok(MirrorNode::Truncated { display, ident });
    }
    if let Some(diff) = obj.get(DIFF_KEY) {
        let diff = expect_obj(diff, "__diff body")?;
        // A missing key is an absent side; a present null raises to a
        // null scalar on that side.
        let side = |name: &str| -> SnapshotResult<Option<Box<MirrorNode>>> {
            match diff.get(name) {
                None => Ok(None),
                Some(v) => Ok(Some(Box::new(raise(v)?))),
            }
        };
        return Ok(MirrorNode::DiffPair {
            value: side("value")?,
            compare: side("compare")?,
        });
    }
    raise_container(obj)
}

fn raise_container(obj: &Map<String, Value>) -> SnapshotResult<MirrorNode> {
    let Some(meta_value) = obj.get(META_KEY) else {
        // Sidecar-less objects are accepted as plain string-keyed mappings.
        let mut entries = Vec::new();
        for (k, v) in obj {
            entries.push((Key::Str(k.clone()), raise(v)?));
        }
        let mut meta = Metadata::labeled("map");
        meta.key_order = entries.iter().map(|(k, _)| k.clone()).collect();
        return Ok(MirrorNode::Mapping { entries, meta });
    };

    let sidecar = expect_obj(meta_value, "metadata sidecar")?;
    let kind = sidecar.get("kind").and_then(Value::as_str).unwrap_or("mapping");
    let label = sidecar
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or("map")
        .to_string();
    let slow = sidecar.get("slow").and_then(Value::as_bool).unwrap_or(false);
    let display = sidecar
        .get("display")
        .and_then(Value::as_str)
        .map(str::to_string);

    if kind == "sequence" {
        let items = obj
            .get(ITEMS_KEY)
            .and_then(Value::as_array)
            .ok_or_else(|| corrupted("sequence without __items"))?;
        let children = items.iter().map(raise).collect::<SnapshotResult<Vec<_>>>()?;
        let len = sidecar
            .get("len")
            .and_then(Value::as_u64)
            .unwrap_or(children.len() as u64);
        return Ok(MirrorNode::Sequence {
            len,
            children,
            meta: Metadata {
                label,
                key_order: Vec::new(),
                slow_subtree: slow,
                display,
            },
        });
    }

    // Mapping: re-key children by matching each original key against its
    // string-coerced counterpart, and install the key-order list as the
    // active iteration order. This restores the key identity that the
    // wire format destroyed.
    let mut entries = Vec::new();
    let mut consumed = std::collections::HashSet::new();
    if let Some(order) = sidecar.get("keyOrder").and_then(Value::as_array) {
        for key_value in order {
            let key = raise_key(key_value)?;
            let coerced = key.coerced();
            let child = obj
                .get(&coerced)
                .ok_or_else(|| corrupted(format!("key order names missing child '{coerced}'")))?;
            entries.push((key, raise(child)?));
            consumed.insert(coerced);
        }
    }
    // Children the key-order list does not cover keep their wire keys.
    for (k, v) in obj {
        if k == META_KEY || consumed.contains(k) {
            continue;
        }
        entries.push((Key::Str(k.clone()), raise(v)?));
    }

    let key_order = entries.iter().map(|(k, _)| k.clone()).collect();
    Ok(MirrorNode::Mapping {
        entries,
        meta: Metadata {
            label,
            key_order,
            slow_subtree: slow,
            display,
        },
    })
}

fn raise_scalar(value: &Value) -> SnapshotResult<Scalar> {
    Ok(match value {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Int(i)
            } else {
                Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Scalar::Str(s.clone()),
        other => return Err(corrupted(format!("expected scalar, found {other}"))),
    })
}

fn raise_key(value: &Value) -> SnapshotResult<Key> {
    Ok(match value {
        Value::Bool(b) => Key::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Key::Int(i)
            } else {
                Key::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Key::Str(s.clone()),
        other => return Err(corrupted(format!("invalid key in key order: {other}"))),
    })
}

fn chunked(node: &MirrorNode, nonce: usize, counter: &mut u64) -> SnapshotResult<String> {
    let mut pending: Vec<(String, &MirrorNode)> = Vec::new();
    let shell = lower_shell(node, nonce, counter, &mut pending)?;
    let mut text = serde_json::to_string(&shell)?;
    for (sentinel, child) in pending {
        let chunk = chunked(child, nonce, counter)?;
        let needle = format!("\"{sentinel}\"");
        let position = text
            .find(&needle)
            .ok_or_else(|| corrupted("chunk sentinel missing from parent encoding"))?;
        text.replace_range(position..position + needle.len(), &chunk);
    }
    Ok(text)
}

/// Lower one node, substituting a sentinel string for each direct child
/// that is a slow-flagged container. Non-slow children are lowered whole;
/// slow grandchildren are handled when their parent chunk is encoded.
fn lower_shell<'a>(
    node: &'a MirrorNode,
    nonce: usize,
    counter: &mut u64,
    pending: &mut Vec<(String, &'a MirrorNode)>,
) -> SnapshotResult<Value> {
    let mut place = |child: &'a MirrorNode| -> SnapshotResult<Value> {
        if is_slow_container(child) {
            let sentinel = format!("__mirrorwalk_chunk_{nonce:x}_{counter}__");
            *counter += 1;
            pending.push((sentinel.clone(), child));
            Ok(Value::String(sentinel))
        } else {
            lower(child)
        }
    };

    Ok(match node {
        MirrorNode::Mapping { entries, meta } => {
            let keys: Vec<Key> = entries.iter().map(|(k, _)| k.clone()).collect();
            let mut obj = Map::new();
            obj.insert(META_KEY.into(), lower_meta(meta, "mapping", Some(&keys), None));
            for (key, child) in entries {
                let coerced = key.coerced();
                let placed = place(child)?;
                if obj.insert(coerced.clone(), placed).is_some() {
                    return Err(SnapshotError::KeyCollision(coerced));
                }
            }
            Value::Object(obj)
        }
        MirrorNode::Sequence {
            len,
            children,
            meta,
        } => {
            let mut obj = Map::new();
            obj.insert(META_KEY.into(), lower_meta(meta, "sequence", None, Some(*len)));
            obj.insert(
                ITEMS_KEY.into(),
                Value::Array(
                    children
                        .iter()
                        .map(&mut place)
                        .collect::<SnapshotResult<Vec<_>>>()?,
                ),
            );
            Value::Object(obj)
        }
        other => lower(other)?,
    })
}

fn is_slow_container(node: &MirrorNode) -> bool {
    node.metadata().map(|m| m.slow_subtree).unwrap_or(false)
}

fn corrupted(message: impl Into<String>) -> SnapshotError {
    SnapshotError::Corrupted(message.into())
}

fn expect_str(value: &Value, what: &str) -> SnapshotResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| corrupted(format!("{what} must be a string")))
}

fn expect_obj<'v>(value: &'v Value, what: &str) -> SnapshotResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| corrupted(format!("{what} must be an object")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: Vec<(Key, MirrorNode)>, label: &str) -> MirrorNode {
        let key_order = entries.iter().map(|(k, _)| k.clone()).collect();
        MirrorNode::Mapping {
            entries,
            meta: Metadata {
                label: label.into(),
                key_order,
                slow_subtree: false,
                display: None,
            },
        }
    }

    fn scalar(i: i64) -> MirrorNode {
        MirrorNode::Scalar(Scalar::Int(i))
    }

    #[test]
    fn test_round_trip_non_string_keys_and_order() {
        let tree = mapping(
            vec![
                (Key::Int(2), scalar(20)),
                (Key::Str("two".into()), scalar(2)),
                (Key::Bool(true), scalar(1)),
                (Key::Int(1), scalar(10)),
            ],
            "Lookup",
        );
        let decoded = decode(&encode(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);

        // Key identity survives: the first key is Int(2), not Str("2").
        match &decoded {
            MirrorNode::Mapping { entries, meta } => {
                assert_eq!(entries[0].0, Key::Int(2));
                assert_eq!(entries[2].0, Key::Bool(true));
                assert_eq!(meta.key_order[3], Key::Int(1));
            }
            other => panic!("expected mapping, got {other:?}"),
        }
    }

    #[test]
    fn test_opaque_distinct_from_string_scalar() {
        let opaque = MirrorNode::Opaque {
            display: "function: 0x1".into(),
        };
        let string = MirrorNode::Scalar(Scalar::Str("function: 0x1".into()));
        assert_eq!(decode(&encode(&opaque).unwrap()).unwrap(), opaque);
        assert_eq!(decode(&encode(&string).unwrap()).unwrap(), string);
    }

    #[test]
    fn test_marker_nodes_round_trip() {
        let tree = MirrorNode::Sequence {
            len: 153,
            children: vec![
                MirrorNode::RunGroup {
                    count: 150,
                    value: Box::new(scalar(5)),
                },
                MirrorNode::Recursion {
                    identity: ObjectId(7),
                    offset: 2,
                },
                MirrorNode::Truncated {
                    display: "Widget".into(),
                    ident: Some(Scalar::Int(42)),
                },
                MirrorNode::DiffPair {
                    value: Some(Box::new(scalar(3))),
                    compare: None,
                },
            ],
            meta: Metadata::labeled("array[153]"),
        };
        assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
    }

    #[test]
    fn test_diff_pair_null_side_is_not_an_absent_side() {
        // A literal null scalar on one side must survive a round trip;
        // only a truly absent side decodes as None.
        let null_sided = MirrorNode::DiffPair {
            value: Some(Box::new(MirrorNode::Scalar(Scalar::Null))),
            compare: Some(Box::new(scalar(3))),
        };
        assert_eq!(decode(&encode(&null_sided).unwrap()).unwrap(), null_sided);

        let one_sided = MirrorNode::DiffPair {
            value: None,
            compare: Some(Box::new(scalar(3))),
        };
        assert_eq!(decode(&encode(&one_sided).unwrap()).unwrap(), one_sided);
    }

    #[test]
    fn test_encode_rejects_colliding_wire_keys() {
        let tree = mapping(
            vec![
                (Key::Int(1), MirrorNode::Scalar(Scalar::Str("int-keyed".into()))),
                (
                    Key::Str("1".into()),
                    MirrorNode::Scalar(Scalar::Str("str-keyed".into())),
                ),
            ],
            "Lookup",
        );
        assert!(matches!(
            encode(&tree),
            Err(SnapshotError::KeyCollision(k)) if k == "1"
        ));
        assert!(matches!(
            encode_pretty(&tree),
            Err(SnapshotError::KeyCollision(_))
        ));
        assert!(matches!(
            encode_chunked(&tree),
            Err(SnapshotError::KeyCollision(_))
        ));
    }

    #[test]
    fn test_bare_scalar_root() {
        let tree = MirrorNode::Scalar(Scalar::Str("just a string".into()));
        assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
        assert_eq!(encode(&tree).unwrap(), "\"just a string\"");
    }

    #[test]
    fn test_display_override_round_trips() {
        let tree = MirrorNode::Mapping {
            entries: vec![],
            meta: Metadata {
                label: "Point".into(),
                key_order: vec![],
                slow_subtree: false,
                display: Some("(3, 4)".into()),
            },
        };
        let decoded = decode(&encode(&tree).unwrap()).unwrap();
        assert_eq!(decoded.metadata().unwrap().display, Some("(3, 4)".into()));
    }

    fn tree_with_slow_subtrees() -> MirrorNode {
        let mut slow_meta = Metadata::labeled("Inner");
        slow_meta.slow_subtree = true;
        slow_meta.key_order = vec![Key::Str("x".into())];
        let slow_inner = MirrorNode::Mapping {
            entries: vec![(Key::Str("x".into()), scalar(1))],
            meta: slow_meta,
        };

        let mut mid_meta = Metadata::labeled("Mid");
        mid_meta.slow_subtree = true;
        mid_meta.key_order = vec![Key::Str("inner".into()), Key::Str("y".into())];
        let mid = MirrorNode::Mapping {
            entries: vec![
                (Key::Str("inner".into()), slow_inner),
                (Key::Str("y".into()), scalar(2)),
            ],
            meta: mid_meta,
        };

        mapping(
            vec![
                (Key::Str("mid".into()), mid),
                (Key::Str("fast".into()), scalar(3)),
            ],
            "Root",
        )
    }

    #[test]
    fn test_chunked_and_whole_tree_decode_identically() {
        let tree = tree_with_slow_subtrees();
        let whole = encode(&tree).unwrap();
        let chunked = encode_chunked(&tree).unwrap();
        assert_eq!(decode(&chunked).unwrap(), decode(&whole).unwrap());
        assert_eq!(decode(&chunked).unwrap(), tree);
        assert!(!chunked.contains("__mirrorwalk_chunk_"));
    }

    #[test]
    fn test_chunked_without_slow_subtrees_matches_whole() {
        let tree = mapping(vec![(Key::Str("a".into()), scalar(1))], "Root");
        assert_eq!(encode_chunked(&tree).unwrap(), encode(&tree).unwrap());
    }

    #[test]
    fn test_decode_rejects_key_order_mismatch() {
        let text = r#"{"__meta":{"kind":"mapping","label":"m","keyOrder":["missing"]}}"#;
        assert!(matches!(
            decode(text),
            Err(SnapshotError::Corrupted(_))
        ));
    }

    #[test]
    fn test_sidecar_less_object_is_accepted() {
        let tree = decode(r#"{"a":1,"b":"two"}"#).unwrap();
        match tree {
            MirrorNode::Mapping { entries, .. } => {
                assert_eq!(entries[0].0, Key::Str("a".into()));
                assert_eq!(entries[1].1, MirrorNode::Scalar(Scalar::Str("two".into())));
            }
            other => panic!("expected mapping, got {other:?}"),
        }
    }
}
