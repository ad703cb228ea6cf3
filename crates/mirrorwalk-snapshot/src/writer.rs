//! Snapshot file reading and writing.

use crate::codec::{encode, encode_chunked, encode_pretty};
use crate::error::SnapshotResult;
use mirrorwalk_core::MirrorNode;
use mirrorwalk_util::path::unique_path;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write a mirror tree to `<dir>/<base>.snap.json`, suffixing the base
/// name with the smallest integer that makes it unique on disk so prior
/// runs are never overwritten.
///
/// Trees containing any slow-flagged subtree are written with chunked
/// encoding; `pretty` applies to the whole-tree path only.
pub fn write_snapshot(
    dir: &Path,
    base: &str,
    node: &MirrorNode,
    pretty: bool,
) -> SnapshotResult<PathBuf> {
    let text = if node.any_slow() {
        encode_chunked(node)?
    } else if pretty {
        encode_pretty(node)?
    } else {
        encode(node)?
    };
    let path = unique_path(dir, base, "snap.json");
    fs::write(&path, text)?;
    info!("wrote snapshot {}", path.display());
    Ok(path)
}

/// Read and decode a snapshot file.
pub fn read_snapshot(path: &Path) -> SnapshotResult<MirrorNode> {
    let text = fs::read_to_string(path)?;
    crate::codec::decode(&text)
}
