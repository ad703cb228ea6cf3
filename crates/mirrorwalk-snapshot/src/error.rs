//! Snapshot error types.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while encoding, decoding or writing snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON serialization or parsing failed.
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error reading or writing a snapshot file.
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot text does not describe a valid mirror tree.
    #[error("snapshot corrupted: {0}")]
    Corrupted(String),

    /// Two mapping keys coerce to the same wire string; encoding would
    /// silently drop one child.
    #[error("mapping keys collide on wire string '{0}'")]
    KeyCollision(String),
}
