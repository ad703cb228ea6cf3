//! Walker error types.

use thiserror::Error;

/// Result type for walk operations.
pub type WalkResult<T> = Result<T, WalkError>;

/// Errors that abort a walk.
///
/// Optional probes never land here; they degrade to absence. What does
/// land here is anything that would otherwise produce an incomplete or
/// misleading transcript: sink I/O and hard source failures.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Writing the transcript failed.
    #[error("transcript write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The object source failed hard (unknown identity, unreadable value).
    #[error(transparent)]
    Source(#[from] mirrorwalk_core::SourceError),
}
