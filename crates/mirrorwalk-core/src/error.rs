//! Object source error types.

use crate::source::ObjectId;
use thiserror::Error;

/// Result type for object source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised by an object source.
///
/// Optional probes (display strings, identifier fields, type labels) never
/// error; they report absence through `Option`. This type covers the hard
/// failures only.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The identity does not name a live object in this source.
    #[error("unknown object id: {0}")]
    UnknownObject(ObjectId),

    /// The source could not classify a value at all.
    #[error("unreadable value at id {0}: {1}")]
    Unreadable(ObjectId, String),
}
