//! Mirror tree data model for mirrorwalk.
//!
//! This crate defines the structured result of a graph walk and the
//! capability surface a walk runs against:
//! - [`MirrorNode`] - the walked, in-memory mirror of an object graph
//! - [`ObjectSource`] - fallible, best-effort introspection of live values
//! - [`MemoryGraph`] - an arena-backed source, buildable by hand, from a
//!   JSON document, or from an existing mirror tree (so decoded snapshots
//!   and diff results can be re-walked into transcripts)
//!
//! # Example
//!
//! ```
//! use mirrorwalk_core::{MemoryGraph, Key, Scalar, ObjectSource};
//!
//! let mut graph = MemoryGraph::new();
//! let root = graph.mapping(Some("Config"));
//! let port = graph.int(8080);
//! graph.insert(root, Key::Str("port".into()), port);
//!
//! assert_eq!(graph.try_identifier(root), None);
//! ```

mod error;
mod memory;
mod node;
mod source;

pub use error::{SourceError, SourceResult};
pub use memory::MemoryGraph;
pub use node::{Key, Metadata, MirrorNode, Scalar};
pub use source::{AncestorPath, ObjectId, ObjectSource, ValueClass};
