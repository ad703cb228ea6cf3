//! Graph traversal for mirrorwalk.
//!
//! [`GraphWalker`] turns a live object graph into a [`MirrorNode`] tree
//! while streaming a human-readable transcript line by line, so a crash
//! mid-walk still leaves a readable partial transcript. Traversal is
//! cycle-safe (per-path ancestor tracking), depth-bounded, and collapses
//! long runs of identical sequence values into run groups.
//!
//! The walk is deliberately synchronous and single-threaded: the source
//! graph is expected to be frozen for the duration, and a walk may block
//! for hours. The [`HeartbeatLog`] is the sole liveness signal visible to
//! an outside observer during that time.
//!
//! # Example
//!
//! ```
//! use mirrorwalk_core::{Key, MemoryGraph};
//! use mirrorwalk_walker::{GraphWalker, WalkOptions};
//!
//! let mut graph = MemoryGraph::new();
//! let root = graph.mapping(Some("Config"));
//! let port = graph.int(8080);
//! graph.insert(root, Key::Str("port".into()), port);
//!
//! let mut walker = GraphWalker::new(&graph, Vec::new(), WalkOptions::default());
//! let mirror = walker.walk(root).unwrap();
//! assert!(mirror.is_container());
//! ```

mod error;
mod options;
mod progress;
mod run;
mod walker;

pub use error::{WalkError, WalkResult};
pub use options::WalkOptions;
pub use progress::{HeartbeatLog, HeartbeatThresholds};
pub use run::RunGroupPlan;
pub use walker::GraphWalker;

// Re-exported so walker callers only need this crate for the common case.
pub use mirrorwalk_core::MirrorNode;
