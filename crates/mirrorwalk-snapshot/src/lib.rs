//! Snapshot codec for mirrorwalk.
//!
//! Converts mirror trees to and from a self-describing UTF-8 snapshot
//! format built on JSON. Containers carry a metadata sidecar with their
//! display label and an explicit key-order list, so mappings with
//! non-string keys survive a round trip with key identity and iteration
//! order intact.
//!
//! Subtrees flagged as slow during the walk select chunked encoding:
//! each slow child is encoded independently and spliced into its parent's
//! byte stream, bounding peak memory. Any chunk failure falls back to
//! one-shot whole-tree encoding.
//!
//! # Example
//!
//! ```
//! use mirrorwalk_core::{Key, Metadata, MirrorNode, Scalar};
//! use mirrorwalk_snapshot::{decode, encode};
//!
//! let tree = MirrorNode::Mapping {
//!     entries: vec![(Key::Int(1), MirrorNode::Scalar(Scalar::Str("one".into())))],
//!     meta: Metadata {
//!         key_order: vec![Key::Int(1)],
//!         ..Metadata::labeled("Lookup")
//!     },
//! };
//! let text = encode(&tree).unwrap();
//! assert_eq!(decode(&text).unwrap(), tree);
//! ```

mod codec;
mod error;
mod writer;

pub use codec::{decode, encode, encode_chunked, encode_pretty};
pub use error::{SnapshotError, SnapshotResult};
pub use writer::{read_snapshot, write_snapshot};
