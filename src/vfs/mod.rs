//! In-memory cache of filesystem snapshots, shared by concurrent readers.
//!
//! The cache is a tree keyed by path segment. Intermediate segments that have
//! not been resolved yet are interior placeholders; resolved locations carry
//! the snapshot produced for them. Resolved nodes are never changed in place,
//! an update replaces the node under its name.

mod node;
mod path_segments;
mod virtual_file_system;

#[cfg(test)]
mod test_support;

pub use node::{LockedNode, Node, NodeRef, NodeType, RootNode};
pub use path_segments::{PathSegments, child_location};
pub use virtual_file_system::{VfsError, VirtualFileSystem};
