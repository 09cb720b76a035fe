//! Producing snapshots from the real filesystem.
//!
//! The virtual file system only talks to a [`SnapshotProducer`]; the
//! [`DiskSnapshotProducer`] is the implementation that stats, hashes and walks
//! the local disk.

mod disk;
mod exclude_pattern;
mod producer;

pub use disk::DiskSnapshotProducer;
pub use exclude_pattern::ExcludePattern;
pub use producer::{SnapshotError, SnapshotProducer};
