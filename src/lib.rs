//! Concurrent in-memory cache of filesystem snapshots for incremental builds.
//!
//! [`vfs::VirtualFileSystem`] is the entry point: it resolves locations to
//! [`snapshot::FileSystemLocationSnapshot`]s through a
//! [`snapshotter::SnapshotProducer`], keeps them until told that a location
//! changed, and serves filtered views through [`filter::SnapshottingFilter`].

pub mod config;
pub mod ext;
pub mod filter;
pub mod snapshot;
pub mod snapshotter;
pub mod vfs;
