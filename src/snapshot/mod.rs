//! Immutable descriptions of filesystem locations.
//!
//! A snapshot records what a location looked like at the moment it was
//! observed: a regular file with its content hash, a directory with its
//! complete recursive contents, or the fact that nothing existed there.

mod content_hash;
mod file_metadata;
mod location_snapshot;

pub use content_hash::{ContentHash, ContentHasher};
pub use file_metadata::{FileMetadata, FileMetadataSnapshot, FileType};
pub use location_snapshot::{
    DirectorySnapshot, FileSystemLocationSnapshot, FilteredSnapshot, MissingFileSnapshot,
    RegularFileSnapshot, SnapshotRef,
};
