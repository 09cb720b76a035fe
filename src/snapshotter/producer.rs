use std::path::PathBuf;

use snafu::Snafu;

use crate::ext::BestEffortPathExt;
use crate::snapshot::{ContentHash, DirectorySnapshot, FileMetadata, FileMetadataSnapshot};

/// Source of truth consulted by the cache on every miss.
///
/// Implementations are shared between all threads reading through the cache
/// and may be called concurrently for the same location.
pub trait SnapshotProducer: Send + Sync {
    /// Reports what kind of entry lives at `location`. A location that does not
    /// exist is reported as [`FileType::Missing`](crate::snapshot::FileType::Missing),
    /// not as an error.
    fn stat(&self, location: &str) -> Result<FileMetadataSnapshot, SnapshotError>;

    fn hash(&self, location: &str, metadata: &FileMetadata) -> Result<ContentHash, SnapshotError>;

    /// Walks the directory at `location` recursively.
    fn snapshot_directory(&self, location: &str) -> Result<DirectorySnapshot, SnapshotError>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SnapshotError {
    #[snafu(display("Failed to stat {}", path.best_effort_path_display()))]
    StatError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to hash the content of {}", path.best_effort_path_display()))]
    HashError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to walk the directory {}", path.best_effort_path_display()))]
    WalkError {
        path: PathBuf,
        source: std::io::Error,
    },
}
