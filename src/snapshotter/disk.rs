use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use snafu::ResultExt;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::producer::{HashSnafu, StatSnafu};
use super::{ExcludePattern, SnapshotError, SnapshotProducer};
use crate::ext::BestEffortPathExt;
use crate::snapshot::{
    ContentHash, ContentHasher, DirectorySnapshot, FileMetadata, FileMetadataSnapshot,
    FileSystemLocationSnapshot, MissingFileSnapshot, RegularFileSnapshot, SnapshotRef,
};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Read buffer size for a file of `length` bytes, without truncating lengths
/// that do not fit in `usize`.
fn hash_buffer_capacity(length: u64) -> usize {
    usize::try_from(length)
        .unwrap_or(usize::MAX)
        .clamp(1, HASH_BUFFER_SIZE)
}

/// Snapshots the local disk. Directory walks skip entries whose name matches
/// one of the default excludes; a location requested explicitly is always
/// stat-ed, excluded name or not.
#[derive(Debug, Clone, Default)]
pub struct DiskSnapshotProducer {
    default_excludes: Vec<ExcludePattern>,
}

impl DiskSnapshotProducer {
    pub fn new<I, S>(default_excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            default_excludes: default_excludes
                .into_iter()
                .map(ExcludePattern::new)
                .collect(),
        }
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.default_excludes
            .iter()
            .any(|pattern| pattern.matches(name))
    }

    /// Builds the snapshot of the directory at `path` from a single sorted,
    /// pre-order walk. Symlinks are followed; a link back into one of its own
    /// ancestors is left out.
    fn walk_directory(
        &self,
        path: &Path,
        location: String,
        name: String,
    ) -> Result<DirectorySnapshot, SnapshotError> {
        let mut root = PendingDirectory::new(location, name);
        let mut open_directories: Vec<PendingDirectory> = Vec::new();

        let walker = WalkDir::new(path)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !self.is_excluded(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    if let Some(ancestor) = error.loop_ancestor() {
                        debug!(
                            "Skipping symlink loop back to {}",
                            ancestor.best_effort_path_display()
                        );
                        continue;
                    }
                    let vanished = error.depth() > 0
                        && error
                            .io_error()
                            .is_some_and(|io| io.kind() == ErrorKind::NotFound);
                    let missing = error.path().filter(|_| vanished).map(Path::to_path_buf);
                    let Some(missing) = missing else {
                        return Err(walk_error(error, path));
                    };
                    // Dangling link, or removed between listing and stat-ing
                    close_directories(&mut root, &mut open_directories, error.depth());
                    let child_location = missing.to_string_lossy().into_owned();
                    let child_name = file_name_of(&missing);
                    parent_of(&mut root, &mut open_directories).push(
                        MissingFileSnapshot::new(child_location, child_name).into(),
                    );
                    continue;
                }
            };

            close_directories(&mut root, &mut open_directories, entry.depth());
            let child_location = entry.path().to_string_lossy().into_owned();
            let child_name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                open_directories.push(PendingDirectory::new(child_location, child_name));
            } else if file_type.is_file() {
                let metadata = entry.metadata().map_err(|error| walk_error(error, path))?;
                let metadata = FileMetadata::from(&metadata);
                let hash = self.hash(&child_location, &metadata)?;
                parent_of(&mut root, &mut open_directories).push(
                    RegularFileSnapshot::new(child_location, child_name, hash, metadata).into(),
                );
            } else {
                debug!("Skipping unsupported entry {}", child_location);
            }
        }

        close_directories(&mut root, &mut open_directories, 1);
        trace!("Walked {} with {} entries", root.location, root.children.len());
        Ok(root.finish())
    }
}

/// A directory whose entries are still being collected.
struct PendingDirectory {
    location: String,
    name: String,
    children: Vec<SnapshotRef>,
}

impl PendingDirectory {
    fn new(location: String, name: String) -> Self {
        Self {
            location,
            name,
            children: Vec::new(),
        }
    }

    fn push(&mut self, child: FileSystemLocationSnapshot) {
        self.children.push(Arc::new(child));
    }

    fn finish(self) -> DirectorySnapshot {
        DirectorySnapshot::new(self.location, self.name, self.children)
    }
}

fn parent_of<'a>(
    root: &'a mut PendingDirectory,
    open_directories: &'a mut [PendingDirectory],
) -> &'a mut PendingDirectory {
    match open_directories.last_mut() {
        Some(parent) => parent,
        None => root,
    }
}

/// Finishes open directories until an entry at `depth` would be a direct
/// child of the innermost one still open.
fn close_directories(
    root: &mut PendingDirectory,
    open_directories: &mut Vec<PendingDirectory>,
    depth: usize,
) {
    while open_directories.len() >= depth {
        let Some(finished) = open_directories.pop() else {
            break;
        };
        parent_of(root, open_directories).push(finished.finish().into());
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn walk_error(error: walkdir::Error, fallback: &Path) -> SnapshotError {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    SnapshotError::WalkError {
        path,
        source: io::Error::from(error),
    }
}

impl SnapshotProducer for DiskSnapshotProducer {
    fn stat(&self, location: &str) -> Result<FileMetadataSnapshot, SnapshotError> {
        let path = Path::new(location);
        match fs::metadata(path) {
            Ok(metadata) => Ok(FileMetadataSnapshot::from(&metadata)),
            Err(error) if matches!(error.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(FileMetadataSnapshot::missing())
            }
            Err(error) => Err(error).context(StatSnafu {
                path: path.to_path_buf(),
            }),
        }
    }

    fn hash(&self, location: &str, metadata: &FileMetadata) -> Result<ContentHash, SnapshotError> {
        let path = Path::new(location);
        let mut file = File::open(path).context(HashSnafu {
            path: path.to_path_buf(),
        })?;

        let mut hasher = ContentHasher::new();
        let mut buffer = vec![0u8; hash_buffer_capacity(metadata.length)];
        loop {
            let read = file.read(&mut buffer).context(HashSnafu {
                path: path.to_path_buf(),
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hasher.finish())
    }

    fn snapshot_directory(&self, location: &str) -> Result<DirectorySnapshot, SnapshotError> {
        debug!("Walking directory {}", location);
        let path = Path::new(location);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.to_string());

        self.walk_directory(path, location.to_string(), name)
    }
}
