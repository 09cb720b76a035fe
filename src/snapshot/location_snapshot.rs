use std::sync::Arc;

use super::{ContentHash, ContentHasher, FileMetadata, FileType};

/// Shared handle to an immutable snapshot.
pub type SnapshotRef = Arc<FileSystemLocationSnapshot>;

/// Hash reported for every location that did not exist when it was observed.
const MISSING_FILE_SIGNATURE: ContentHash = ContentHash::from_u64(0x4d49_5353_494e_4746);

const REGULAR_FILE_TAG: u8 = 0;
const DIRECTORY_TAG: u8 = 1;
const MISSING_TAG: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularFileSnapshot {
    absolute_path: String,
    name: String,
    hash: ContentHash,
    metadata: FileMetadata,
}

impl RegularFileSnapshot {
    pub fn new(
        absolute_path: impl Into<String>,
        name: impl Into<String>,
        hash: ContentHash,
        metadata: FileMetadata,
    ) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            name: name.into(),
            hash,
            metadata,
        }
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFileSnapshot {
    absolute_path: String,
    name: String,
}

impl MissingFileSnapshot {
    pub fn new(absolute_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            name: name.into(),
        }
    }
}

/// A complete, recursive snapshot of a directory.
///
/// Children are kept sorted by name and the directory hash is derived from
/// the children's names, kinds and hashes, so two walks of identical trees
/// produce equal snapshots regardless of the order the OS listed them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    absolute_path: String,
    name: String,
    hash: ContentHash,
    children: Vec<SnapshotRef>,
}

impl DirectorySnapshot {
    pub fn new(
        absolute_path: impl Into<String>,
        name: impl Into<String>,
        mut children: Vec<SnapshotRef>,
    ) -> Self {
        children.sort_by(|left, right| left.name().cmp(right.name()));

        let mut hasher = ContentHasher::new();
        for child in &children {
            hasher.update_tag(match child.file_type() {
                FileType::Directory => DIRECTORY_TAG,
                FileType::Missing => MISSING_TAG,
                _ => REGULAR_FILE_TAG,
            });
            hasher.update_str(child.name());
            hasher.update_hash(child.hash());
        }

        Self {
            absolute_path: absolute_path.into(),
            name: name.into(),
            hash: hasher.finish(),
            children,
        }
    }

    pub fn absolute_path(&self) -> &str {
        &self.absolute_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn children(&self) -> &[SnapshotRef] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&SnapshotRef> {
        self.children
            .binary_search_by(|child| child.name().cmp(name))
            .ok()
            .map(|index| &self.children[index])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSystemLocationSnapshot {
    RegularFile(RegularFileSnapshot),
    Directory(DirectorySnapshot),
    Missing(MissingFileSnapshot),
}

impl FileSystemLocationSnapshot {
    pub fn absolute_path(&self) -> &str {
        match self {
            Self::RegularFile(file) => &file.absolute_path,
            Self::Directory(directory) => &directory.absolute_path,
            Self::Missing(missing) => &missing.absolute_path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::RegularFile(file) => &file.name,
            Self::Directory(directory) => &directory.name,
            Self::Missing(missing) => &missing.name,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Self::RegularFile(_) => FileType::RegularFile,
            Self::Directory(_) => FileType::Directory,
            Self::Missing(_) => FileType::Missing,
        }
    }

    pub fn hash(&self) -> ContentHash {
        match self {
            Self::RegularFile(file) => file.hash,
            Self::Directory(directory) => directory.hash,
            Self::Missing(_) => MISSING_FILE_SIGNATURE,
        }
    }

    pub fn as_regular_file(&self) -> Option<&RegularFileSnapshot> {
        match self {
            Self::RegularFile(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectorySnapshot> {
        match self {
            Self::Directory(directory) => Some(directory),
            _ => None,
        }
    }
}

impl From<RegularFileSnapshot> for FileSystemLocationSnapshot {
    fn from(snapshot: RegularFileSnapshot) -> Self {
        Self::RegularFile(snapshot)
    }
}

impl From<DirectorySnapshot> for FileSystemLocationSnapshot {
    fn from(snapshot: DirectorySnapshot) -> Self {
        Self::Directory(snapshot)
    }
}

impl From<MissingFileSnapshot> for FileSystemLocationSnapshot {
    fn from(snapshot: MissingFileSnapshot) -> Self {
        Self::Missing(snapshot)
    }
}

/// Outcome of projecting a snapshot through a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilteredSnapshot {
    Empty,
    Location(SnapshotRef),
    /// The filter split the snapshot into disjoint pieces with no common root.
    Fragments(Vec<SnapshotRef>),
}

impl FilteredSnapshot {
    pub fn from_fragments(mut fragments: Vec<SnapshotRef>) -> Self {
        match fragments.len() {
            0 => Self::Empty,
            1 => fragments
                .pop()
                .map(Self::Location)
                .unwrap_or(Self::Empty),
            _ => Self::Fragments(fragments),
        }
    }

    /// Returns the snapshot only when the result is rooted at a single location.
    pub fn into_location(self) -> Option<SnapshotRef> {
        match self {
            Self::Location(snapshot) => Some(snapshot),
            Self::Empty | Self::Fragments(_) => None,
        }
    }
}
