use std::fs::Metadata;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    RegularFile,
    Directory,
    Missing,
    /// Sockets, devices, fifos and anything else that is neither a file nor a directory.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileMetadata {
    pub length: u64,
    pub last_modified: Option<SystemTime>,
}

impl From<&Metadata> for FileMetadata {
    fn from(metadata: &Metadata) -> Self {
        Self {
            length: metadata.len(),
            last_modified: metadata.modified().ok(),
        }
    }
}

/// Result of a single `stat` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadataSnapshot {
    pub file_type: FileType,
    pub metadata: FileMetadata,
}

impl FileMetadataSnapshot {
    pub fn new(file_type: FileType, metadata: FileMetadata) -> Self {
        Self {
            file_type,
            metadata,
        }
    }

    pub fn missing() -> Self {
        Self::new(FileType::Missing, FileMetadata::default())
    }
}

impl From<&Metadata> for FileMetadataSnapshot {
    fn from(metadata: &Metadata) -> Self {
        let file_type = if metadata.is_file() {
            FileType::RegularFile
        } else if metadata.is_dir() {
            FileType::Directory
        } else {
            FileType::Other
        };
        Self::new(file_type, FileMetadata::from(metadata))
    }
}
