use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{PathSegments, child_location};
use crate::snapshot::{
    ContentHash, DirectorySnapshot, FileMetadata, FileMetadataSnapshot, FileType,
    RegularFileSnapshot, SnapshotRef,
};
use crate::snapshotter::{SnapshotError, SnapshotProducer};

#[derive(Debug, Clone, Copy)]
enum FakeEntry {
    File(u64),
    Directory,
    Other,
}

/// In-memory producer that counts how often the cache consults it.
#[derive(Debug, Default)]
pub struct FakeSnapshotProducer {
    entries: Mutex<BTreeMap<String, FakeEntry>>,
    failing: Mutex<HashSet<String>>,
    walk_delay: Duration,
    stat_calls: AtomicUsize,
    hash_calls: AtomicUsize,
    walk_calls: AtomicUsize,
}

impl FakeSnapshotProducer {
    pub fn with_walk_delay(mut self, delay: Duration) -> Self {
        self.walk_delay = delay;
        self
    }

    pub fn set_file(&self, location: &str, hash: u64) {
        self.entries
            .lock()
            .insert(location.to_string(), FakeEntry::File(hash));
    }

    pub fn set_directory(&self, location: &str) {
        self.entries
            .lock()
            .insert(location.to_string(), FakeEntry::Directory);
    }

    pub fn set_other(&self, location: &str) {
        self.entries
            .lock()
            .insert(location.to_string(), FakeEntry::Other);
    }

    pub fn fail_on(&self, location: &str) {
        self.failing.lock().insert(location.to_string());
    }

    pub fn stop_failing(&self, location: &str) {
        self.failing.lock().remove(location);
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }

    pub fn walk_calls(&self) -> usize {
        self.walk_calls.load(Ordering::SeqCst)
    }

    fn io_error(location: &str) -> std::io::Error {
        std::io::Error::new(ErrorKind::PermissionDenied, format!("{location} is failing"))
    }

    fn name_of(location: &str) -> String {
        PathSegments::of(location)
            .split_last()
            .map(|(name, _)| name.to_string())
            .unwrap_or_default()
    }

    fn build_directory(
        entries: &BTreeMap<String, FakeEntry>,
        location: &str,
    ) -> DirectorySnapshot {
        let children = entries
            .iter()
            .filter(|(candidate, _)| {
                candidate.len() > location.len()
                    && child_location(location, &Self::name_of(candidate)) == **candidate
            })
            .filter_map(|(child, entry)| {
                let name = Self::name_of(child);
                let snapshot: SnapshotRef = match entry {
                    FakeEntry::File(hash) => Arc::new(
                        RegularFileSnapshot::new(
                            child.as_str(),
                            name,
                            ContentHash::from_u64(*hash),
                            FileMetadata::default(),
                        )
                        .into(),
                    ),
                    FakeEntry::Directory => Arc::new(Self::build_directory(entries, child).into()),
                    FakeEntry::Other => return None,
                };
                Some(snapshot)
            })
            .collect();

        DirectorySnapshot::new(location, Self::name_of(location), children)
    }
}

impl SnapshotProducer for FakeSnapshotProducer {
    fn stat(&self, location: &str) -> Result<FileMetadataSnapshot, SnapshotError> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(location) {
            return Err(SnapshotError::StatError {
                path: location.into(),
                source: Self::io_error(location),
            });
        }

        let file_type = match self.entries.lock().get(location) {
            Some(FakeEntry::File(_)) => FileType::RegularFile,
            Some(FakeEntry::Directory) => FileType::Directory,
            Some(FakeEntry::Other) => FileType::Other,
            None => return Ok(FileMetadataSnapshot::missing()),
        };
        Ok(FileMetadataSnapshot::new(file_type, FileMetadata::default()))
    }

    fn hash(&self, location: &str, _metadata: &FileMetadata) -> Result<ContentHash, SnapshotError> {
        self.hash_calls.fetch_add(1, Ordering::SeqCst);
        match self.entries.lock().get(location) {
            Some(FakeEntry::File(hash)) => Ok(ContentHash::from_u64(*hash)),
            _ => Err(SnapshotError::HashError {
                path: location.into(),
                source: std::io::Error::from(ErrorKind::NotFound),
            }),
        }
    }

    fn snapshot_directory(&self, location: &str) -> Result<DirectorySnapshot, SnapshotError> {
        self.walk_calls.fetch_add(1, Ordering::SeqCst);
        if !self.walk_delay.is_zero() {
            thread::sleep(self.walk_delay);
        }

        let entries = self.entries.lock().clone();
        if !matches!(entries.get(location), Some(FakeEntry::Directory)) {
            return Err(SnapshotError::WalkError {
                path: location.into(),
                source: std::io::Error::from(ErrorKind::NotADirectory),
            });
        }
        Ok(Self::build_directory(&entries, location))
    }
}
