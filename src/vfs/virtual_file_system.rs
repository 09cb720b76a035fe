use std::sync::Arc;

use parking_lot::Mutex;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, trace, warn};

use super::{LockedNode, Node, NodeRef, NodeType, PathSegments, RootNode};
use crate::filter::{SnapshottingFilter, filter_snapshot};
use crate::snapshot::{
    ContentHash, FileSystemLocationSnapshot, FileType, MissingFileSnapshot, RegularFileSnapshot,
    SnapshotRef,
};
use crate::snapshotter::{SnapshotError, SnapshotProducer};

/// Read-through cache of filesystem snapshots.
///
/// Reading a location that is not cached asks the [`SnapshotProducer`] once
/// and keeps the result until the location is invalidated through
/// [`VirtualFileSystem::update`] or [`VirtualFileSystem::invalidate_all`].
/// Two threads missing on the same location may both produce a snapshot, but
/// only the first one installed is kept and both observe it.
#[derive(Debug)]
pub struct VirtualFileSystem<P> {
    root: RootNode,
    producer: P,
    invalidate_all_lock: Mutex<()>,
}

impl<P: SnapshotProducer> VirtualFileSystem<P> {
    pub fn new(producer: P) -> Self {
        Self {
            root: RootNode::new(),
            producer,
            invalidate_all_lock: Mutex::new(()),
        }
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn read<T>(
        &self,
        location: &str,
        visitor: impl FnOnce(&SnapshotRef) -> T,
    ) -> Result<T, VfsError> {
        let snapshot = self.read_location(location)?;
        Ok(visitor(&snapshot))
    }

    pub fn snapshot(&self, location: &str) -> Result<SnapshotRef, VfsError> {
        self.read_location(location)
    }

    /// Like [`read`](Self::read), but visits the part of the snapshot accepted
    /// by `filter`. Yields `None` when the filtered result has no single root.
    pub fn read_filtered<T>(
        &self,
        location: &str,
        filter: &SnapshottingFilter,
        visitor: impl FnOnce(&SnapshotRef) -> T,
    ) -> Result<Option<T>, VfsError> {
        let unfiltered = self.read_location(location)?;
        if filter.is_empty() {
            return Ok(Some(visitor(&unfiltered)));
        }

        let filtered = filter_snapshot(filter.as_predicate(), &unfiltered).into_location();
        if filtered.is_none() {
            debug!("Filtered snapshot of {} has no single location", location);
        }
        Ok(filtered.map(|snapshot| visitor(&snapshot)))
    }

    /// Visits the content hash of `location` if it is a regular file.
    pub fn read_content_hash<T>(
        &self,
        location: &str,
        visitor: impl FnOnce(ContentHash) -> T,
    ) -> Result<Option<T>, VfsError> {
        let snapshot = self.read_location(location)?;
        Ok(snapshot.as_regular_file().map(|file| visitor(file.hash())))
    }

    /// Evicts every location in `locations`, then runs `action`. Cached
    /// directories above an evicted location lose their snapshot as well.
    ///
    /// Reads that start after this returns never see a snapshot cached before
    /// the call. Reads racing with `action` itself may cache the state from
    /// before `action` finished; callers that need more must serialize their
    /// mutation externally.
    pub fn update<I, S, R>(&self, locations: I, action: impl FnOnce() -> R) -> R
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for location in locations {
            let location = location.as_ref();
            let segments = PathSegments::of(location);
            let Some((name, parents)) = segments.split_last() else {
                warn!("Ignoring invalidation of location without segments: '{}'", location);
                continue;
            };

            if let Some(parent) = self.find_parent_dropping_directories(parents) {
                parent.under_lock(|parent| {
                    if parent.remove_child(name).is_some() {
                        debug!("Invalidated {}", location);
                    }
                });
            }
        }

        action()
    }

    /// Installs a snapshot the caller already knows to be current, replacing
    /// whatever was cached for `location`.
    pub fn seed_known_snapshot(&self, location: &str, snapshot: SnapshotRef) -> Result<(), VfsError> {
        let segments = PathSegments::of(location);
        let (name, parents) = segments
            .split_last()
            .context(InvalidLocationSnafu { location })?;

        let parent = self.find_parent(parents);
        let node = Node::from_snapshot(name, snapshot, &parent);
        parent.replace_child(name, move |_| node, |_| true);
        debug!("Seeded known snapshot for {}", location);
        Ok(())
    }

    pub fn invalidate_all(&self) {
        let _exclusive = self.invalidate_all_lock.lock();
        self.root.clear();
        debug!("Invalidated the whole virtual file system");
    }

    /// Returns the cached snapshot for `location` without producing one.
    pub fn peek(&self, location: &str) -> Option<SnapshotRef> {
        let segments = PathSegments::of(location);
        let (name, parents) = segments.split_last()?;
        self.find_parent_not_creating(parents)?
            .child(name)?
            .snapshot()
            .cloned()
    }

    fn read_location(&self, location: &str) -> Result<SnapshotRef, VfsError> {
        let segments = PathSegments::of(location);
        let (name, parents) = segments
            .split_last()
            .context(InvalidLocationSnafu { location })?;

        let parent = self.find_parent(parents);
        if let Some(snapshot) = parent
            .child(name)
            .and_then(|cached| cached.snapshot().cloned())
        {
            trace!("Cache hit for {}", location);
            return Ok(snapshot);
        }

        debug!("Cache miss for {}", location);
        let produced = self.produce_snapshot(location, name)?;
        let node = Node::from_snapshot(name, produced.clone(), &parent);
        let installed = parent.replace_child(name, move |_| node, Node::is_interior);

        match installed.snapshot() {
            Some(snapshot) => {
                if !Arc::ptr_eq(snapshot, &produced) {
                    trace!("Lost the race for {}, using the installed snapshot", location);
                }
                Ok(snapshot.clone())
            }
            None => Ok(produced),
        }
    }

    fn produce_snapshot(&self, location: &str, name: &str) -> Result<SnapshotRef, VfsError> {
        let stat = self
            .producer
            .stat(location)
            .context(ProducerSnafu { location })?;

        let snapshot: FileSystemLocationSnapshot = match stat.file_type {
            FileType::RegularFile => {
                let hash = self
                    .producer
                    .hash(location, &stat.metadata)
                    .context(ProducerSnafu { location })?;
                RegularFileSnapshot::new(location, name, hash, stat.metadata).into()
            }
            FileType::Missing => MissingFileSnapshot::new(location, name).into(),
            FileType::Directory => self
                .producer
                .snapshot_directory(location)
                .context(ProducerSnafu { location })?
                .into(),
            FileType::Other => return UnsupportedFileTypeSnafu { location }.fail(),
        };

        Ok(Arc::new(snapshot))
    }

    /// Walks to the parent of the final segment, creating placeholders on the way.
    fn find_parent(&self, parents: &[&str]) -> NodeRef {
        parents
            .iter()
            .fold(self.root.node().clone(), |node, segment| {
                node.get_or_create_child(segment, |parent| Node::interior(*segment, parent))
            })
    }

    /// Walks to the parent of the final segment without creating nodes. Every
    /// directory node on the way is swapped for an interior node that keeps its
    /// children, so its recursive snapshot is produced again on the next read.
    fn find_parent_dropping_directories(&self, parents: &[&str]) -> Option<NodeRef> {
        parents
            .iter()
            .try_fold(self.root.node().clone(), |node, segment| {
                let child = node.child(segment)?;
                if child.node_type() != NodeType::Directory {
                    return Some(child);
                }
                node.under_lock(|node| Self::drop_directory_snapshot(node, segment))
            })
    }

    fn drop_directory_snapshot(parent: &LockedNode<'_>, name: &str) -> Option<NodeRef> {
        let current = parent.child(name)?;
        if current.node_type() != NodeType::Directory {
            return Some(current);
        }

        let demoted = Arc::new(current.under_lock(|directory| directory.demoted()));
        parent.insert_child(name, demoted.clone());
        debug!("Dropped directory snapshot of {}", demoted.location());
        Some(demoted)
    }

    fn find_parent_not_creating(&self, parents: &[&str]) -> Option<NodeRef> {
        parents
            .iter()
            .try_fold(self.root.node().clone(), |node, segment| node.child(segment))
    }
}

#[derive(Debug, Snafu)]
pub enum VfsError {
    #[snafu(display("Location '{}' does not contain any path segments", location))]
    InvalidLocation { location: String },
    #[snafu(display("Failed to snapshot {}", location))]
    ProducerError {
        location: String,
        source: SnapshotError,
    },
    #[snafu(display("{} is neither a regular file, a directory nor missing", location))]
    UnsupportedFileType { location: String },
}
