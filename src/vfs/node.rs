use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{RwLock, RwLockWriteGuard};

use super::child_location;
use crate::snapshot::{FileSystemLocationSnapshot, SnapshotRef};

pub type NodeRef = Arc<Node>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Interior,
    File,
    Directory,
    Missing,
}

/// What a node knows about its own location.
#[derive(Debug, Clone)]
pub(crate) enum NodeContent {
    /// Placeholder for a segment that only routes to descendants.
    Interior,
    File(SnapshotRef),
    Directory(SnapshotRef),
    Missing(SnapshotRef),
}

impl NodeContent {
    fn of_snapshot(snapshot: SnapshotRef) -> Self {
        match snapshot.as_ref() {
            FileSystemLocationSnapshot::RegularFile(_) => Self::File(snapshot),
            FileSystemLocationSnapshot::Directory(_) => Self::Directory(snapshot),
            FileSystemLocationSnapshot::Missing(_) => Self::Missing(snapshot),
        }
    }

    fn node_type(&self) -> NodeType {
        match self {
            Self::Interior => NodeType::Interior,
            Self::File(_) => NodeType::File,
            Self::Directory(_) => NodeType::Directory,
            Self::Missing(_) => NodeType::Missing,
        }
    }

    fn snapshot(&self) -> Option<&SnapshotRef> {
        match self {
            Self::Interior => None,
            Self::File(snapshot) | Self::Directory(snapshot) | Self::Missing(snapshot) => {
                Some(snapshot)
            }
        }
    }
}

/// An element of the cache tree.
///
/// The content is fixed at construction; only the child map changes. Child
/// operations take the structure lock shared, so they run concurrently with
/// each other (the map keeps them atomic per name), while [`Node::under_lock`]
/// takes it exclusively.
#[derive(Debug)]
pub struct Node {
    name: Option<String>,
    /// Location of the parent node, used to rebuild this node's location.
    parent_location: Option<String>,
    content: NodeContent,
    children: DashMap<String, NodeRef>,
    structure: RwLock<()>,
}

impl Node {
    fn new(name: Option<String>, parent_location: Option<String>, content: NodeContent) -> Self {
        Self {
            name,
            parent_location,
            content,
            children: DashMap::new(),
            structure: RwLock::new(()),
        }
    }

    pub fn interior(name: impl Into<String>, parent: &Node) -> Self {
        Self::new(Some(name.into()), Some(parent.location()), NodeContent::Interior)
    }

    /// Builds the node for `snapshot` under `parent`. A directory snapshot
    /// brings its whole subtree along, so the node's children always match the
    /// walk that produced them.
    pub fn from_snapshot(name: impl Into<String>, snapshot: SnapshotRef, parent: &Node) -> Self {
        Self::materialize(name.into(), parent.location(), snapshot)
    }

    fn materialize(name: String, parent_location: String, snapshot: SnapshotRef) -> Self {
        let node = Self::new(
            Some(name),
            Some(parent_location),
            NodeContent::of_snapshot(snapshot.clone()),
        );

        if let Some(directory) = snapshot.as_directory() {
            let location = node.location();
            for child in directory.children() {
                let child_node =
                    Self::materialize(child.name().to_string(), location.clone(), child.clone());
                node.children
                    .insert(child.name().to_string(), Arc::new(child_node));
            }
        }

        node
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn location(&self) -> String {
        match (&self.parent_location, &self.name) {
            (Some(parent), Some(name)) => child_location(parent, name),
            _ => String::new(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.content.node_type()
    }

    pub fn is_interior(&self) -> bool {
        matches!(self.content, NodeContent::Interior)
    }

    pub fn snapshot(&self) -> Option<&SnapshotRef> {
        self.content.snapshot()
    }

    pub fn child(&self, name: &str) -> Option<NodeRef> {
        self.children.get(name).map(|child| child.value().clone())
    }

    /// Returns the child called `name`, installing the node built by `factory`
    /// if there is none. When two callers race on the same name only one
    /// factory result is ever installed and both get that node back.
    pub fn get_or_create_child(&self, name: &str, factory: impl FnOnce(&Node) -> Node) -> NodeRef {
        if let Some(child) = self.child(name) {
            return child;
        }

        let _shared = self.structure.read();
        self.children
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(factory(self)))
            .value()
            .clone()
    }

    /// Installs the node built by `factory` under `name` if there is no child
    /// yet or `should_replace` accepts the current one; otherwise leaves the
    /// current child in place. Returns whichever node is installed afterwards.
    pub fn replace_child(
        &self,
        name: &str,
        factory: impl FnOnce(&Node) -> Node,
        should_replace: impl FnOnce(&Node) -> bool,
    ) -> NodeRef {
        let _shared = self.structure.read();
        match self.children.entry(name.to_string()) {
            Entry::Occupied(mut current) => {
                if should_replace(current.get()) {
                    let replacement = Arc::new(factory(self));
                    current.insert(replacement.clone());
                    replacement
                } else {
                    current.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let created = Arc::new(factory(self));
                vacant.insert(created.clone());
                created
            }
        }
    }

    pub fn remove_child(&self, name: &str) -> Option<NodeRef> {
        let _shared = self.structure.read();
        self.children.remove(name).map(|(_, child)| child)
    }

    /// Runs `action` with every other structural change to this node's
    /// children held off until it returns.
    pub fn under_lock<R>(&self, action: impl FnOnce(&LockedNode<'_>) -> R) -> R {
        let locked = LockedNode {
            node: self,
            _exclusive: self.structure.write(),
        };
        action(&locked)
    }

    /// Point-in-time copy of the children.
    pub fn children(&self) -> Vec<(String, NodeRef)> {
        self.children
            .iter()
            .map(|child| (child.key().clone(), child.value().clone()))
            .collect()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Exclusive access to a node's children, handed out by [`Node::under_lock`].
pub struct LockedNode<'a> {
    node: &'a Node,
    _exclusive: RwLockWriteGuard<'a, ()>,
}

impl LockedNode<'_> {
    pub fn child(&self, name: &str) -> Option<NodeRef> {
        self.node.child(name)
    }

    pub fn remove_child(&self, name: &str) -> Option<NodeRef> {
        self.node.children.remove(name).map(|(_, child)| child)
    }

    pub fn insert_child(&self, name: &str, child: NodeRef) {
        self.node.children.insert(name.to_string(), child);
    }

    /// Interior node at the same location that keeps the current children.
    pub fn demoted(&self) -> Node {
        let demoted = Node::new(
            self.node.name.clone(),
            self.node.parent_location.clone(),
            NodeContent::Interior,
        );
        for child in self.node.children.iter() {
            demoted
                .children
                .insert(child.key().clone(), child.value().clone());
        }
        demoted
    }

    pub fn clear(&self) {
        self.node.children.clear();
    }
}

/// The nameless, parentless top of the tree.
#[derive(Debug)]
pub struct RootNode {
    node: NodeRef,
}

impl RootNode {
    pub fn new() -> Self {
        Self {
            node: Arc::new(Node::new(None, None, NodeContent::Interior)),
        }
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Drops the entire tree.
    pub fn clear(&self) {
        self.node.under_lock(|root| root.clear());
    }
}

impl Default for RootNode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ContentHash, DirectorySnapshot, FileMetadata, RegularFileSnapshot};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn file_snapshot(location: &str, name: &str) -> SnapshotRef {
        Arc::new(
            RegularFileSnapshot::new(
                location,
                name,
                ContentHash::of_bytes(location.as_bytes()),
                FileMetadata::default(),
            )
            .into(),
        )
    }

    #[test]
    fn get_or_create_returns_existing_child() {
        let root = RootNode::new();
        let first = root
            .node()
            .get_or_create_child("a", |parent| Node::interior("a", parent));
        let second = root
            .node()
            .get_or_create_child("a", |_| panic!("Factory must not run for existing child"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(root.node().child_count(), 1);
    }

    #[test]
    fn racing_get_or_create_installs_one_child() {
        let root = RootNode::new();
        let factory_calls = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let installed = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        root.node().get_or_create_child("contended", |parent| {
                            factory_calls.fetch_add(1, Ordering::SeqCst);
                            Node::interior("contended", parent)
                        })
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("Thread panicked"))
                .collect::<Vec<_>>()
        });

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert!(installed.iter().all(|node| Arc::ptr_eq(node, &installed[0])));
        assert_eq!(root.node().child_count(), 1);
    }

    #[test]
    fn replace_child_respects_predicate() {
        let root = RootNode::new();
        let node = root.node();
        let placeholder = node.get_or_create_child("f", |parent| Node::interior("f", parent));
        assert!(placeholder.is_interior());

        let resolved = node.replace_child(
            "f",
            |parent| Node::from_snapshot("f", file_snapshot("/f", "f"), parent),
            Node::is_interior,
        );
        assert_eq!(resolved.node_type(), NodeType::File);

        let kept = node.replace_child(
            "f",
            |_| panic!("Resolved child must not be replaced"),
            Node::is_interior,
        );
        assert!(Arc::ptr_eq(&resolved, &kept));

        let forced = node.replace_child(
            "f",
            |parent| Node::from_snapshot("f", file_snapshot("/f", "other"), parent),
            |_| true,
        );
        assert!(!Arc::ptr_eq(&resolved, &forced));
        assert!(Arc::ptr_eq(&forced, &node.child("f").expect("Child installed")));
    }

    #[test]
    fn replace_child_installs_when_absent() {
        let root = RootNode::new();

        let installed = root.node().replace_child(
            "new",
            |parent| Node::interior("new", parent),
            |_| panic!("Predicate is only consulted for existing children"),
        );

        assert!(Arc::ptr_eq(
            &installed,
            &root.node().child("new").expect("Child installed")
        ));
    }

    #[test]
    fn remove_child_is_a_noop_when_absent() {
        let root = RootNode::new();
        root.node()
            .get_or_create_child("a", |parent| Node::interior("a", parent));

        assert!(root.node().remove_child("missing").is_none());
        assert!(root.node().remove_child("a").is_some());
        assert!(root.node().remove_child("a").is_none());
        assert_eq!(root.node().child_count(), 0);
    }

    #[test]
    fn under_lock_holds_off_structural_changes() {
        let root = RootNode::new();
        let node = root.node().clone();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let locker_node = node.clone();
        let locker = thread::spawn(move || {
            locker_node.under_lock(|locked| {
                entered_tx.send(()).expect("Receiver alive");
                release_rx.recv().expect("Sender alive");
                locked.child("late").is_none()
            })
        });

        entered_rx.recv().expect("Locker entered");
        let writer_node = node.clone();
        let writer = thread::spawn(move || {
            writer_node.get_or_create_child("late", |parent| Node::interior("late", parent));
        });
        thread::sleep(std::time::Duration::from_millis(20));
        release_tx.send(()).expect("Locker alive");

        assert!(locker.join().expect("Locker panicked"));
        writer.join().expect("Writer panicked");
        assert!(node.child("late").is_some());
    }

    #[test]
    fn directory_nodes_materialize_their_subtree() {
        let root = RootNode::new();
        let nested = Arc::new(
            DirectorySnapshot::new(
                "/d/sub",
                "sub",
                vec![file_snapshot("/d/sub/leaf.txt", "leaf.txt")],
            )
            .into(),
        );
        let directory = Arc::new(
            DirectorySnapshot::new("/d", "d", vec![nested, file_snapshot("/d/top.txt", "top.txt")])
                .into(),
        );

        let node = root.node().replace_child(
            "d",
            |parent| Node::from_snapshot("d", directory, parent),
            |_| true,
        );

        assert_eq!(node.node_type(), NodeType::Directory);
        assert_eq!(node.child_count(), 2);
        let leaf = node
            .child("sub")
            .and_then(|sub| sub.child("leaf.txt"))
            .expect("Leaf node materialized");
        assert_eq!(leaf.node_type(), NodeType::File);
        assert_eq!(
            leaf.snapshot().map(|snapshot| snapshot.absolute_path()),
            Some("/d/sub/leaf.txt")
        );
    }

    #[test]
    fn demoted_directory_keeps_its_children() {
        let root = RootNode::new();
        let directory = Arc::new(
            DirectorySnapshot::new(
                "/d",
                "d",
                vec![
                    file_snapshot("/d/one.txt", "one.txt"),
                    file_snapshot("/d/two.txt", "two.txt"),
                ],
            )
            .into(),
        );
        let node = root.node().replace_child(
            "d",
            |parent| Node::from_snapshot("d", directory, parent),
            |_| true,
        );

        let demoted = node.under_lock(|locked| locked.demoted());

        assert!(demoted.is_interior());
        assert!(demoted.snapshot().is_none());
        assert_eq!(demoted.location(), node.location());
        assert_eq!(demoted.child_count(), 2);
        assert!(Arc::ptr_eq(
            &demoted.child("one.txt").expect("Child kept"),
            &node.child("one.txt").expect("Original child")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn locations_are_rebuilt_from_parents() {
        let root = RootNode::new();
        let a = root
            .node()
            .get_or_create_child("a", |parent| Node::interior("a", parent));
        let b = a.get_or_create_child("b", |parent| Node::interior("b", parent));

        assert_eq!(root.node().location(), "");
        assert_eq!(a.location(), "/a");
        assert_eq!(b.location(), "/a/b");
        assert_eq!(b.name(), Some("b"));
    }

    #[test]
    fn root_clear_drops_everything() {
        let root = RootNode::new();
        for name in ["a", "b", "c"] {
            root.node()
                .get_or_create_child(name, |parent| Node::interior(name, parent));
        }

        root.clear();

        assert_eq!(root.node().child_count(), 0);
        assert!(root.node().children().is_empty());
    }
}
