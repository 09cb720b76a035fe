use std::sync::Arc;

use super::SnapshotPredicate;
use crate::snapshot::{DirectorySnapshot, FileSystemLocationSnapshot, FilteredSnapshot, SnapshotRef};

/// Projects `snapshot` onto the entries accepted by `predicate`.
///
/// A rejected directory below the root drops its whole subtree. A rejected
/// root directory dissolves into its accepted children, which then no longer
/// share a common root unless only one of them survives. Subtrees the
/// predicate leaves untouched are shared with the input, not copied.
pub fn filter_snapshot(predicate: &SnapshotPredicate, snapshot: &SnapshotRef) -> FilteredSnapshot {
    let mut relative_path = Vec::new();
    if predicate(&**snapshot, relative_path.as_slice()) {
        return FilteredSnapshot::Location(filter_accepted(predicate, snapshot, &mut relative_path));
    }

    match snapshot.as_directory() {
        Some(directory) => {
            let fragments = directory
                .children()
                .iter()
                .filter_map(|child| filter_child(predicate, child, &mut relative_path))
                .collect();
            FilteredSnapshot::from_fragments(fragments)
        }
        None => FilteredSnapshot::Empty,
    }
}

fn filter_child<'a>(
    predicate: &SnapshotPredicate,
    child: &'a SnapshotRef,
    relative_path: &mut Vec<&'a str>,
) -> Option<SnapshotRef> {
    relative_path.push(child.name());
    let filtered = if predicate(&**child, relative_path.as_slice()) {
        Some(filter_accepted(predicate, child, relative_path))
    } else {
        None
    };
    relative_path.pop();
    filtered
}

/// Filters the contents of an entry that was itself accepted.
fn filter_accepted<'a>(
    predicate: &SnapshotPredicate,
    snapshot: &'a SnapshotRef,
    relative_path: &mut Vec<&'a str>,
) -> SnapshotRef {
    let FileSystemLocationSnapshot::Directory(directory) = &**snapshot else {
        return snapshot.clone();
    };

    let mut unchanged = true;
    let mut kept = Vec::with_capacity(directory.children().len());
    for child in directory.children() {
        match filter_child(predicate, child, relative_path) {
            Some(filtered) => {
                unchanged &= Arc::ptr_eq(&filtered, child);
                kept.push(filtered);
            }
            None => unchanged = false,
        }
    }

    if unchanged {
        snapshot.clone()
    } else {
        Arc::new(DirectorySnapshot::new(directory.absolute_path(), directory.name(), kept).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SnapshottingFilter;
    use crate::snapshot::{ContentHash, FileMetadata, FileType, RegularFileSnapshot};

    fn file(parent: &str, name: &str) -> SnapshotRef {
        Arc::new(
            RegularFileSnapshot::new(
                format!("{parent}/{name}"),
                name,
                ContentHash::of_bytes(name.as_bytes()),
                FileMetadata::default(),
            )
            .into(),
        )
    }

    fn directory(path: &str, children: Vec<SnapshotRef>) -> SnapshotRef {
        let name = path.rsplit('/').next().unwrap_or(path);
        Arc::new(DirectorySnapshot::new(path, name, children).into())
    }

    /// /project
    /// ├── build/out.class
    /// ├── src/Main.java
    /// ├── src/notes.txt
    /// └── README.md
    fn project() -> SnapshotRef {
        directory(
            "/project",
            vec![
                directory("/project/build", vec![file("/project/build", "out.class")]),
                directory(
                    "/project/src",
                    vec![file("/project/src", "Main.java"), file("/project/src", "notes.txt")],
                ),
                file("/project", "README.md"),
            ],
        )
    }

    fn names(snapshot: &SnapshotRef) -> Vec<String> {
        snapshot
            .as_directory()
            .map(|directory| {
                directory
                    .children()
                    .iter()
                    .map(|child| child.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn accepting_everything_returns_the_same_snapshot() {
        let root = project();
        let filter = SnapshottingFilter::new(|_, _| true);

        let filtered = filter_snapshot(filter.as_predicate(), &root);

        match filtered {
            FilteredSnapshot::Location(snapshot) => assert!(Arc::ptr_eq(&snapshot, &root)),
            other => panic!("Expected a location, got {:?}", other),
        }
    }

    #[test]
    fn excluded_directory_drops_its_subtree() {
        let root = project();
        let filter = SnapshottingFilter::excluding_names(["build"]);

        let filtered = filter_snapshot(filter.as_predicate(), &root)
            .into_location()
            .expect("Root directory should survive");

        assert_eq!(names(&filtered), vec!["README.md", "src"]);
        assert_ne!(filtered.hash(), root.hash());
    }

    #[test]
    fn untouched_subtrees_are_shared() {
        let root = project();
        let filter = SnapshottingFilter::excluding_names(["README.md"]);

        let filtered = filter_snapshot(filter.as_predicate(), &root)
            .into_location()
            .expect("Root directory should survive");

        let original_src = root
            .as_directory()
            .and_then(|directory| directory.child("src"))
            .expect("src in original");
        let filtered_src = filtered
            .as_directory()
            .and_then(|directory| directory.child("src"))
            .expect("src in filtered");
        assert!(Arc::ptr_eq(original_src, filtered_src));
    }

    #[test]
    fn predicate_sees_relative_paths() {
        let root = project();
        let filter = SnapshottingFilter::new(|snapshot, relative_path| {
            snapshot.file_type() == FileType::Directory
                || relative_path.first() == Some(&"src") && relative_path.len() == 2
        });

        let filtered = filter_snapshot(filter.as_predicate(), &root)
            .into_location()
            .expect("Root directory should survive");

        assert_eq!(names(&filtered), vec!["build", "src"]);
        let build = filtered
            .as_directory()
            .and_then(|directory| directory.child("build"))
            .expect("build directory");
        assert!(names(build).is_empty());
    }

    #[test]
    fn rejected_file_root_is_empty() {
        let root = file("/project", "README.md");
        let filter = SnapshottingFilter::new(|_, _| false);

        assert_eq!(filter_snapshot(filter.as_predicate(), &root), FilteredSnapshot::Empty);
    }

    #[test]
    fn rejected_directory_root_dissolves_into_fragments() {
        let root = project();
        let filter = SnapshottingFilter::new(|_, relative_path| !relative_path.is_empty());

        match filter_snapshot(filter.as_predicate(), &root) {
            FilteredSnapshot::Fragments(fragments) => assert_eq!(fragments.len(), 3),
            other => panic!("Expected fragments, got {:?}", other),
        }
    }

    #[test]
    fn rejected_directory_root_with_single_survivor_is_a_location() {
        let root = project();
        let filter = SnapshottingFilter::new(|_, relative_path| {
            relative_path.first().is_some_and(|name| *name == "src")
        });

        let filtered = filter_snapshot(filter.as_predicate(), &root)
            .into_location()
            .expect("Single surviving child is a location");

        assert_eq!(filtered.name(), "src");
    }
}
