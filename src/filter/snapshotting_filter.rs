use std::fmt;

use crate::snapshot::FileSystemLocationSnapshot;
use crate::snapshotter::ExcludePattern;

/// Decides whether an entry is part of a filtered snapshot. Receives the entry
/// and its path segments relative to the snapshot root being filtered; the
/// root itself has an empty relative path.
pub type SnapshotPredicate = dyn Fn(&FileSystemLocationSnapshot, &[&str]) -> bool + Send + Sync;

fn accept_all(_snapshot: &FileSystemLocationSnapshot, _relative_path: &[&str]) -> bool {
    true
}

/// A filter is either empty (keeps everything, and lets readers skip the
/// filtering pass entirely) or wraps a [`SnapshotPredicate`].
#[derive(Default)]
pub struct SnapshottingFilter {
    predicate: Option<Box<SnapshotPredicate>>,
}

impl SnapshottingFilter {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        predicate: impl Fn(&FileSystemLocationSnapshot, &[&str]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
        }
    }

    /// Drops every entry below the root whose name matches one of `patterns`.
    pub fn excluding_names<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(ExcludePattern::new)
            .collect::<Vec<_>>();
        if patterns.is_empty() {
            return Self::empty();
        }

        Self::new(move |_, relative_path| match relative_path.last() {
            Some(name) => !patterns.iter().any(|pattern| pattern.matches(name)),
            None => true,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }

    pub fn as_predicate(&self) -> &SnapshotPredicate {
        match &self.predicate {
            Some(predicate) => predicate.as_ref(),
            None => &accept_all,
        }
    }
}

impl fmt::Debug for SnapshottingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshottingFilter")
            .field("empty", &self.is_empty())
            .finish()
    }
}
