//! Filtered projections of existing snapshots.
//!
//! Filtering never touches the disk or the cache; it derives a new snapshot
//! from one that was already produced.

mod snapshot_filter;
mod snapshotting_filter;

pub use snapshot_filter::filter_snapshot;
pub use snapshotting_filter::{SnapshotPredicate, SnapshottingFilter};
