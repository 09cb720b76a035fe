mod executor;

pub use executor::{ExecutionError, ExecutorCreationError, LocationReport, SnapshotExecutor};
