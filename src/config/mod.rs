mod vfs_config;

pub use vfs_config::{DEFAULT_EXCLUDES, VfsConfig, VfsConfigError};
