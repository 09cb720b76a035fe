use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Snapshots filesystem locations through a shared in-memory cache.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Locations to snapshot, relative to the root
    #[clap(default_value = ".")]
    pub locations: Vec<String>,
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// The root directory of the project
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Leave out entries with a matching name (`*` and `?` wildcards)
    #[clap(long, short)]
    pub exclude: Vec<String>,

    /// Only print content hashes of regular files
    #[clap(long)]
    pub hash_only: bool,
}
