use std::path::PathBuf;

use snapcache::ext::best_effort_absolute_path;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub locations: Vec<String>,
    pub root: PathBuf,
    pub excludes: Vec<String>,
    pub hash_only: bool,
}

impl RuntimeConfig {
    /// Absolute form of every requested location, in request order.
    pub fn resolved_locations(&self) -> Vec<String> {
        self.locations
            .iter()
            .map(|location| {
                best_effort_absolute_path(&self.root.join(location))
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            locations: cli.locations,
            root: cli.root,
            excludes: cli.exclude,
            hash_only: cli.hash_only,
        }
    }
}
