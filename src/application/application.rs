use std::sync::Arc;

use colored::Colorize;
use snafu::Snafu;
use snafu::prelude::*;
use supports_color::Stream;
use tracing::{debug, info};

use snapcache::config::{VfsConfig, VfsConfigError};
use snapcache::filter::SnapshottingFilter;
use snapcache::snapshotter::DiskSnapshotProducer;
use snapcache::vfs::VirtualFileSystem;

use crate::application::RuntimeConfig;
use crate::executor::{ExecutionError, ExecutorCreationError, LocationReport, SnapshotExecutor};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let config = VfsConfig::read(&app_config.root)
            .await
            .context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        colored::control::set_override(supports_color::on(Stream::Stdout).is_some());

        let producer = DiskSnapshotProducer::new(config.default_excludes());
        let vfs = Arc::new(VirtualFileSystem::new(producer));
        let filter = SnapshottingFilter::excluding_names(&app_config.excludes);

        let results = SnapshotExecutor::new(vfs, filter, app_config.hash_only)
            .context(ExecutorCreationSnafu)?
            .execute(app_config.resolved_locations())
            .await
            .context(ApplicationExecutionSnafu)?;
        info!("Read {} locations", results.len());

        let mut failed: usize = 0;
        for (requested, (_, result)) in app_config.locations.iter().zip(results) {
            match result {
                Ok(report) => {
                    if let Some(line) = format_report(requested, &report, app_config.hash_only) {
                        println!("{line}");
                    }
                }
                Err(error) => {
                    failed += 1;
                    eprintln!(
                        "{} {}",
                        "error:".red().bold(),
                        snafu::Report::from_error(error)
                    );
                }
            }
        }

        ensure!(failed == 0, ReadsFailedSnafu { failed });
        Ok(())
    }
}

/// Renders one line of output, or nothing when the report has no place in it.
fn format_report(location: &str, report: &LocationReport, hash_only: bool) -> Option<String> {
    match report {
        LocationReport::RegularFile { hash } if hash_only => {
            Some(format!("{}  {}", hash.to_string().yellow(), location))
        }
        _ if hash_only => {
            debug!("Skipping {}, it is not a regular file", location);
            None
        }
        LocationReport::RegularFile { hash } => Some(format!(
            "{}  {} {}",
            hash.to_string().yellow(),
            "file".green(),
            location
        )),
        LocationReport::Directory {
            hash,
            regular_files,
        } => Some(format!(
            "{}  {} {} ({} files)",
            hash.to_string().yellow(),
            "dir ".blue(),
            location.bold(),
            regular_files
        )),
        LocationReport::Missing => Some(format!(
            "{:>16}  {} {}",
            "-",
            "none".red(),
            location
        )),
        LocationReport::NotARegularFile | LocationReport::Filtered => Some(format!(
            "{:>16}  {} {}",
            "-",
            "skip".dimmed(),
            location
        )),
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: VfsConfigError },
    #[snafu(display("Critical failure encountered during executor creation"))]
    ExecutorCreationError { source: ExecutorCreationError },
    #[snafu(display("Critical failure encountered during application execution"))]
    ApplicationExecutionError { source: ExecutionError },
    #[snafu(display("{} location(s) could not be read", failed))]
    ReadsFailedError { failed: usize },
}
