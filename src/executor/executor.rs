use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::available_parallelism;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use compio::runtime::spawn;
use futures::StreamExt;
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use snapcache::filter::SnapshottingFilter;
use snapcache::snapshot::{ContentHash, FileSystemLocationSnapshot, SnapshotRef};
use snapcache::snapshotter::SnapshotProducer;
use snapcache::vfs::{VfsError, VirtualFileSystem};

/// Default number of worker threads when unable to determine system parallelism
const DEFAULT_WORKER_THREADS: NonZeroUsize = NonZeroUsize::MIN;

/// What a single read found at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationReport {
    RegularFile {
        hash: ContentHash,
    },
    Directory {
        hash: ContentHash,
        regular_files: usize,
    },
    Missing,
    /// A hash-only read of something that is not a regular file.
    NotARegularFile,
    /// The filter left nothing with a single root.
    Filtered,
}

impl LocationReport {
    fn of_snapshot(snapshot: &SnapshotRef) -> Self {
        match &**snapshot {
            FileSystemLocationSnapshot::RegularFile(file) => Self::RegularFile { hash: file.hash() },
            FileSystemLocationSnapshot::Directory(directory) => Self::Directory {
                hash: directory.hash(),
                regular_files: count_regular_files(snapshot),
            },
            FileSystemLocationSnapshot::Missing(_) => Self::Missing,
        }
    }
}

fn count_regular_files(snapshot: &SnapshotRef) -> usize {
    match snapshot.as_directory() {
        Some(directory) => directory.children().iter().map(count_regular_files).sum(),
        None => usize::from(snapshot.as_regular_file().is_some()),
    }
}

type ReadResult = (usize, Result<LocationReport, ExecutionError>);

/// Reads locations through one shared virtual file system from a pool of
/// worker threads.
pub struct SnapshotExecutor<P> {
    dispatcher: Dispatcher,
    vfs: Arc<VirtualFileSystem<P>>,
    filter: Arc<SnapshottingFilter>,
    hash_only: bool,
}

impl<P: SnapshotProducer + 'static> SnapshotExecutor<P> {
    pub fn new(
        vfs: Arc<VirtualFileSystem<P>>,
        filter: SnapshottingFilter,
        hash_only: bool,
    ) -> Result<Self, ExecutorCreationError> {
        let workers_num = Self::determine_worker_count();
        debug!("Using {} worker threads for snapshotting", workers_num);

        let dispatcher = DispatcherBuilder::new()
            .worker_threads(workers_num)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self {
            dispatcher,
            vfs,
            filter: Arc::new(filter),
            hash_only,
        })
    }

    /// Determines the optimal number of worker threads for snapshotting
    fn determine_worker_count() -> NonZeroUsize {
        available_parallelism().unwrap_or(DEFAULT_WORKER_THREADS)
    }

    /// Reads every location concurrently. Results come back in the order of
    /// `locations`, each paired with its location.
    pub async fn execute(
        &self,
        locations: Vec<String>,
    ) -> Result<Vec<(String, Result<LocationReport, ExecutionError>)>, ExecutionError> {
        let (result_sender, mut result_receiver) = mpsc::unbounded::<ReadResult>();

        debug!("Dispatching {} reads", locations.len());
        for (index, location) in locations.iter().enumerate() {
            self.dispatch_read(result_sender.clone(), index, location.clone())?;
        }
        drop(result_sender);

        let results = self
            .collect_results(&mut result_receiver, locations.len())
            .await;
        info!("Finished {} reads", locations.len());

        Ok(locations
            .into_iter()
            .zip(results)
            .map(|(location, result)| {
                let result = result.unwrap_or_else(|| {
                    Err(ExecutionError::ResultLostError {
                        location: location.clone(),
                    })
                });
                (location, result)
            })
            .collect())
    }

    async fn collect_results(
        &self,
        result_receiver: &mut UnboundedReceiver<ReadResult>,
        expected: usize,
    ) -> Vec<Option<Result<LocationReport, ExecutionError>>> {
        let mut results: Vec<_> = (0..expected).map(|_| None).collect();

        while let Some((index, result)) = result_receiver.next().await {
            debug!("Acknowledged read #{}", index);
            if let Some(slot) = results.get_mut(index) {
                *slot = Some(result);
            }
        }

        results
    }

    /// Dispatch a read to a worker and forward the result to the receiver
    fn dispatch_read(
        &self,
        result_sender: UnboundedSender<ReadResult>,
        index: usize,
        location: String,
    ) -> Result<(), ExecutionError> {
        let vfs = self.vfs.clone();
        let filter = self.filter.clone();
        let hash_only = self.hash_only;
        let worker_location = location.clone();

        let receiver = self
            .dispatcher
            .dispatch(move || async move {
                read_location(&vfs, &filter, hash_only, &worker_location)
            })
            .map_err(|e| ExecutionError::TaskDispatchError {
                location: location.clone(),
                error: e.to_string(),
            })?;

        debug!("Dispatched read of {}", location);

        spawn(async move {
            let result = match receiver.await {
                Ok(inner) => inner.context(ReadSnafu {
                    location: location.clone(),
                }),
                Err(e) => {
                    debug!("Read of {} was canceled: {}", location, e);
                    Err(ExecutionError::CanceledError {
                        location: location.clone(),
                        source: e,
                    })
                }
            };

            if let Err(send_err) = result_sender.unbounded_send((index, result)) {
                debug!("Failed to send read result for {}: {}", location, send_err);
            }
        })
        .detach();

        Ok(())
    }
}

fn read_location<P: SnapshotProducer>(
    vfs: &VirtualFileSystem<P>,
    filter: &SnapshottingFilter,
    hash_only: bool,
    location: &str,
) -> Result<LocationReport, VfsError> {
    if hash_only {
        return Ok(vfs
            .read_content_hash(location, |hash| LocationReport::RegularFile { hash })?
            .unwrap_or(LocationReport::NotARegularFile));
    }

    Ok(vfs
        .read_filtered(location, filter, LocationReport::of_snapshot)?
        .unwrap_or(LocationReport::Filtered))
}

#[derive(Debug, Snafu)]
pub enum ExecutorCreationError {
    #[snafu(display("Failed to create read dispatcher"))]
    DispatcherError { source: std::io::Error },
}

#[derive(Debug, Snafu)]
pub enum ExecutionError {
    #[snafu(display("Failed to dispatch read of {}: {}", location, error))]
    TaskDispatchError { location: String, error: String },
    #[snafu(display("Failed to read {}", location))]
    ReadError { location: String, source: VfsError },
    #[snafu(display("Read of {} was canceled", location))]
    CanceledError {
        location: String,
        source: futures_channel::oneshot::Canceled,
    },
    #[snafu(display("Read of {} never reported a result", location))]
    ResultLostError { location: String },
}
