use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::record::{FileRecordReader, RecordReader};
use crate::sort::{ExternalSorter, SortOptions, SortStats};

/// Default staging file prefix.
pub const DEFAULT_NAME: &str = "elastic-search";

const UNSORTED_SUFFIX: &str = "-unsorted.dat";
const SORTED_SUFFIX: &str = "-sorted.dat";

/// Where and how a pipeline stages its data.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding both staging files.
    pub working_dir: PathBuf,
    /// Prefix of the staging file names.
    pub name: String,
    pub sort: SortOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            working_dir: std::env::temp_dir(),
            name: DEFAULT_NAME.to_string(),
            sort: SortOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Stage files (and spill sort runs) under `dir`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.sort.spill_dir = dir.clone();
        self.working_dir = dir;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.sort.memory_budget = bytes;
        self
    }

    /// Replace the sort tuning. Spills stay in the working directory; call
    /// [`with_spill_dir`](Self::with_spill_dir) afterwards to move them.
    pub fn with_sort_options(mut self, sort: SortOptions) -> Self {
        self.sort = SortOptions {
            spill_dir: self.working_dir.clone(),
            ..sort
        };
        self
    }

    /// Spill sort runs somewhere other than the working directory.
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sort.spill_dir = dir.into();
        self
    }
}

/// Lifecycle of a [`StagingPipeline`].
///
/// ```text
/// Created ──open()──► Opened ──close()──► Closed
///    │                                      ▲
///    └──open() fails──► Failed ──close()────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created,
    Opened,
    Failed,
    Closed,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Created => "created",
            State::Opened => "opened",
            State::Failed => "failed",
            State::Closed => "closed",
        }
    }
}

/// Downloads a dataset to disk, sorts it by identifier, and serves the
/// sorted records through independent forward-only iterators.
///
/// Staging layout under the working directory:
/// - `<name>-unsorted.dat`: raw frames exactly as the downloader wrote them.
/// - `<name>-sorted.dat`: the same frames in identifier order.
///
/// Both files belong to this pipeline alone and stay on disk until
/// `close()`. Dropping a pipeline that has started staging closes it, even
/// when `open()` was cut short by a panic.
pub struct StagingPipeline<D> {
    downloader: D,
    sorter: ExternalSorter,
    unsorted_path: PathBuf,
    sorted_path: PathBuf,
    state: State,
    /// Set once `open` may have touched the staging files.
    staged: bool,
    stats: Option<SortStats>,
}

impl<D: Downloader> StagingPipeline<D> {
    pub fn new(downloader: D, options: PipelineOptions) -> Self {
        let unsorted_path = options
            .working_dir
            .join(format!("{}{UNSORTED_SUFFIX}", options.name));
        let sorted_path = options
            .working_dir
            .join(format!("{}{SORTED_SUFFIX}", options.name));

        StagingPipeline {
            downloader,
            sorter: ExternalSorter::new(options.sort),
            unsorted_path,
            sorted_path,
            state: State::Created,
            staged: false,
            stats: None,
        }
    }

    /// Pipeline in the system temp dir with a 256 MiB sort budget.
    pub fn with_defaults(downloader: D) -> Self {
        Self::new(downloader, PipelineOptions::default())
    }

    /// Download everything, then sort it. Blocks until both are done.
    ///
    /// Only valid once, from `Created`. On failure the pipeline is `Failed`,
    /// any partial sorted file is removed, and `iterator()` stays unavailable.
    pub fn open(&mut self) -> Result<()> {
        if self.state != State::Created {
            return Err(self.invalid("open"));
        }

        let _span = tracing::info_span!("open_stream", path = %self.sorted_path.display()).entered();
        let started = Instant::now();
        tracing::info!("downloading to staging file");

        match self.download_and_sort() {
            Ok(stats) => {
                tracing::info!(
                    records = stats.records,
                    spills = stats.spills,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "stream opened"
                );
                self.stats = Some(stats);
                self.state = State::Opened;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "open failed");
                remove_staging_file(&self.sorted_path);
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    fn download_and_sort(&mut self) -> Result<SortStats> {
        // Set before any file exists: Drop relies on it if the downloader panics
        self.staged = true;
        if let Some(dir) = self.unsorted_path.parent() {
            fs::create_dir_all(dir)?;
        }
        self.download()?;
        self.sort()
    }

    fn download(&mut self) -> Result<()> {
        let mut sink = BufWriter::new(File::create(&self.unsorted_path)?);
        self.downloader.download_to(&mut sink)?;
        sink.flush()?;
        sink.get_ref().sync_all()?;
        Ok(())
    }

    fn sort(&mut self) -> Result<SortStats> {
        let input = File::open(&self.unsorted_path)?;
        let mut output = File::create(&self.sorted_path)?;
        let stats = self.sorter.sort(input, &mut output)?;
        output.sync_all()?;
        Ok(stats)
    }
}

impl<D> StagingPipeline<D> {
    /// Fresh reader positioned at the first sorted record.
    ///
    /// Each call opens its own handle, so iterators are independent of each
    /// other. Records are order-checked as they are decoded.
    pub fn iterator(&self) -> Result<FileRecordReader> {
        if self.state != State::Opened {
            return Err(self.invalid("iterator"));
        }
        Ok(RecordReader::open(&self.sorted_path)?.with_order_check())
    }

    /// Remove both staging files. Safe to call any number of times.
    pub fn close(&mut self) {
        remove_staging_file(&self.unsorted_path);
        remove_staging_file(&self.sorted_path);
        if self.state != State::Closed {
            tracing::debug!(from = self.state.name(), "stream closed");
        }
        self.state = State::Closed;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Sort statistics, once opened.
    pub fn stats(&self) -> Option<SortStats> {
        self.stats
    }

    pub fn unsorted_path(&self) -> &Path {
        &self.unsorted_path
    }

    pub fn sorted_path(&self) -> &Path {
        &self.sorted_path
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state.name(),
        }
    }
}

impl<D> Drop for StagingPipeline<D> {
    fn drop(&mut self) {
        if self.staged && self.state != State::Closed {
            self.close();
        }
    }
}

/// Best-effort delete. A missing file is fine; anything else is logged.
fn remove_staging_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed staging file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove staging file"),
    }
}
