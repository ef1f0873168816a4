//! External merge sort over record frames.
//!
//! Sorting is done in two passes so that working memory stays bounded no
//! matter how large the input is:
//!
//! 1. **Run generation**: decode records into an in-memory [`Chunk`] until
//!    its tracked size reaches the memory budget, stable-sort it, write it to
//!    a [`SpillFile`]. Repeat until the input is exhausted.
//! 2. **Merge**: k-way merge of all spills through a min-heap
//!    ([`MergeIterator`]). With zero spills the output stays empty; with one
//!    spill the run is copied verbatim and the merge is skipped. With more
//!    runs than the fan-in limit, consecutive groups are first merged into
//!    intermediate runs until the rest fits in one final merge.
//!
//! Merge read buffers are carved out of the same memory budget, so open
//! files and buffer memory stay bounded however many runs the input makes.
//!
//! Spills are temp files owned by the sort call and are gone when it returns,
//! whether it succeeded or not.

pub mod chunk;
pub mod merge;
pub mod spill;

use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub use chunk::Chunk;
pub use merge::MergeIterator;
pub use spill::SpillFile;

use crate::error::Result;
use crate::record::RecordReader;

/// Default working memory for one sort: 256 MiB.
pub const DEFAULT_MEMORY_BUDGET: usize = 256 * 1024 * 1024;

/// Default number of runs merged at once.
pub const DEFAULT_MAX_FAN_IN: usize = 64;

const MIN_MERGE_BUFFER: usize = 8 * 1024;
const MAX_MERGE_BUFFER: usize = 256 * 1024;

/// Tuning knobs for [`ExternalSorter`].
#[derive(Debug, Clone)]
pub struct SortOptions {
    /// Estimated bytes of records held in memory before a run is spilled.
    pub memory_budget: usize,
    /// Directory for spill files. Created if missing.
    pub spill_dir: PathBuf,
    /// Most runs open at once during a merge. Never below 2.
    pub max_fan_in: usize,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            spill_dir: std::env::temp_dir(),
            max_fan_in: DEFAULT_MAX_FAN_IN,
        }
    }
}

impl SortOptions {
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = dir.into();
        self
    }

    pub fn with_max_fan_in(mut self, runs: usize) -> Self {
        self.max_fan_in = runs.max(2);
        self
    }

    /// Read buffer per run when `runs` are merged together: an even share
    /// of the memory budget, clamped to a sane range.
    pub fn merge_buffer_size(&self, runs: usize) -> usize {
        (self.memory_budget / runs.max(1)).clamp(MIN_MERGE_BUFFER, MAX_MERGE_BUFFER)
    }
}

/// What a finished sort did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Records written to the output.
    pub records: u64,
    /// Sorted runs spilled to disk.
    pub spills: usize,
    /// Intermediate merge passes needed to respect the fan-in limit.
    pub merge_passes: usize,
    /// Bytes written to the output.
    pub bytes_written: u64,
}

/// Bounded-memory sorter for streams of record frames.
#[derive(Debug, Clone, Default)]
pub struct ExternalSorter {
    options: SortOptions,
}

impl ExternalSorter {
    pub fn new(options: SortOptions) -> Self {
        ExternalSorter { options }
    }

    pub fn options(&self) -> &SortOptions {
        &self.options
    }

    /// Sort every frame of `input` by identifier and write the frames to
    /// `output`.
    ///
    /// Any IO or decode failure aborts the sort and is returned; output is
    /// only flushed on success.
    pub fn sort<R: Read, W: Write>(&self, input: R, mut output: W) -> Result<SortStats> {
        let _span = tracing::info_span!(
            "external_sort",
            budget = self.options.memory_budget,
            spill_dir = %self.options.spill_dir.display()
        )
        .entered();
        let started = Instant::now();

        fs::create_dir_all(&self.options.spill_dir)?;
        let spills = self.generate_runs(input)?;
        let records: u64 = spills.iter().map(SpillFile::records).sum();
        let spill_count = spills.len();
        let (runs, merge_passes) = self.reduce_fan_in(spills)?;

        let bytes_written = match runs.as_slice() {
            [] => 0,
            [only] => only.copy_to(&mut output)?,
            many => {
                tracing::debug!(runs = many.len(), "merging runs");
                let buffer = self.options.merge_buffer_size(many.len());
                merge::merge_spills(many, &mut output, buffer)?
            }
        };
        output.flush()?;

        let stats = SortStats {
            records,
            spills: spill_count,
            merge_passes,
            bytes_written,
        };
        tracing::debug!(
            records = stats.records,
            spills = stats.spills,
            bytes = stats.bytes_written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sort complete"
        );
        Ok(stats)
    }

    /// Pass 1: cut the input into sorted runs on disk.
    fn generate_runs<R: Read>(&self, input: R) -> Result<Vec<SpillFile>> {
        let reader = RecordReader::from_reader(BufReader::with_capacity(256 * 1024, input));
        let mut chunk = Chunk::new(self.options.memory_budget);
        let mut spills = Vec::new();

        for record in reader {
            if chunk.push(record?) {
                spills.push(self.spill(&mut chunk, spills.len())?);
            }
        }
        if !chunk.is_empty() {
            spills.push(self.spill(&mut chunk, spills.len())?);
        }
        Ok(spills)
    }

    /// Merge consecutive groups of runs until at most `max_fan_in` remain.
    /// Replaced runs are deleted as soon as their pass finishes.
    fn reduce_fan_in(&self, mut runs: Vec<SpillFile>) -> Result<(Vec<SpillFile>, usize)> {
        let fan_in = self.options.max_fan_in.max(2);
        let buffer = self.options.merge_buffer_size(fan_in);
        let mut passes = 0;

        while runs.len() > fan_in {
            let mut merged = Vec::with_capacity(runs.len().div_ceil(fan_in));
            for group in runs.chunks(fan_in) {
                merged.push(SpillFile::merge(&self.options.spill_dir, merged.len(), group, buffer)?);
            }
            passes += 1;
            tracing::debug!(
                pass = passes,
                runs_in = runs.len(),
                runs_out = merged.len(),
                "intermediate merge pass"
            );
            runs = merged;
        }
        Ok((runs, passes))
    }

    fn spill(&self, chunk: &mut Chunk, index: usize) -> Result<SpillFile> {
        let tracked = chunk.size_bytes();
        let records = chunk.take_sorted();
        let spill = SpillFile::write(&self.options.spill_dir, index, &records)?;
        tracing::debug!(
            run = index,
            records = records.len(),
            tracked_bytes = tracked,
            file_bytes = spill.bytes(),
            "spilled sorted run"
        );
        Ok(spill)
    }
}

/// Walk a staged file and confirm identifiers never decrease.
///
/// Returns the number of records, or the first `OrderingViolation` /
/// decode error.
pub fn verify_sorted(path: &Path) -> Result<u64> {
    let mut reader = RecordReader::open(path)?.with_order_check();
    while reader.has_next()? {
        reader.next_record()?;
    }
    Ok(reader.yielded())
}
