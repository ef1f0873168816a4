use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;
use crate::record::reader::DEFAULT_READ_BUFFER;
use crate::record::{FileRecordReader, RecordReader, RecordWriter};
use crate::sort::merge;
use crate::types::Record;

/// One sorted run written to a temporary file.
///
/// The file is removed when the `SpillFile` is dropped, so every exit path
/// of the sort (success, IO error, decode error) cleans up its spills.
pub struct SpillFile {
    file: NamedTempFile,
    records: u64,
    bytes: u64,
}

impl SpillFile {
    /// Write an already-sorted run to a new temp file in `dir`.
    pub fn write(dir: &Path, index: usize, records: &[Record]) -> Result<Self> {
        let prefix = format!("spill-{index:05}-");
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".run")
            .tempfile_in(dir)?;

        let mut writer = RecordWriter::new(file.as_file());
        for record in records {
            writer.append(record)?;
        }
        let bytes = writer.offset();
        writer.finish()?;

        Ok(SpillFile {
            file,
            records: records.len() as u64,
            bytes,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Merge several runs, in order, into one new run in `dir`.
    ///
    /// Equal identifiers keep the order of `runs`, so merging consecutive
    /// runs preserves the stability of the sort.
    pub fn merge(dir: &Path, index: usize, runs: &[SpillFile], read_buffer: usize) -> Result<Self> {
        let prefix = format!("merged-{index:05}-");
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".run")
            .tempfile_in(dir)?;

        let bytes = merge::merge_spills(runs, file.as_file(), read_buffer)?;
        Ok(SpillFile {
            file,
            records: runs.iter().map(SpillFile::records).sum(),
            bytes,
        })
    }

    /// Fresh reader from the start of the run.
    pub fn reader(&self) -> Result<FileRecordReader> {
        self.reader_with_capacity(DEFAULT_READ_BUFFER)
    }

    /// Fresh reader with an explicit read buffer, for wide merges.
    pub fn reader_with_capacity(&self, capacity: usize) -> Result<FileRecordReader> {
        Ok(RecordReader::open_with_capacity(self.path(), capacity)?.with_order_check())
    }

    /// Copy the raw run bytes to `out`. Used when there is nothing to merge.
    pub fn copy_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let mut file = File::open(self.path())?;
        Ok(io::copy(&mut file, out)?)
    }
}
