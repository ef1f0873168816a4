use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::codec;
use crate::types::Record;

/// Appends record frames to a byte sink.
///
/// Used for every staged file: the downloader's unsorted file, each spill
/// of the external sort, and the merged sorted output.
///
/// Two layers of buffering, as with any file writer:
///   finish()/flush() → Rust buffer → inner writer (OS page cache for files)
///   sync()           → OS page cache → physical disk (files only)
pub struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
    /// Reused encode buffer, so appends don't allocate per record.
    scratch: Vec<u8>,
    offset: u64,
    count: u64,
}

impl RecordWriter<File> {
    /// Create (or truncate) a file and write records into it.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(RecordWriter::new(File::create(path)?))
    }

    /// Flush buffered frames and fsync the file.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(64 * 1024, inner)
    }

    pub fn with_capacity(capacity: usize, inner: W) -> Self {
        RecordWriter {
            writer: BufWriter::with_capacity(capacity, inner),
            scratch: Vec::new(),
            offset: 0,
            count: 0,
        }
    }

    /// Append one record frame.
    ///
    /// Fails with `RecordTooLarge` before writing anything if the identifier
    /// would not decode again.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        codec::check_encodable(record)?;
        self.scratch.clear();
        codec::encode_into(record, &mut self.scratch);
        self.writer.write_all(&self.scratch)?;
        self.offset += self.scratch.len() as u64;
        self.count += 1;
        Ok(())
    }

    /// Bytes written so far (including bytes still buffered).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Records written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flush everything and hand back the inner writer.
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}
