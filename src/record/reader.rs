use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::codec;
use crate::types::Record;

/// Forward-only reader over a stream of record frames.
///
/// Decodes one frame per step; nothing beyond the read buffer is held in
/// memory, so a staged file of any size can be walked.
///
/// The underlying handle is released as soon as the sequence ends:
/// - on clean end of stream,
/// - on the first decode or IO error (the error is yielded once, then the
///   reader is finished),
/// - when the reader is dropped.
///
/// Unlike a crash-recovery log, a truncated or corrupt frame is an error
/// here, never a silent stop: a staged file is always written completely.
pub struct RecordReader<R: Read> {
    /// `None` once the sequence has ended.
    reader: Option<R>,
    /// Record read ahead by `has_next()`.
    peeked: Option<Record>,
    /// Previous identifier, kept only when the order check is on.
    last_id: Option<String>,
    check_order: bool,
    yielded: u64,
}

/// Read buffer for staged files opened with [`RecordReader::open`].
pub const DEFAULT_READ_BUFFER: usize = 256 * 1024;

/// Reader over a staged file on disk.
pub type FileRecordReader = RecordReader<BufReader<File>>;

impl RecordReader<BufReader<File>> {
    /// Open a staged file for reading from its first record.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_READ_BUFFER)
    }

    /// Like [`open`](Self::open) with an explicit read buffer size.
    pub fn open_with_capacity(path: &Path, capacity: usize) -> Result<Self> {
        let file = File::open(path)?;
        Ok(RecordReader::from_reader(BufReader::with_capacity(
            capacity, file,
        )))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn from_reader(reader: R) -> Self {
        RecordReader {
            reader: Some(reader),
            peeked: None,
            last_id: None,
            check_order: false,
            yielded: 0,
        }
    }

    /// Fail with `OrderingViolation` if an identifier is smaller than the one
    /// before it.
    pub fn with_order_check(mut self) -> Self {
        self.check_order = true;
        self
    }

    /// Whether another record is available. Reads ahead one frame.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        match self.advance()? {
            Some(record) => {
                self.peeked = Some(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next record, or `Error::Exhausted` past the end.
    pub fn next_record(&mut self) -> Result<Record> {
        let record = match self.peeked.take() {
            Some(record) => record,
            None => self.advance()?.ok_or(Error::Exhausted)?,
        };
        self.yielded += 1;
        Ok(record)
    }

    /// Records handed out so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Whether the underlying handle has been released.
    pub fn is_finished(&self) -> bool {
        self.reader.is_none() && self.peeked.is_none()
    }

    /// Decode the next frame, releasing the handle when the sequence ends.
    fn advance(&mut self) -> Result<Option<Record>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let record = match codec::read_frame(reader) {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.reader = None;
                return Ok(None);
            }
            Err(e) => {
                self.reader = None;
                return Err(e);
            }
        };

        if self.check_order {
            if let Err(e) = self.check(&record) {
                self.reader = None;
                return Err(e);
            }
        }
        Ok(Some(record))
    }

    fn check(&mut self, record: &Record) -> Result<()> {
        match self.last_id.as_mut() {
            Some(previous) if record.id.as_bytes() < previous.as_bytes() => {
                Err(Error::OrderingViolation {
                    previous: previous.clone(),
                    current: record.id.clone(),
                })
            }
            Some(previous) => {
                previous.clear();
                previous.push_str(&record.id);
                Ok(())
            }
            None => {
                self.last_id = Some(record.id.clone());
                Ok(())
            }
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(record) => Some(Ok(record)),
            Err(Error::Exhausted) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
