//! # Sorted id/version streams
//!
//! Turns an unordered dump of `(identifier, version)` pairs from a remote
//! document store into a stream sorted by identifier, ready to be
//! merge-joined against the same stream from another system of record.
//!
//! ## Core idea
//! The dataset can be far larger than memory, so nothing is sorted in place:
//! download everything to a staging file, external-sort it into a second
//! staging file with a fixed memory budget, then hand out lazy readers over
//! the sorted file. `close()` removes both files.
//!
//! ```no_run
//! use std::io::Write;
//! use id_version_stream::{record, PipelineOptions, Record, Result, StagingPipeline};
//!
//! let downloader = |sink: &mut dyn Write| -> Result<()> {
//!     sink.write_all(&record::encode(&Record::new("doc-2", 7)))?;
//!     sink.write_all(&record::encode(&Record::new("doc-1", 3)))?;
//!     Ok(())
//! };
//!
//! let mut stream = StagingPipeline::new(downloader, PipelineOptions::default());
//! stream.open()?;
//! for record in stream.iterator()? {
//!     let record = record?;
//!     println!("{} {}", record.id, record.version);
//! }
//! stream.close();
//! # Ok::<(), id_version_stream::Error>(())
//! ```

pub mod download;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod sort;
pub mod stream;
pub mod types;

// Public re-exports for the top-level API
pub use download::{Downloader, ScrollDownloader, ScrollSource};
pub use error::{Error, Result};
pub use pipeline::{PipelineOptions, StagingPipeline, State};
pub use record::{FileRecordReader, RecordReader, RecordWriter};
pub use sort::{verify_sorted, ExternalSorter, SortOptions, SortStats};
pub use stream::IdVersionStream;
pub use types::Record;
