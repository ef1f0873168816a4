use std::io::Write;

use crate::error::Result;
use crate::record::RecordWriter;
use crate::types::Record;

/// Fills the unsorted staging file with every record of the remote dataset.
///
/// The downloader writes a complete sequence of encoded frames into `sink`
/// and returns only when it is done. Sorting starts after it returns, so a
/// downloader must not hand the sink to anything that outlives the call.
/// Any error it returns aborts the pipeline's `open()`.
pub trait Downloader {
    fn download_to(&mut self, sink: &mut dyn Write) -> Result<()>;
}

impl<F> Downloader for F
where
    F: FnMut(&mut dyn Write) -> Result<()>,
{
    fn download_to(&mut self, sink: &mut dyn Write) -> Result<()> {
        self(sink)
    }
}

/// A cursor over the remote store that hands out results a page at a time.
///
/// `Ok(None)` or an empty page both mean the cursor is drained.
pub trait ScrollSource {
    fn next_page(&mut self) -> Result<Option<Vec<Record>>>;
}

impl<F> ScrollSource for F
where
    F: FnMut() -> Result<Option<Vec<Record>>>,
{
    fn next_page(&mut self) -> Result<Option<Vec<Record>>> {
        self()
    }
}

/// Downloader that drains a [`ScrollSource`] page by page into the sink.
pub struct ScrollDownloader<S> {
    source: S,
    records_written: u64,
    pages: u64,
}

impl<S: ScrollSource> ScrollDownloader<S> {
    pub fn new(source: S) -> Self {
        ScrollDownloader {
            source,
            records_written: 0,
            pages: 0,
        }
    }

    /// Records written by the last download.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Non-empty pages consumed by the last download.
    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ScrollSource> Downloader for ScrollDownloader<S> {
    fn download_to(&mut self, sink: &mut dyn Write) -> Result<()> {
        let mut writer = RecordWriter::new(sink);
        self.records_written = 0;
        self.pages = 0;

        while let Some(page) = self.source.next_page()? {
            if page.is_empty() {
                break;
            }
            for record in &page {
                writer.append(record)?;
            }
            self.pages += 1;
            tracing::trace!(page = self.pages, total = writer.count(), "scroll page written");
        }

        self.records_written = writer.count();
        writer.finish()?.flush()?;
        tracing::info!(
            records = self.records_written,
            pages = self.pages,
            "scroll download complete"
        );
        Ok(())
    }
}
