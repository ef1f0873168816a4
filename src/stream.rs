use crate::download::Downloader;
use crate::error::Result;
use crate::pipeline::StagingPipeline;
use crate::record::FileRecordReader;
use crate::types::Record;

/// A system of record viewed as a sorted stream of (id, version) pairs.
///
/// A comparison engine opens two of these, walks both iterators in lockstep
/// and closes them when done. Implementations must yield records in
/// non-decreasing identifier order.
pub trait IdVersionStream {
    type Iter: Iterator<Item = Result<Record>>;

    /// Prepare the stream. May block for as long as staging takes.
    fn open(&mut self) -> Result<()>;

    /// A new iterator from the first record.
    fn iterator(&self) -> Result<Self::Iter>;

    /// Release everything `open` acquired.
    fn close(&mut self);
}

impl<D: Downloader> IdVersionStream for StagingPipeline<D> {
    type Iter = FileRecordReader;

    fn open(&mut self) -> Result<()> {
        StagingPipeline::open(self)
    }

    fn iterator(&self) -> Result<Self::Iter> {
        StagingPipeline::iterator(self)
    }

    fn close(&mut self) {
        StagingPipeline::close(self)
    }
}
