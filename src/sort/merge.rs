use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::{Read, Write};

use crate::error::Result;
use crate::record::{RecordReader, RecordWriter};
use crate::sort::spill::SpillFile;
use crate::types::{compare, Record};

/// Head of one source, as held in the merge heap.
struct HeapEntry {
    record: Record,
    source: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we want the smallest first.
        compare(&other.record, &self.record).then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// Merges several sorted record streams into one sorted stream.
///
/// Ordering guarantee: records come out by identifier ascending. Equal
/// identifiers come out in source order (lower index first), so merging runs
/// that were spilled in input order keeps the whole sort stable.
///
/// Nothing is deduplicated: every input record is yielded exactly once.
///
/// The first error from any source is yielded once and ends the merge.
pub struct MergeIterator<R: Read> {
    sources: Vec<RecordReader<R>>,
    heap: BinaryHeap<HeapEntry>,
}

impl<R: Read> MergeIterator<R> {
    /// Build the initial heap from the first record of every source.
    /// Sources are ordered by priority: index 0 wins ties.
    pub fn new(mut sources: Vec<RecordReader<R>>) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, reader) in sources.iter_mut().enumerate() {
            if let Some(record) = reader.next().transpose()? {
                heap.push(HeapEntry { record, source });
            }
        }
        Ok(MergeIterator { sources, heap })
    }

    /// Number of sources that still have records in the heap.
    pub fn live_sources(&self) -> usize {
        self.heap.len()
    }
}

impl<R: Read> Iterator for MergeIterator<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let HeapEntry { record, source } = self.heap.pop()?;

        match self.sources[source].next() {
            Some(Ok(next)) => self.heap.push(HeapEntry {
                record: next,
                source,
            }),
            Some(Err(e)) => {
                self.heap.clear();
                return Some(Err(e));
            }
            None => {}
        }

        Some(Ok(record))
    }
}

/// Merge spilled runs into `output`, reading each through a buffer of
/// `read_buffer` bytes. Returns bytes written.
pub fn merge_spills<W: Write>(spills: &[SpillFile], output: W, read_buffer: usize) -> Result<u64> {
    let readers = spills
        .iter()
        .map(|spill| spill.reader_with_capacity(read_buffer))
        .collect::<Result<Vec<_>>>()?;

    let merged = MergeIterator::new(readers)?;
    let mut writer = RecordWriter::new(output);
    for record in merged {
        writer.append(&record?)?;
    }

    let bytes = writer.offset();
    writer.finish()?;
    Ok(bytes)
}
