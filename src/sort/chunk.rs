use rayon::slice::ParallelSliceMut;

use crate::types::{compare, Record};

/// Below this many records the sequential sort wins over the thread pool.
const PARALLEL_SORT_THRESHOLD: usize = 64 * 1024;

/// In-memory buffer of records for one run of the external sort.
///
/// Records accumulate until the tracked size reaches the memory budget;
/// the chunk is then sorted and spilled. The first record is always
/// accepted, so a single oversized record still forms a run on its own.
pub struct Chunk {
    records: Vec<Record>,
    size_bytes: usize,
    budget: usize,
}

impl Chunk {
    pub fn new(budget: usize) -> Self {
        Chunk {
            records: Vec::new(),
            size_bytes: 0,
            budget,
        }
    }

    /// Add a record. Returns true once the chunk has reached its budget.
    pub fn push(&mut self, record: Record) -> bool {
        self.size_bytes += record.estimated_size();
        self.records.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        !self.records.is_empty() && self.size_bytes >= self.budget
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Tracked size of the buffered records.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Stable sort by identifier, then hand the records out and reset.
    ///
    /// Stability keeps duplicate identifiers in input order.
    pub fn take_sorted(&mut self) -> Vec<Record> {
        if self.records.len() >= PARALLEL_SORT_THRESHOLD {
            self.records.par_sort_by(compare);
        } else {
            self.records.sort_by(compare);
        }
        self.size_bytes = 0;
        std::mem::take(&mut self.records)
    }
}
