use std::cmp::Ordering;

/// One document as seen by a system of record: its identifier and version.
///
/// Ordering: identifier ascending, byte-lexicographic. The version is carried
/// through unchanged and never takes part in comparisons, so two records with
/// the same identifier compare equal even if their versions differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub id: String,
    pub version: i64,
}

impl Record {
    pub fn new(id: impl Into<String>, version: i64) -> Self {
        Record {
            id: id.into(),
            version,
        }
    }

    /// Total order used by the sorter and the merge.
    pub fn cmp_by_id(&self, other: &Self) -> Ordering {
        compare(self, other)
    }

    /// Approximate heap + inline footprint, used for the sort memory budget.
    pub fn estimated_size(&self) -> usize {
        std::mem::size_of::<Record>() + self.id.len()
    }
}

/// Compare two records by identifier only.
pub fn compare(a: &Record, b: &Record) -> Ordering {
    a.id.as_bytes().cmp(b.id.as_bytes())
}
