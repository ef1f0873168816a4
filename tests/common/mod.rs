#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use id_version_stream::{record, Record, Result};

/// Route crate logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Concatenated frames for `records`, in order.
pub fn frames(records: &[Record]) -> Vec<u8> {
    let mut buf = Vec::new();
    for r in records {
        record::codec::encode_into(r, &mut buf);
    }
    buf
}

/// Shorthand for building records from `(id, version)` pairs.
pub fn records(pairs: &[(&str, i64)]) -> Vec<Record> {
    pairs.iter().map(|(id, v)| Record::new(*id, *v)).collect()
}

/// A downloader closure that writes `records` and nothing else.
pub fn downloader_for(records: Vec<Record>) -> impl FnMut(&mut dyn Write) -> Result<()> {
    move |sink: &mut dyn Write| -> Result<()> {
        sink.write_all(&frames(&records))?;
        Ok(())
    }
}

/// Memory budget that fits exactly `n` records with single-character ids.
pub fn budget_for_single_char_records(n: usize) -> usize {
    Record::new("x", 0).estimated_size() * n
}

/// Every file currently in `dir`.
pub fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect()
}

pub fn assert_sorted_by_id(records: &[Record]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].id <= pair[1].id,
            "{:?} came before {:?}",
            pair[0].id,
            pair[1].id
        );
    }
}
