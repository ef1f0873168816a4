// External sorter tests
// Run generation, spilling, k-way merge and spill cleanup.

mod common;

use std::io::Cursor;

use common::{assert_sorted_by_id, budget_for_single_char_records, files_in, frames, records};
use id_version_stream::{Error, ExternalSorter, Record, RecordReader, SortOptions};
use rand::seq::SliceRandom;

/// Helper: sort `input` with the given budget, spilling into `dir`.
fn sort_records(
    input: &[Record],
    budget: usize,
    dir: &std::path::Path,
) -> (Vec<Record>, id_version_stream::SortStats) {
    common::init_tracing();
    let sorter = ExternalSorter::new(
        SortOptions::default()
            .with_memory_budget(budget)
            .with_spill_dir(dir),
    );
    let mut output = Vec::new();
    let stats = sorter.sort(Cursor::new(frames(input)), &mut output).unwrap();

    let sorted = RecordReader::from_reader(Cursor::new(output))
        .map(|r| r.unwrap())
        .collect();
    (sorted, stats)
}

// =============================================================================
// Test 1: Basic sort, everything fits in memory
// =============================================================================
#[test]
fn sorts_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let input = records(&[("z", 26), ("a", 1), ("m", 13)]);

    let (sorted, stats) = sort_records(&input, 1024 * 1024, dir.path());

    assert_eq!(sorted, records(&[("a", 1), ("m", 13), ("z", 26)]));
    assert_eq!(stats.records, 3);
    // A single run is copied straight through, no merge
    assert_eq!(stats.spills, 1);
}

// =============================================================================
// Test 2: Empty input → empty output, no spills
// =============================================================================
#[test]
fn empty_input() {
    let dir = tempfile::tempdir().unwrap();

    let (sorted, stats) = sort_records(&[], 1024, dir.path());

    assert!(sorted.is_empty());
    assert_eq!(stats.records, 0);
    assert_eq!(stats.spills, 0);
    assert_eq!(stats.bytes_written, 0);
    assert!(files_in(dir.path()).is_empty());
}

// =============================================================================
// Test 3: Two-record budget on four records → two runs, merged
// =============================================================================
#[test]
fn two_chunks_of_two() {
    let dir = tempfile::tempdir().unwrap();
    let input = records(&[("C", 1), ("A", 3), ("B", 2), ("A", 1)]);

    let (sorted, stats) = sort_records(&input, budget_for_single_char_records(2), dir.path());

    assert_eq!(stats.spills, 2);
    let ids: Vec<&str> = sorted.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "A", "B", "C"]);
    // Stable: (A,3) was read before (A,1)
    assert_eq!(sorted, records(&[("A", 3), ("A", 1), ("B", 2), ("C", 1)]));
}

// =============================================================================
// Test 4: Budget forcing many spills still sorts correctly
// =============================================================================
#[test]
fn many_spills_sort_correctly() {
    let dir = tempfile::tempdir().unwrap();
    let mut input: Vec<Record> = (0..5_000)
        .map(|i| Record::new(format!("{:05}", i), i as i64))
        .collect();
    input.shuffle(&mut rand::thread_rng());

    // ~100 records per run
    let budget = input[0].estimated_size() * 100;
    let (sorted, stats) = sort_records(&input, budget, dir.path());

    assert!(stats.spills >= 3, "expected at least 3 spills, got {}", stats.spills);
    assert_eq!(stats.records, 5_000);
    assert_eq!(sorted.len(), 5_000);
    for (i, r) in sorted.iter().enumerate() {
        assert_eq!(r.id, format!("{:05}", i));
        assert_eq!(r.version, i as i64);
    }
}

// =============================================================================
// Test 5: Output is a permutation of the input
// =============================================================================
#[test]
fn output_is_permutation_of_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut input: Vec<Record> = (0..2_000)
        .map(|i| Record::new(format!("id-{}", (i * 7919) % 611), i as i64))
        .collect();
    input.shuffle(&mut rand::thread_rng());

    let (sorted, _) = sort_records(&input, 4 * 1024, dir.path());
    assert_sorted_by_id(&sorted);

    let mut expected = input.clone();
    expected.sort_by(|a, b| a.id.cmp(&b.id).then(a.version.cmp(&b.version)));
    let mut actual = sorted.clone();
    actual.sort_by(|a, b| a.id.cmp(&b.id).then(a.version.cmp(&b.version)));
    assert_eq!(actual, expected);
}

// =============================================================================
// Test 6: Duplicates are kept, in input order, across runs
// =============================================================================
#[test]
fn duplicates_preserved_and_stable() {
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<Record> = (0..300)
        .map(|i| Record::new(["x", "y", "z"][i % 3], i as i64))
        .collect();

    let (sorted, stats) = sort_records(&input, budget_for_single_char_records(7), dir.path());

    assert!(stats.spills >= 3);
    assert_eq!(sorted.len(), 300);
    for id in ["x", "y", "z"] {
        let versions: Vec<i64> = sorted.iter().filter(|r| r.id == id).map(|r| r.version).collect();
        assert_eq!(versions.len(), 100);
        assert!(versions.windows(2).all(|w| w[0] < w[1]), "{id} lost input order");
    }
    assert_sorted_by_id(&sorted);
}

// =============================================================================
// Test 7: Sorting sorted output changes nothing
// =============================================================================
#[test]
fn sorting_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut input: Vec<Record> = (0..500)
        .map(|i| Record::new(format!("k{}", i % 120), i as i64))
        .collect();
    input.shuffle(&mut rand::thread_rng());

    let budget = budget_for_single_char_records(40);
    let (once, _) = sort_records(&input, budget, dir.path());
    let (twice, _) = sort_records(&once, budget, dir.path());

    assert_eq!(once, twice);
}

// =============================================================================
// Test 8: Spill files are gone after a successful sort
// =============================================================================
#[test]
fn spills_removed_after_sort() {
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<Record> = (0..100).rev().map(|i| Record::new(format!("{i:03}"), i)).collect();

    let (_, stats) = sort_records(&input, budget_for_single_char_records(10), dir.path());

    assert!(stats.spills > 1);
    assert!(files_in(dir.path()).is_empty(), "spill files left behind");
}

// =============================================================================
// Test 9: Corrupt input aborts the sort and still cleans up spills
// =============================================================================
#[test]
fn corrupt_input_fails_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<Record> = (0..50).map(|i| Record::new(format!("{i:03}"), i)).collect();
    let mut bytes = frames(&input);
    // Cut the last frame short, after several runs have already spilled
    bytes.truncate(bytes.len() - 2);

    let sorter = ExternalSorter::new(
        SortOptions::default()
            .with_memory_budget(budget_for_single_char_records(5))
            .with_spill_dir(dir.path()),
    );
    let mut output = Vec::new();
    let result = sorter.sort(Cursor::new(bytes), &mut output);

    assert!(matches!(result, Err(Error::Corruption(_))));
    assert!(output.is_empty(), "nothing may be written on failure");
    assert!(files_in(dir.path()).is_empty(), "spill files left behind");
}

// =============================================================================
// Test 10: Spill directory is created on demand
// =============================================================================
#[test]
fn spill_dir_created() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");

    let (sorted, _) = sort_records(&records(&[("b", 1), ("a", 2)]), 1, &nested);

    assert_eq!(sorted, records(&[("a", 2), ("b", 1)]));
    assert!(nested.is_dir());
}

// =============================================================================
// Test 11: Fan-in limit forces intermediate passes, still sorted and stable
// =============================================================================
#[test]
fn fan_in_limit_merges_in_passes() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let input: Vec<Record> = (0..400)
        .map(|i| Record::new(format!("k{:02}", (i * 13) % 50), i as i64))
        .collect();

    let sorter = ExternalSorter::new(
        SortOptions::default()
            .with_memory_budget(input[0].estimated_size() * 10)
            .with_spill_dir(dir.path())
            .with_max_fan_in(3),
    );
    let mut output = Vec::new();
    let stats = sorter.sort(Cursor::new(frames(&input)), &mut output).unwrap();

    // 40 runs → 14 → 5 → 2, then the final merge
    assert_eq!(stats.spills, 40);
    assert_eq!(stats.merge_passes, 3);
    assert_eq!(stats.records, 400);

    let sorted: Vec<Record> = RecordReader::from_reader(Cursor::new(output))
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(sorted.len(), 400);
    assert_sorted_by_id(&sorted);
    for pair in sorted.windows(2) {
        if pair[0].id == pair[1].id {
            assert!(pair[0].version < pair[1].version, "stable order lost across passes");
        }
    }
    assert!(files_in(dir.path()).is_empty(), "intermediate runs left behind");
}
