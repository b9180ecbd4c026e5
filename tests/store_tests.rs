//! Tests for VersionedStore over the durable engine
//!
//! These tests verify:
//! - Last-writer-wins acceptance and stale rejection
//! - Delete gating and deletes of absent keys
//! - Payload round-trips (including empty payloads)
//! - Persistence across close/reopen
//! - Concurrent writers on one key (no lost update)
//! - Store lifecycle (open/close)

use std::sync::Arc;
use std::thread;

use stampkv::{
    Lookup, Stamp, StampGenerator, StoreConfig, StoreError, SyncMode, VersionedStore,
    WriteOutcome,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, VersionedStore) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder().data_dir(temp_dir.path()).build();
    let store = VersionedStore::open(config).unwrap();
    (temp_dir, store)
}

fn stamp(ticks: u64) -> Stamp {
    Stamp::from_parts(ticks, 0, 0xACDE_4800_1122)
}

fn payload(store: &VersionedStore, key: &[u8]) -> Option<Vec<u8>> {
    store.get_payload(key).unwrap().map(|b| b.to_vec())
}

// =============================================================================
// Conditional Set Tests
// =============================================================================

#[test]
fn test_newer_stamp_replaces_value() {
    let (_temp, store) = setup_temp_store();

    store.conditional_set(b"k", "v1", stamp(100)).unwrap();
    let outcome = store.conditional_set(b"k", "v2", stamp(200)).unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(payload(&store, b"k"), Some(b"v2".to_vec()));
}

#[test]
fn test_stale_stamp_is_ignored() {
    let (_temp, store) = setup_temp_store();

    store.conditional_set(b"k", "v1", stamp(200)).unwrap();
    let outcome = store.conditional_set(b"k", "v2", stamp(100)).unwrap();

    assert_eq!(outcome, WriteOutcome::Superseded);
    assert_eq!(payload(&store, b"k"), Some(b"v1".to_vec()));
}

#[test]
fn test_set_on_absent_key_always_applies() {
    let (_temp, store) = setup_temp_store();

    let outcome = store.conditional_set(b"fresh", "v", Stamp::ZERO).unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(payload(&store, b"fresh"), Some(b"v".to_vec()));
}

#[test]
fn test_stored_stamp_is_the_writers() {
    let (_temp, store) = setup_temp_store();
    let written = Stamp::from_parts(12345, 0x0DCA, 0xACDE_4800_1122);

    store.conditional_set(b"k", "v", written).unwrap();

    let envelope = store.get(b"k").unwrap().into_envelope().unwrap();
    assert_eq!(envelope.stamp(), written);
}

#[test]
fn test_keys_are_independent() {
    let (_temp, store) = setup_temp_store();

    store.conditional_set(b"a", "a-new", stamp(500)).unwrap();
    store.conditional_set(b"b", "b-old", stamp(100)).unwrap();

    // An old stamp on "b" is still newer than nothing stored under "c"
    assert!(store.conditional_set(b"c", "c", stamp(1)).unwrap().is_applied());
    assert!(!store.conditional_set(b"a", "a-stale", stamp(400)).unwrap().is_applied());
    assert!(store.conditional_set(b"b", "b-new", stamp(400)).unwrap().is_applied());

    assert_eq!(payload(&store, b"a"), Some(b"a-new".to_vec()));
    assert_eq!(payload(&store, b"b"), Some(b"b-new".to_vec()));
    assert_eq!(payload(&store, b"c"), Some(b"c".to_vec()));
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_payload_round_trip() {
    let (_temp, store) = setup_temp_store();

    let payloads: Vec<Vec<u8>> = vec![
        vec![],
        vec![0],
        (0..=255).collect(),
        vec![0xFF; 1024 * 1024],
    ];

    for (i, bytes) in payloads.iter().enumerate() {
        let key = format!("key-{}", i);
        store
            .conditional_set(key.as_bytes(), bytes.clone(), store.new_stamp())
            .unwrap();
        assert_eq!(payload(&store, key.as_bytes()).as_ref(), Some(bytes));
    }
}

#[test]
fn test_empty_payload_is_found_not_absent() {
    let (_temp, store) = setup_temp_store();

    store.conditional_set(b"k", Vec::new(), stamp(1)).unwrap();

    assert!(store.get(b"k").unwrap().is_found());
    assert_eq!(payload(&store, b"k"), Some(Vec::new()));
}

#[test]
fn test_empty_key() {
    let (_temp, store) = setup_temp_store();

    store.conditional_set(b"", "empty key", stamp(1)).unwrap();

    assert_eq!(payload(&store, b""), Some(b"empty key".to_vec()));
}

// =============================================================================
// Conditional Delete Tests
// =============================================================================

#[test]
fn test_delete_with_newer_stamp_removes_entry() {
    let (_temp, store) = setup_temp_store();
    store.conditional_set(b"k", "v", stamp(100)).unwrap();

    let outcome = store.conditional_delete(b"k", stamp(101)).unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(store.get(b"k").unwrap(), Lookup::NotFound);
}

#[test]
fn test_delete_with_older_or_equal_stamp_keeps_entry() {
    let (_temp, store) = setup_temp_store();
    store.conditional_set(b"k", "v", stamp(100)).unwrap();

    assert_eq!(store.conditional_delete(b"k", stamp(99)).unwrap(), WriteOutcome::Superseded);
    assert_eq!(store.conditional_delete(b"k", stamp(100)).unwrap(), WriteOutcome::Superseded);

    assert_eq!(payload(&store, b"k"), Some(b"v".to_vec()));
}

#[test]
fn test_delete_absent_key_is_noop() {
    let (_temp, store) = setup_temp_store();

    let outcome = store.conditional_delete(b"never-set", stamp(1)).unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(store.get(b"never-set").unwrap(), Lookup::NotFound);
}

#[test]
fn test_key_cycles_between_absent_and_present() {
    let (_temp, store) = setup_temp_store();

    for round in 0..5u64 {
        let base = round * 10;
        assert!(store.conditional_set(b"k", "v", stamp(base + 1)).unwrap().is_applied());
        assert!(store.get(b"k").unwrap().is_found());
        assert!(store.conditional_delete(b"k", stamp(base + 2)).unwrap().is_applied());
        assert_eq!(store.get(b"k").unwrap(), Lookup::NotFound);
    }
}

#[test]
fn test_set_after_delete_accepts_any_stamp() {
    let (_temp, store) = setup_temp_store();
    store.conditional_set(b"k", "v1", stamp(100)).unwrap();
    store.conditional_delete(b"k", stamp(200)).unwrap();

    // No tombstone is kept, so an older stamp re-creates the entry
    let outcome = store.conditional_set(b"k", "v0", stamp(50)).unwrap();

    assert_eq!(outcome, WriteOutcome::Applied);
    assert_eq!(payload(&store, b"k"), Some(b"v0".to_vec()));
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_documented_scenario() {
    let (_temp, store) = setup_temp_store();
    let (t0, t1, t1_5, t2, t3) = (stamp(10), stamp(20), stamp(25), stamp(30), stamp(40));

    store.conditional_set(b"a", "x", t1).unwrap();
    store.conditional_set(b"a", "y", t0).unwrap();
    assert_eq!(payload(&store, b"a"), Some(b"x".to_vec()));

    store.conditional_set(b"a", "z", t2).unwrap();
    assert_eq!(payload(&store, b"a"), Some(b"z".to_vec()));

    store.conditional_delete(b"a", t1_5).unwrap();
    assert_eq!(payload(&store, b"a"), Some(b"z".to_vec()));

    store.conditional_delete(b"a", t3).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Lookup::NotFound);
}

#[test]
fn test_generated_stamps_order_local_writes() {
    let (_temp, store) = setup_temp_store();

    let first = store.envelope("first");
    let second = store.envelope("second");

    // Applied out of order: the later-issued stamp still wins
    store.set_envelope(b"k", &second).unwrap();
    assert_eq!(store.set_envelope(b"k", &first).unwrap(), WriteOutcome::Superseded);
    assert_eq!(payload(&store, b"k"), Some(b"second".to_vec()));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_entries_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder().data_dir(temp_dir.path()).build();

    {
        let store = VersionedStore::open(config.clone()).unwrap();
        store.conditional_set(b"kept", "v", stamp(100)).unwrap();
        store.conditional_set(b"gone", "v", stamp(100)).unwrap();
        store.conditional_delete(b"gone", stamp(101)).unwrap();
        store.close().unwrap();
    }

    let store = VersionedStore::open(config).unwrap();
    assert_eq!(payload(&store, b"kept"), Some(b"v".to_vec()));
    assert_eq!(store.get(b"gone").unwrap(), Lookup::NotFound);

    // Stored stamps still gate writes after restart
    assert_eq!(
        store.conditional_set(b"kept", "stale", stamp(99)).unwrap(),
        WriteOutcome::Superseded
    );
}

#[test]
fn test_eventual_mode_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder()
        .data_dir(temp_dir.path())
        .sync_mode(SyncMode::Eventual)
        .build();

    {
        let store = VersionedStore::open(config.clone()).unwrap();
        for i in 0..100u64 {
            store
                .conditional_set(format!("k{}", i).as_bytes(), "v", stamp(i + 1))
                .unwrap();
        }
        // Dropped without an explicit close
    }

    let store = VersionedStore::open(config).unwrap();
    for i in 0..100u64 {
        assert!(store.get(format!("k{}", i).as_bytes()).unwrap().is_found());
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_path_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _store = VersionedStore::open_path(&data_dir).unwrap();

    assert!(data_dir.join("stampkv.redb").exists());
}

#[test]
fn test_open_while_held_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder().data_dir(temp_dir.path()).build();
    let first = VersionedStore::open(config.clone()).unwrap();

    let err = VersionedStore::open(config.clone()).err().unwrap();
    assert!(matches!(err, StoreError::StorageUnavailable { .. }));

    // Closing releases the file for the next opener
    first.close().unwrap();
    assert!(VersionedStore::open(config).is_ok());
}

#[test]
fn test_open_on_file_path_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let err = VersionedStore::open_path(&blocker).err().unwrap();

    assert!(matches!(err, StoreError::StorageUnavailable { .. }));
}

#[test]
fn test_double_close_does_not_panic() {
    let (_temp, store) = setup_temp_store();

    store.close().unwrap();
    store.close().unwrap();

    assert!(matches!(store.get(b"k"), Err(StoreError::Closed)));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder()
        .data_dir(temp_dir.path())
        .file_name("")
        .build();

    assert!(matches!(VersionedStore::open(config), Err(StoreError::Config(_))));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_highest_stamp_wins() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    // Every thread writes stamps from a disjoint residue class, interleaved
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50u64 {
                    let ticks = i * 8 + t + 1;
                    store
                        .conditional_set(b"hot", ticks.to_be_bytes().to_vec(), stamp(ticks))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let envelope = store.get(b"hot").unwrap().into_envelope().unwrap();
    assert_eq!(envelope.stamp().timestamp(), 400);
    assert_eq!(envelope.payload().as_ref(), &400u64.to_be_bytes()[..]);
}

#[test]
fn test_concurrent_writers_exactly_one_applies_per_stamp() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    // All threads race the same stamp: the first to commit wins, every
    // other write ties and is superseded
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .conditional_set(b"race", format!("writer-{}", t), stamp(7))
                    .unwrap()
            })
        })
        .collect();

    let applied = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(WriteOutcome::is_applied)
        .count();

    assert_eq!(applied, 1);
}

#[test]
fn test_readers_never_see_partial_envelopes() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);
    let generator = Arc::new(StampGenerator::with_node(1, 1));

    store.conditional_set(b"k", vec![0u8; 4096], generator.next()).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        let generator = Arc::clone(&generator);
        thread::spawn(move || {
            for i in 1..=100u8 {
                store.conditional_set(b"k", vec![i; 4096], generator.next()).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let envelope = store.get(b"k").unwrap().into_envelope().unwrap();
                    let first = envelope.payload()[0];
                    assert_eq!(envelope.payload().len(), 4096);
                    assert!(envelope.payload().iter().all(|&b| b == first));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
