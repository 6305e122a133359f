//! RocksDB engine behavior: persistence across reopen, atomic steps, and
//! rebuild equivalence with the in-memory engine.

use crate::fixtures::*;
use chardid_core::domain::Patch;
use chardid_core::infrastructure::rpc::MockBallotLog;
use chardid_core::infrastructure::storage::{MemoryStore, ReplayStep, RocksStore, Store};
use std::sync::Arc;

fn seeded_log() -> (Arc<MockBallotLog>, chardid_core::foundation::DidSuffix) {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let log = Arc::new(MockBallotLog::new());
    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(1, update_payload(suffix, &update_key, &ed_keypair(0x33), vec![Patch::AddServices(vec![api_service("api")])]));
    log.seed(2, deactivate_payload(suffix, &recovery_key));
    (log, suffix)
}

#[tokio::test]
async fn test_rocks_when_reopened_then_state_and_cursor_survive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (log, suffix) = seeded_log();

    {
        let store = Arc::new(RocksStore::open_in_dir(dir.path()).expect("open"));
        let processor = processor_rocks(store.clone(), log.clone());
        processor.sync_available().await.expect("sync");
        assert_eq!(store.last_applied_ballot().expect("cursor"), 2);
    }

    let reopened = RocksStore::open_in_dir(dir.path()).expect("reopen");
    assert_eq!(reopened.last_applied_ballot().expect("cursor"), 2);
    let record = reopened.get_did(&suffix).expect("get").expect("record");
    assert_eq!(record.deactivated_at_ballot, Some(2));
    assert_eq!(reopened.operations_for_did(&suffix).expect("ops").len(), 3);
}

#[tokio::test]
async fn test_rocks_when_rebuilt_from_log_then_matches_memory_engine() {
    // The store is a materialized view: replaying the same log into a
    // fresh RocksDB and a fresh MemoryStore yields identical records.
    let dir = tempfile::tempdir().expect("tempdir");
    let (log, suffix) = seeded_log();

    let rocks = Arc::new(RocksStore::open_in_dir(dir.path()).expect("open"));
    processor_rocks(rocks.clone(), log.clone()).sync_available().await.expect("rocks sync");

    let memory = Arc::new(MemoryStore::new());
    processor_over(memory.clone(), log.clone()).sync_available().await.expect("memory sync");

    assert_eq!(
        rocks.get_did(&suffix).expect("rocks").expect("record"),
        memory.get_did(&suffix).expect("memory").expect("record")
    );
    assert_eq!(rocks.status().expect("rocks status"), memory.status().expect("memory status"));
    for ballot in 0..=2 {
        assert_eq!(rocks.get_operation(ballot).expect("rocks op"), memory.get_operation(ballot).expect("memory op"));
    }
}

#[test]
fn test_rocks_when_cursor_only_step_then_no_audit_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = RocksStore::open_in_dir(dir.path()).expect("open");
    store.commit_step(ReplayStep { ballot: 5, operation: None, did_update: None }).expect("commit");
    assert_eq!(store.last_applied_ballot().expect("cursor"), 5);
    assert!(store.get_operation(5).expect("get").is_none());
    assert_eq!(store.status().expect("status").operation_count, 0);
}

#[test]
fn test_rocks_when_fresh_then_cursor_is_minus_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = RocksStore::open_in_dir(dir.path()).expect("open");
    assert_eq!(store.last_applied_ballot().expect("cursor"), -1);
    assert!(store.list_dids().expect("dids").is_empty());
}

fn processor_rocks(store: Arc<RocksStore>, log: Arc<MockBallotLog>) -> chardid_core::application::Processor {
    chardid_core::application::Processor::new(store, log, chardid_core::domain::PopRegistry::new())
}
