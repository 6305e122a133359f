//! End-to-end replay scenarios over a mock ballot log and the in-memory
//! store.

use crate::fixtures::*;
use chardid_core::application::{Resolution, Resolver, StepOutcome};
use chardid_core::domain::codec::envelope::{wrap_slot, wrap_vote};
use chardid_core::domain::commitment::single_commitment;
use chardid_core::domain::{DidStatus, Patch, VerificationMethod};
use chardid_core::infrastructure::storage::Store;

#[tokio::test]
async fn test_replay_when_create_then_did_active() {
    // Ballot 0 carries a CREATE; afterwards the DID resolves with exactly
    // the initial document and the cursor sits on ballot 0.
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);

    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.applied, 1);

    let record = store.get_did(&suffix).expect("get").expect("record");
    assert_eq!(record.status, DidStatus::Active);
    assert_eq!(record.document.verification_methods.len(), 1);
    assert_eq!(record.document.verification_methods[0].id, "k1");
    assert_eq!(record.update_chain.commitment, single_commitment(&update_key.public_key()));
    assert_eq!(store.last_applied_ballot().expect("cursor"), 0);
}

#[tokio::test]
async fn test_replay_when_update_then_service_added_and_commitment_rotated() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let next_update_key = ed_keypair(0x33);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(1, update_payload(suffix, &update_key, &next_update_key, vec![Patch::AddServices(vec![api_service("api")])]));

    processor.sync_available().await.expect("sync");

    let record = store.get_did(&suffix).expect("get").expect("record");
    assert_eq!(record.document.services.len(), 1);
    assert_eq!(record.document.services[0].endpoint, "https://example.com");
    assert_eq!(record.document.verification_methods.len(), 1);
    assert_eq!(record.update_chain.commitment, single_commitment(&next_update_key.public_key()));
    assert_eq!(record.recovery_chain.commitment, single_commitment(&recovery_key.public_key()));
    assert_eq!(record.last_operation_ballot, 1);
}

#[tokio::test]
async fn test_replay_when_update_signed_by_wrong_key_then_invalid_for_audit() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let next_update_key = ed_keypair(0x33);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(1, update_payload(suffix, &update_key, &next_update_key, vec![Patch::AddServices(vec![api_service("api")])]));
    processor.sync_available().await.expect("sync");
    let after_good_update = store.get_did(&suffix).expect("get").expect("record");

    // Ballot 2: same shape but signed by the recovery key.
    log.seed(2, update_payload(suffix, &recovery_key, &ed_keypair(0x44), vec![Patch::AddServices(vec![api_service("evil")])]));
    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.invalid, 1);

    // DID state identical to after the valid update.
    assert_eq!(store.get_did(&suffix).expect("get").expect("record"), after_good_update);

    // The audit log still shows ballot 2, marked invalid.
    let audit = store.get_operation(2).expect("get").expect("entry");
    assert!(!audit.valid);
    assert_eq!(store.last_applied_ballot().expect("cursor"), 2);
}

#[tokio::test]
async fn test_replay_when_patch_breaks_document_invariants_then_invalid_for_audit() {
    // The proof is genuine, but the patched document would carry reserved
    // purpose bits; the fold refuses it the same way CREATE would.
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    processor.sync_available().await.expect("sync");
    let before = store.get_did(&suffix).expect("get").expect("record");

    let bad_key = VerificationMethod { id: "k2".to_string(), key: zero_key(), purposes: 0x20 };
    log.seed(1, update_payload(suffix, &update_key, &ed_keypair(0x33), vec![Patch::AddKeys(vec![bad_key])]));
    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.invalid, 1);

    assert_eq!(store.get_did(&suffix).expect("get").expect("record"), before);
    let audit = store.get_operation(1).expect("get").expect("entry");
    assert!(!audit.valid);
    assert!(audit.summary.contains("apply"));
}

#[tokio::test]
async fn test_replay_when_deactivate_then_tombstone_and_absorption() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(1, deactivate_payload(suffix, &recovery_key));
    processor.sync_available().await.expect("sync");

    let record = store.get_did(&suffix).expect("get").expect("record");
    assert_eq!(record.status, DidStatus::Deactivated);
    assert_eq!(record.deactivated_at_ballot, Some(1));
    let frozen = record.clone();

    // A later UPDATE against the dead DID changes nothing (commitments
    // included) and lands in the audit log as invalid.
    log.seed(2, update_payload(suffix, &update_key, &ed_keypair(0x55), vec![Patch::AddServices(vec![api_service("x")])]));
    processor.sync_available().await.expect("sync");
    assert_eq!(store.get_did(&suffix).expect("get").expect("record"), frozen);
    assert!(!store.get_operation(2).expect("get").expect("entry").valid);

    // Resolver returns the tombstone with the last active document.
    let resolver = Resolver::new(store.clone());
    match resolver.resolve(&suffix.to_uri()).expect("resolve") {
        Resolution::Deactivated(tombstone) => {
            assert_eq!(tombstone.deactivated_at_ballot, 1);
            assert_eq!(tombstone.last_document, frozen.document);
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[tokio::test]
async fn test_replay_when_recover_then_document_replaced() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(
        1,
        recover_payload(
            suffix,
            &recovery_key,
            &ed_keypair(0x44),
            &ed_keypair(0x55),
            vec![Patch::AddKeys(vec![assertion_method("fresh", zero_key())])],
        ),
    );
    processor.sync_available().await.expect("sync");

    let record = store.get_did(&suffix).expect("get").expect("record");
    // Replacement, not patching: k1 from the initial document is gone.
    assert_eq!(record.document.verification_methods.len(), 1);
    assert_eq!(record.document.verification_methods[0].id, "fresh");
    assert_eq!(record.update_chain.commitment, single_commitment(&ed_keypair(0x44).public_key()));
    assert_eq!(record.recovery_chain.commitment, single_commitment(&ed_keypair(0x55).public_key()));
}

#[tokio::test]
async fn test_replay_when_enveloped_payloads_then_stripped() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, wrap_slot(&create));
    log.seed(1, wrap_vote(1, &update_payload(suffix, &update_key, &ed_keypair(0x33), vec![Patch::AddServices(vec![api_service("api")])])));

    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.applied, 2);
    assert_eq!(store.get_did(&suffix).expect("get").expect("record").document.services.len(), 1);
}

#[tokio::test]
async fn test_replay_when_non_did_ballots_then_silently_skipped() {
    let (store, log, processor) = fresh_node();
    log.seed_empty(0);
    log.seed(1, vec![0x01, 0x02, 0x03]); // unknown version
    log.seed(2, vec![0x00, 0xFF]); // unparseable envelope
    let create = create_payload(&ed_keypair(0x11), &ed_keypair(0x22));
    let suffix = suffix_of(&create);
    log.seed(3, create);

    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.skipped, 3);
    assert_eq!(progress.applied, 1);
    assert_eq!(store.last_applied_ballot().expect("cursor"), 3);
    // Silent skips leave no audit entries.
    assert!(store.get_operation(0).expect("get").is_none());
    assert!(store.get_operation(1).expect("get").is_none());
    assert!(store.get_did(&suffix).expect("get").is_some());
}

#[tokio::test]
async fn test_replay_when_malformed_did_payload_then_audited_invalid() {
    let (store, log, processor) = fresh_node();
    // Compact version and a valid op tag, then garbage.
    log.seed(0, vec![0x02, 0x01, 0x00, 0xAA, 0xBB]);
    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.invalid, 1);
    let audit = store.get_operation(0).expect("get").expect("entry");
    assert!(!audit.valid);
    assert!(audit.summary.contains("codec"));
}

#[tokio::test]
async fn test_replay_when_log_read_fails_then_cursor_not_advanced() {
    let update_key = ed_keypair(0x11);
    let (store, log, processor) = fresh_node();
    let create = create_payload(&update_key, &ed_keypair(0x22));
    log.seed(0, create);

    // More consecutive failures than one pass's retry budget (5), but few
    // enough that the second pass gets through.
    log.fail_next_reads(7);
    assert!(processor.sync_available().await.is_err());
    assert_eq!(store.last_applied_ballot().expect("cursor"), -1);

    // Next pass succeeds and resumes exactly where it left off.
    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.applied, 1);
    assert_eq!(store.last_applied_ballot().expect("cursor"), 0);
}

#[tokio::test]
async fn test_replay_when_run_twice_then_idempotent() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(1, update_payload(suffix, &update_key, &ed_keypair(0x33), vec![Patch::AddServices(vec![api_service("api")])]));

    processor.sync_available().await.expect("first pass");
    let record = store.get_did(&suffix).expect("get").expect("record");
    let status = store.status().expect("status");

    // Second pass over the same log: nothing new to do, nothing changes.
    let progress = processor.sync_available().await.expect("second pass");
    assert_eq!(progress.processed, 0);
    assert_eq!(store.get_did(&suffix).expect("get").expect("record"), record);
    assert_eq!(store.status().expect("status"), status);
    assert_eq!(status.operation_count, 2);
}

#[tokio::test]
async fn test_replay_when_processed_ballot_by_ballot_then_same_outcomes() {
    let update_key = ed_keypair(0x11);
    let recovery_key = ed_keypair(0x22);
    let (_store, log, processor) = fresh_node();

    let create = create_payload(&update_key, &recovery_key);
    let suffix = suffix_of(&create);
    log.seed(0, create);
    log.seed(1, deactivate_payload(suffix, &recovery_key));

    assert_eq!(processor.process_ballot(0).await.expect("step"), StepOutcome::Applied);
    assert_eq!(processor.process_ballot(1).await.expect("step"), StepOutcome::Applied);
}
