//! Client-side authoring driven end to end: payloads built from key files
//! must survive the validator when replayed.

use crate::fixtures::*;
use chardid_core::application::{AuthoringService, NewDidParams};
use chardid_core::domain::document::PURPOSE_AUTHENTICATION;
use chardid_core::domain::{DidStatus, KeyType, Patch, PublicKey, ThresholdParams, VerificationMethod};
use chardid_core::infrastructure::keys::KeyFile;
use chardid_core::infrastructure::storage::Store;

fn new_did_params() -> NewDidParams {
    NewDidParams {
        key_type: KeyType::Ed25519,
        threshold: None,
        verification_methods: vec![VerificationMethod {
            id: "k1".to_string(),
            key: PublicKey::new(KeyType::Ed25519, vec![0; 32]).expect("key"),
            purposes: PURPOSE_AUTHENTICATION,
        }],
        services: vec![],
    }
}

#[tokio::test]
async fn test_authoring_when_create_then_update_then_both_replay_cleanly() {
    let keys = tempfile::tempdir().expect("tempdir");
    let authoring = AuthoringService::new(keys.path());
    let (store, log, processor) = fresh_node();

    let created = authoring.prepare_create(new_did_params()).expect("create");
    log.seed(0, created.payload.clone());
    processor.sync_available().await.expect("sync");
    authoring.confirm(&created.did, 0).expect("confirm");
    assert_eq!(store.get_did(&created.suffix).expect("get").expect("record").status, DidStatus::Active);

    let update = authoring
        .prepare_update(&created.did, vec![Patch::AddServices(vec![api_service("api")])])
        .expect("update");
    log.seed(1, update.payload.clone());
    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.applied, 1);
    authoring.confirm(&created.did, 1).expect("confirm");

    let record = store.get_did(&created.suffix).expect("get").expect("record");
    assert_eq!(record.document.services.len(), 1);
    // The rotated key file now matches the on-chain commitment, so a
    // second update keeps working.
    let key_file = KeyFile::load(&created.did, keys.path()).expect("load");
    assert_eq!(key_file.update.commitment, record.update_chain.commitment);

    let second = authoring
        .prepare_update(&created.did, vec![Patch::RemoveServices(vec!["api".to_string()])])
        .expect("second update");
    log.seed(2, second.payload.clone());
    assert_eq!(processor.sync_available().await.expect("sync").applied, 1);
    assert!(store.get_did(&created.suffix).expect("get").expect("record").document.services.is_empty());
}

#[tokio::test]
async fn test_authoring_when_threshold_did_then_quorum_update_replays() {
    let keys = tempfile::tempdir().expect("tempdir");
    let authoring = AuthoringService::new(keys.path());
    let (store, log, processor) = fresh_node();

    let mut params = new_did_params();
    params.threshold = Some(ThresholdParams { update_m: 3, update_n: 5, recovery_m: 2, recovery_n: 3 });
    let created = authoring.prepare_create(params).expect("create");
    log.seed(0, created.payload.clone());
    processor.sync_available().await.expect("sync");

    let update = authoring
        .prepare_update(&created.did, vec![Patch::AddServices(vec![api_service("api")])])
        .expect("update");
    log.seed(1, update.payload.clone());
    let progress = processor.sync_available().await.expect("sync");
    assert_eq!(progress.applied, 1);
    assert_eq!(store.get_did(&created.suffix).expect("get").expect("record").document.services.len(), 1);
}

#[tokio::test]
async fn test_authoring_when_losing_race_then_abandon_keeps_epoch_working() {
    let keys = tempfile::tempdir().expect("tempdir");
    let authoring = AuthoringService::new(keys.path());
    let (store, log, processor) = fresh_node();

    let created = authoring.prepare_create(new_did_params()).expect("create");
    log.seed(0, created.payload.clone());
    processor.sync_available().await.expect("sync");
    authoring.confirm(&created.did, 0).expect("confirm");

    // First attempt never lands; the client abandons its pending epoch.
    let _lost = authoring.prepare_update(&created.did, vec![Patch::AddServices(vec![api_service("lost")])]).expect("lost");
    authoring.abandon(&created.did).expect("abandon");

    // The retry from the same (still current) epoch validates fine.
    let retry = authoring.prepare_update(&created.did, vec![Patch::AddServices(vec![api_service("won")])]).expect("retry");
    log.seed(1, retry.payload.clone());
    assert_eq!(processor.sync_available().await.expect("sync").applied, 1);
    let record = store.get_did(&created.suffix).expect("get").expect("record");
    assert_eq!(record.document.services[0].id, "won");
}

#[tokio::test]
async fn test_authoring_when_recover_then_fresh_chains_take_over() {
    let keys = tempfile::tempdir().expect("tempdir");
    let authoring = AuthoringService::new(keys.path());
    let (store, log, processor) = fresh_node();

    let created = authoring.prepare_create(new_did_params()).expect("create");
    log.seed(0, created.payload.clone());
    processor.sync_available().await.expect("sync");

    let recover = authoring
        .prepare_recover(&created.did, vec![Patch::AddServices(vec![api_service("rebuilt")])], None)
        .expect("recover");
    log.seed(1, recover.payload.clone());
    assert_eq!(processor.sync_available().await.expect("sync").applied, 1);
    authoring.confirm(&created.did, 1).expect("confirm");

    // After recovery the new update chain authorizes updates.
    let update = authoring.prepare_update(&created.did, vec![Patch::RemoveServices(vec!["rebuilt".to_string()])]).expect("update");
    log.seed(2, update.payload.clone());
    assert_eq!(processor.sync_available().await.expect("sync").applied, 1);
    let record = store.get_did(&created.suffix).expect("get").expect("record");
    assert!(record.document.services.is_empty());

    // Recovery replaced the document outright.
    assert!(record.document.verification_methods.is_empty());
}

#[tokio::test]
async fn test_authoring_when_deactivate_then_did_terminal() {
    let keys = tempfile::tempdir().expect("tempdir");
    let authoring = AuthoringService::new(keys.path());
    let (store, log, processor) = fresh_node();

    let created = authoring.prepare_create(new_did_params()).expect("create");
    log.seed(0, created.payload.clone());
    processor.sync_available().await.expect("sync");

    let deactivate = authoring.prepare_deactivate(&created.did).expect("deactivate");
    log.seed(1, deactivate.payload.clone());
    assert_eq!(processor.sync_available().await.expect("sync").applied, 1);
    assert_eq!(store.get_did(&created.suffix).expect("get").expect("record").status, DidStatus::Deactivated);
}
