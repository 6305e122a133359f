//! Shared builders for protocol tests.
//!
//! Both test binaries compile this module; not every binary uses every
//! helper.
#![allow(dead_code)]

use chardid_core::application::Processor;
use chardid_core::domain::codec::{
    create_suffix, deactivate_message, delta_preimage_recover, delta_preimage_update, document_digest, encode_operation,
};
use chardid_core::domain::commitment::{reveal_value, single_commitment};
use chardid_core::domain::document::{PURPOSE_AUTHENTICATION, PURPOSE_ASSERTION};
use chardid_core::domain::{
    CreateOp, DeactivateOp, Delta, KeyType, Keypair, MemberReveal, Operation, Patch, PopRegistry, Proof, PublicKey, RecoverOp,
    ServiceEndpoint, SingleReveal, ThresholdParams, UpdateOp, VerificationMethod,
};
use chardid_core::foundation::util::encoding::sha256;
use chardid_core::foundation::{DidSuffix, Hash32};
use chardid_core::infrastructure::keys::ChainKeys;
use chardid_core::infrastructure::rpc::MockBallotLog;
use chardid_core::infrastructure::storage::MemoryStore;
use std::sync::Arc;

pub fn ed_keypair(seed: u8) -> Keypair {
    Keypair::from_secret(KeyType::Ed25519, &[seed; 32]).expect("keypair")
}

pub fn zero_key() -> PublicKey {
    PublicKey::new(KeyType::Ed25519, vec![0; 32]).expect("key")
}

pub fn method(id: &str, key: PublicKey) -> VerificationMethod {
    VerificationMethod { id: id.to_string(), key, purposes: PURPOSE_AUTHENTICATION }
}

pub fn assertion_method(id: &str, key: PublicKey) -> VerificationMethod {
    VerificationMethod { id: id.to_string(), key, purposes: PURPOSE_ASSERTION }
}

pub fn api_service(id: &str) -> ServiceEndpoint {
    ServiceEndpoint { id: id.to_string(), service_type: "API".to_string(), endpoint: "https://example.com".to_string() }
}

/// Single-mode CREATE whose update chain is controlled by `update_keypair`
/// and recovery chain by `recovery_keypair`. The document carries one
/// all-zeros authentication key `k1`.
pub fn create_op(update_keypair: &Keypair, recovery_keypair: &Keypair) -> Operation {
    let methods = vec![method("k1", zero_key())];
    let services = vec![];
    Operation::Create(CreateOp {
        suffix_data_hash: document_digest(&methods, &services).expect("digest"),
        update_commitment: single_commitment(&update_keypair.public_key()),
        recovery_commitment: single_commitment(&recovery_keypair.public_key()),
        threshold: None,
        verification_methods: methods,
        services,
    })
}

pub fn create_payload(update_keypair: &Keypair, recovery_keypair: &Keypair) -> Vec<u8> {
    encode_operation(&create_op(update_keypair, recovery_keypair)).expect("encode create")
}

pub fn suffix_of(payload: &[u8]) -> DidSuffix {
    create_suffix(payload).expect("suffix")
}

/// Single-mode UPDATE signed by `signer`, adding `patches` and rotating the
/// update commitment to `next_keypair`'s commitment.
pub fn update_payload(suffix: DidSuffix, signer: &Keypair, next_keypair: &Keypair, patches: Vec<Patch>) -> Vec<u8> {
    let delta = Delta { patches };
    let new_commitment = single_commitment(&next_keypair.public_key());
    let message = sha256(&delta_preimage_update(&new_commitment, &delta).expect("preimage"));
    let key = signer.public_key();
    let op = Operation::Update(UpdateOp {
        suffix,
        proof: Proof::Single(SingleReveal {
            reveal_value: reveal_value(&key),
            key,
            signature: signer.sign(&message).expect("sign"),
        }),
        new_update_commitment: new_commitment,
        delta,
    });
    encode_operation(&op).expect("encode update")
}

/// Single-mode RECOVER signed by `signer` (the recovery chain key).
pub fn recover_payload(
    suffix: DidSuffix,
    signer: &Keypair,
    next_update: &Keypair,
    next_recovery: &Keypair,
    patches: Vec<Patch>,
) -> Vec<u8> {
    let delta = Delta { patches };
    let new_update = single_commitment(&next_update.public_key());
    let new_recovery = single_commitment(&next_recovery.public_key());
    let message = sha256(&delta_preimage_recover(&new_update, &new_recovery, None, &delta).expect("preimage"));
    let key = signer.public_key();
    let op = Operation::Recover(RecoverOp {
        suffix,
        proof: Proof::Single(SingleReveal {
            reveal_value: reveal_value(&key),
            key,
            signature: signer.sign(&message).expect("sign"),
        }),
        new_update_commitment: new_update,
        new_recovery_commitment: new_recovery,
        new_threshold: None,
        delta,
    });
    encode_operation(&op).expect("encode recover")
}

/// Single-mode DEACTIVATE signed by `signer` (the recovery chain key).
pub fn deactivate_payload(suffix: DidSuffix, signer: &Keypair) -> Vec<u8> {
    let message = deactivate_message(&suffix);
    let key = signer.public_key();
    let op = Operation::Deactivate(DeactivateOp {
        suffix,
        proof: Proof::Single(SingleReveal {
            reveal_value: reveal_value(&key),
            key,
            signature: signer.sign(&message).expect("sign"),
        }),
    });
    encode_operation(&op).expect("encode deactivate")
}

/// Threshold member reveals for the given indices, each signing `message`.
pub fn member_reveals(chain: &ChainKeys, indices: &[usize], message: &Hash32) -> Vec<MemberReveal> {
    let tree = chain.merkle_tree().expect("tree");
    indices
        .iter()
        .map(|&index| MemberReveal {
            index: index as u8,
            key: chain.keys[index].public_key(),
            siblings: tree.proof(index).expect("proof"),
            signature: chain.keys[index].sign(message).expect("sign"),
        })
        .collect()
}

/// Threshold CREATE from pre-generated chains.
pub fn threshold_create_payload(update_chain: &ChainKeys, recovery_chain: &ChainKeys, params: ThresholdParams) -> Vec<u8> {
    let methods = vec![method("k1", zero_key())];
    let op = Operation::Create(CreateOp {
        suffix_data_hash: document_digest(&methods, &[]).expect("digest"),
        update_commitment: update_chain.commitment,
        recovery_commitment: recovery_chain.commitment,
        threshold: Some(params),
        verification_methods: methods,
        services: vec![],
    });
    encode_operation(&op).expect("encode threshold create")
}

pub fn processor_over(store: Arc<MemoryStore>, log: Arc<MockBallotLog>) -> Processor {
    Processor::new(store, log, PopRegistry::new())
}

pub fn fresh_node() -> (Arc<MemoryStore>, Arc<MockBallotLog>, Processor) {
    let store = Arc::new(MemoryStore::new());
    let log = Arc::new(MockBallotLog::new());
    let processor = processor_over(store.clone(), log.clone());
    (store, log, processor)
}
