//! Operation predicates.
//!
//! Evaluated by the replay processor against the store state immediately
//! before the operation's ballot. Pure: the verdict depends only on the
//! decoded operation, its payload bytes, the prior record, and the
//! proof-of-possession registry. A failure invalidates the single ballot
//! and is recorded for audit; it never stops replay.

use crate::domain::codec::{create_suffix, deactivate_message, delta_preimage_recover, delta_preimage_update};
use crate::domain::commitment::{
    commitment_from_reveal, expected_depth, leaf_for_key, reveal_matches, reveal_value, verify_proof, CommitmentMode, CommitmentState,
};
use crate::domain::document::DidDocument;
use crate::domain::keys::PublicKey;
use crate::domain::operation::{MemberReveal, Operation, Proof};
use crate::domain::record::{DidRecord, DidStatus};
use crate::domain::signing::{verify, verify_aggregate, PopRegistry};
use crate::foundation::util::encoding::sha256;
use crate::foundation::{DidError, DidSuffix, Hash32};
use std::collections::HashSet;

/// Checks every predicate for `op`, returning the suffix it targets (for
/// CREATE, the suffix the payload certifies).
pub fn validate(
    op: &Operation,
    payload: &[u8],
    prior: Option<&DidRecord>,
    pop: &PopRegistry,
) -> Result<DidSuffix, DidError> {
    match op {
        Operation::Create(create) => {
            let suffix = create_suffix(payload)?;
            if prior.is_some() {
                return Err(DidError::DidAlreadyExists(suffix.to_uri()));
            }
            if let Some(params) = &create.threshold {
                params.check()?;
            }
            // Uniqueness of key and service ids, purpose mask validity.
            DidDocument::new(create.verification_methods.clone(), create.services.clone())?;
            Ok(suffix)
        }
        Operation::Update(update) => {
            let record = active_record(update.suffix, prior)?;
            let preimage = delta_preimage_update(&update.new_update_commitment, &update.delta)?;
            let message = sha256(&preimage);
            check_proof(&update.proof, &record.update_chain, &message, pop)?;
            Ok(update.suffix)
        }
        Operation::Recover(recover) => {
            let record = active_record(recover.suffix, prior)?;
            if let Some(params) = &recover.new_threshold {
                params.check()?;
            }
            let preimage = delta_preimage_recover(
                &recover.new_update_commitment,
                &recover.new_recovery_commitment,
                recover.new_threshold.as_ref(),
                &recover.delta,
            )?;
            let message = sha256(&preimage);
            check_proof(&recover.proof, &record.recovery_chain, &message, pop)?;
            Ok(recover.suffix)
        }
        Operation::Deactivate(deactivate) => {
            let record = active_record(deactivate.suffix, prior)?;
            let message = deactivate_message(&deactivate.suffix);
            check_proof(&deactivate.proof, &record.recovery_chain, &message, pop)?;
            Ok(deactivate.suffix)
        }
    }
}

fn active_record<'a>(suffix: DidSuffix, prior: Option<&'a DidRecord>) -> Result<&'a DidRecord, DidError> {
    let record = prior.ok_or_else(|| DidError::DidNotFound(suffix.to_uri()))?;
    match record.status {
        DidStatus::Active => Ok(record),
        DidStatus::Deactivated => Err(DidError::StateConflict(format!("{} is deactivated", suffix.to_uri()))),
    }
}

/// Authenticates a proof against one commitment chain. The proof's wire
/// shape must match the chain's mode.
fn check_proof(proof: &Proof, chain: &CommitmentState, message: &Hash32, pop: &PopRegistry) -> Result<(), DidError> {
    match (proof, chain.mode) {
        (Proof::Single(reveal), CommitmentMode::Single) => {
            // Three-way agreement: key hashes to the carried reveal value,
            // the reveal hashes to the commitment, the signature verifies.
            if reveal_value(&reveal.key) != reveal.reveal_value {
                return Err(DidError::CommitmentMismatch);
            }
            if !reveal_matches(&reveal.reveal_value, &chain.commitment) {
                return Err(DidError::CommitmentMismatch);
            }
            if !verify(&reveal.key, message, &reveal.signature) {
                return Err(DidError::SignatureInvalid { key_type: reveal.key.key_type.to_string() });
            }
            Ok(())
        }
        (Proof::Threshold(members), CommitmentMode::Threshold { m, n }) => {
            check_distinct_indices(members.iter().map(|member| member.index))?;
            let mut valid: u8 = 0;
            for member in members {
                if member_authenticates(member, n, &chain.commitment) && verify(&member.key, message, &member.signature) {
                    valid = valid.saturating_add(1);
                }
                if valid >= m {
                    // Excess reveals beyond the first M valid are permitted
                    // and ignored.
                    return Ok(());
                }
            }
            Err(DidError::ThresholdNotMet { required: m, valid })
        }
        (Proof::Aggregated(agg), CommitmentMode::Threshold { m, n }) => {
            check_distinct_indices(agg.members.iter().map(|member| member.index))?;
            // The aggregate covers every carried member; every member must
            // authenticate against the tree.
            for member in &agg.members {
                if !member_authenticates(member, n, &chain.commitment) {
                    return Err(DidError::MerkleProofInvalid { index: member.index });
                }
            }
            if (agg.members.len() as u8) < m {
                return Err(DidError::ThresholdNotMet { required: m, valid: agg.members.len() as u8 });
            }
            let keys: Vec<PublicKey> = agg.members.iter().map(|member| member.key.clone()).collect();
            verify_aggregate(&keys, message, &agg.signature, pop)
        }
        _ => Err(DidError::StateConflict("proof shape does not match commitment mode".to_string())),
    }
}

/// Duplicate indices invalidate the whole operation, even when every
/// individual reveal is valid.
fn check_distinct_indices(indices: impl Iterator<Item = u8>) -> Result<(), DidError> {
    let mut seen = HashSet::new();
    for index in indices {
        if !seen.insert(index) {
            return Err(DidError::DuplicateRevealIndex(index));
        }
    }
    Ok(())
}

fn member_authenticates(member: &MemberReveal, n: u8, commitment: &Hash32) -> bool {
    if member.index >= n {
        return false;
    }
    if member.siblings.len() != expected_depth(n) {
        return false;
    }
    let leaf = leaf_for_key(&member.key);
    verify_proof(&leaf, member.index, &member.siblings, commitment)
}

/// Single-mode helper for authoring preflight: whether a key currently
/// authorizes a chain.
pub fn key_matches_chain(key: &PublicKey, chain: &CommitmentState) -> bool {
    matches!(chain.mode, CommitmentMode::Single) && commitment_from_reveal(&reveal_value(key)) == chain.commitment
}
