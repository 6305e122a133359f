//! Authoring helpers: build well-formed operation payloads from a local
//! keying record and rotate that record ahead of submission.
//!
//! Entirely client-side. Never consults or mutates the store; the only
//! guarantee is that an emitted payload, if it wins its ballot, passes the
//! validator against the state the client knew about. A concurrent author
//! winning first simply makes this payload an invalid-for-audit ballot.

use crate::domain::codec::{
    create_suffix, deactivate_message, delta_preimage_recover, delta_preimage_update, document_digest, encode_operation,
};
use crate::domain::commitment::{reveal_value, CommitmentMode};
use crate::domain::{
    CreateOp, DeactivateOp, Delta, KeyType, MemberReveal, Operation, Patch, Proof, RecoverOp, ServiceEndpoint, SingleReveal,
    ThresholdParams, UpdateOp, VerificationMethod,
};
use crate::foundation::util::encoding::sha256;
use crate::foundation::{DidError, DidSuffix, Hash32, Result};
use crate::infrastructure::keys::{ChainKeys, KeyFile};
use log::{debug, info};
use std::path::PathBuf;

pub struct NewDidParams {
    pub key_type: KeyType,
    pub threshold: Option<ThresholdParams>,
    pub verification_methods: Vec<VerificationMethod>,
    pub services: Vec<ServiceEndpoint>,
}

#[derive(Clone, Debug)]
pub struct PreparedOperation {
    pub did: String,
    pub suffix: DidSuffix,
    pub payload: Vec<u8>,
}

pub struct AuthoringService {
    keys_dir: PathBuf,
}

impl AuthoringService {
    pub fn new(keys_dir: impl Into<PathBuf>) -> Self {
        Self { keys_dir: keys_dir.into() }
    }

    /// Builds a CREATE payload and writes the new DID's key file. The file
    /// is on disk before the payload is handed back for submission.
    pub fn prepare_create(&self, params: NewDidParams) -> Result<PreparedOperation> {
        let (update, recovery) = match params.threshold {
            Some(t) => {
                t.check()?;
                (
                    ChainKeys::generate_threshold(params.key_type, t.update_m, t.update_n)?,
                    ChainKeys::generate_threshold(params.key_type, t.recovery_m, t.recovery_n)?,
                )
            }
            None => (ChainKeys::generate_single(params.key_type)?, ChainKeys::generate_single(params.key_type)?),
        };

        let op = Operation::Create(CreateOp {
            suffix_data_hash: document_digest(&params.verification_methods, &params.services)?,
            update_commitment: update.commitment,
            recovery_commitment: recovery.commitment,
            threshold: params.threshold,
            verification_methods: params.verification_methods,
            services: params.services,
        });
        let payload = encode_operation(&op)?;
        let suffix = create_suffix(&payload)?;

        let key_file = KeyFile::new(&suffix, update, recovery);
        key_file.save(&self.keys_dir)?;
        info!("prepared create did={}", suffix.to_uri());
        Ok(PreparedOperation { did: suffix.to_uri(), suffix, payload })
    }

    /// Builds an UPDATE payload, persisting the next update epoch as
    /// pending before returning.
    pub fn prepare_update(&self, did: &str, patches: Vec<Patch>) -> Result<PreparedOperation> {
        let suffix = DidSuffix::parse_did(did)?;
        let mut key_file = KeyFile::load(did, &self.keys_dir)?;

        let next = key_file.update.next_epoch()?;
        let delta = Delta { patches };
        let preimage = delta_preimage_update(&next.commitment, &delta)?;
        let message = sha256(&preimage);
        let proof = build_proof(&key_file.update, &message)?;

        let op = Operation::Update(UpdateOp { suffix, proof, new_update_commitment: next.commitment, delta });
        let payload = encode_operation(&op)?;

        key_file.pending_update = Some(next);
        key_file.save(&self.keys_dir)?;
        debug!("prepared update did={} payload_len={}", did, payload.len());
        Ok(PreparedOperation { did: did.to_string(), suffix, payload })
    }

    /// Builds a RECOVER payload. Both chains rotate; `new_threshold`
    /// switches the DID's mode (None means single-key from here on).
    pub fn prepare_recover(
        &self,
        did: &str,
        patches: Vec<Patch>,
        new_threshold: Option<ThresholdParams>,
    ) -> Result<PreparedOperation> {
        let suffix = DidSuffix::parse_did(did)?;
        let mut key_file = KeyFile::load(did, &self.keys_dir)?;
        let key_type = key_file.recovery.keys.first().map(|k| k.key_type).ok_or_else(|| {
            DidError::KeyFileMalformed(format!("{}: recovery chain has no keys", did))
        })?;

        let (next_update, next_recovery) = match new_threshold {
            Some(t) => {
                t.check()?;
                (
                    ChainKeys::generate_threshold(key_type, t.update_m, t.update_n)?,
                    ChainKeys::generate_threshold(key_type, t.recovery_m, t.recovery_n)?,
                )
            }
            None => (ChainKeys::generate_single(key_type)?, ChainKeys::generate_single(key_type)?),
        };

        let delta = Delta { patches };
        let preimage =
            delta_preimage_recover(&next_update.commitment, &next_recovery.commitment, new_threshold.as_ref(), &delta)?;
        let message = sha256(&preimage);
        let proof = build_proof(&key_file.recovery, &message)?;

        let op = Operation::Recover(RecoverOp {
            suffix,
            proof,
            new_update_commitment: next_update.commitment,
            new_recovery_commitment: next_recovery.commitment,
            new_threshold,
            delta,
        });
        let payload = encode_operation(&op)?;

        key_file.pending_update = Some(next_update);
        key_file.pending_recovery = Some(next_recovery);
        key_file.save(&self.keys_dir)?;
        debug!("prepared recover did={} payload_len={}", did, payload.len());
        Ok(PreparedOperation { did: did.to_string(), suffix, payload })
    }

    /// Builds a DEACTIVATE payload. Nothing rotates; the DID is being
    /// retired.
    pub fn prepare_deactivate(&self, did: &str) -> Result<PreparedOperation> {
        let suffix = DidSuffix::parse_did(did)?;
        let key_file = KeyFile::load(did, &self.keys_dir)?;

        let message = deactivate_message(&suffix);
        let proof = build_proof(&key_file.recovery, &message)?;
        let op = Operation::Deactivate(DeactivateOp { suffix, proof });
        let payload = encode_operation(&op)?;
        debug!("prepared deactivate did={}", did);
        Ok(PreparedOperation { did: did.to_string(), suffix, payload })
    }

    /// Promotes pending chains once the submitted ballot confirmed.
    pub fn confirm(&self, did: &str, ballot: i64) -> Result<()> {
        let mut key_file = KeyFile::load(did, &self.keys_dir)?;
        key_file.confirm_rotation(ballot);
        key_file.save(&self.keys_dir)
    }

    /// Drops pending chains after a lost race or failed submission.
    pub fn abandon(&self, did: &str) -> Result<()> {
        let mut key_file = KeyFile::load(did, &self.keys_dir)?;
        key_file.abandon_rotation();
        key_file.save(&self.keys_dir)
    }

    pub fn keys_dir(&self) -> &PathBuf {
        &self.keys_dir
    }
}

/// Proof from the chain's current epoch: the single key, or the first M
/// members of the threshold set with their Merkle paths.
fn build_proof(chain: &ChainKeys, message: &Hash32) -> Result<Proof> {
    match chain.mode {
        CommitmentMode::Single => {
            let keypair = chain.keys.first().ok_or_else(|| DidError::AuthoringError("chain has no keys".to_string()))?;
            let key = keypair.public_key();
            Ok(Proof::Single(SingleReveal {
                reveal_value: reveal_value(&key),
                key,
                signature: keypair.sign(message)?,
            }))
        }
        CommitmentMode::Threshold { m, n } => {
            if chain.keys.len() != n as usize {
                return Err(DidError::AuthoringError(format!(
                    "threshold chain holds {} keys, expected {}",
                    chain.keys.len(),
                    n
                )));
            }
            let tree = chain.merkle_tree()?;
            let mut members = Vec::with_capacity(m as usize);
            for (index, keypair) in chain.keys.iter().enumerate().take(m as usize) {
                members.push(MemberReveal {
                    index: index as u8,
                    key: keypair.public_key(),
                    siblings: tree.proof(index)?,
                    signature: keypair.sign(message)?,
                });
            }
            Ok(Proof::Threshold(members))
        }
    }
}
