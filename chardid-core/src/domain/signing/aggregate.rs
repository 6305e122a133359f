//! BLS same-message aggregation.
//!
//! All signers in an aggregated threshold operation sign the identical
//! 32-byte message, so verification is a fast-aggregate-verify over the
//! revealed G1 keys. Because identical-message aggregation is exposed to
//! rogue-key attacks, verification refuses any signer key that does not
//! carry a recorded proof-of-possession; the registry is populated from
//! configuration at startup, enrollment itself stays out of scope.

use crate::domain::keys::{KeyType, PublicKey};
use crate::domain::signing::BLS_DST;
use crate::foundation::{DidError, Hash32, Result};
use std::collections::HashSet;

/// G1 public keys with a recorded proof-of-possession.
#[derive(Clone, Debug, Default)]
pub struct PopRegistry {
    keys: HashSet<Vec<u8>>,
}

impl PopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }

    pub fn from_hex_keys(hex_keys: &[String]) -> Result<Self> {
        let mut keys = HashSet::with_capacity(hex_keys.len());
        for entry in hex_keys {
            let bytes = hex::decode(entry.trim())?;
            if bytes.len() != KeyType::Bls12381G1.public_key_len() {
                return Err(DidError::ConfigError(format!("proof-of-possession key must be 48 bytes, got {}", bytes.len())));
            }
            keys.insert(bytes);
        }
        Ok(Self { keys })
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        key.key_type == KeyType::Bls12381G1 && self.keys.contains(&key.bytes)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Aggregates raw G2 signatures into one.
pub fn aggregate_signatures(signatures: &[Vec<u8>]) -> Result<Vec<u8>> {
    if signatures.is_empty() {
        return Err(DidError::crypto("bls aggregate", "no signatures to aggregate"));
    }
    let mut parsed = Vec::with_capacity(signatures.len());
    for bytes in signatures {
        parsed.push(
            blst::min_pk::Signature::from_bytes(bytes).map_err(|err| DidError::crypto("bls aggregate", format!("{:?}", err)))?,
        );
    }
    let refs: Vec<&blst::min_pk::Signature> = parsed.iter().collect();
    let aggregate = blst::min_pk::AggregateSignature::aggregate(&refs, true)
        .map_err(|err| DidError::crypto("bls aggregate", format!("{:?}", err)))?;
    Ok(aggregate.to_signature().to_bytes().to_vec())
}

/// Verifies one aggregate signature over the shared `message` for all
/// `keys`. Every key must be BLS G1 and present in the POP registry.
pub fn verify_aggregate(keys: &[PublicKey], message: &Hash32, signature: &[u8], pop: &PopRegistry) -> Result<()> {
    if keys.is_empty() {
        return Err(DidError::crypto("bls aggregate verify", "no signer keys"));
    }
    for key in keys {
        if key.key_type != KeyType::Bls12381G1 {
            return Err(DidError::SignatureInvalid { key_type: key.key_type.to_string() });
        }
        if !pop.contains(key) {
            return Err(DidError::ProofOfPossessionMissing);
        }
    }
    let mut parsed = Vec::with_capacity(keys.len());
    for key in keys {
        parsed.push(
            blst::min_pk::PublicKey::from_bytes(&key.bytes)
                .map_err(|_| DidError::SignatureInvalid { key_type: KeyType::Bls12381G1.to_string() })?,
        );
    }
    let refs: Vec<&blst::min_pk::PublicKey> = parsed.iter().collect();
    let sig = blst::min_pk::Signature::from_bytes(signature)
        .map_err(|_| DidError::SignatureInvalid { key_type: KeyType::Bls12381G1.to_string() })?;
    if sig.fast_aggregate_verify(true, message, BLS_DST, &refs) != blst::BLST_ERROR::BLST_SUCCESS {
        return Err(DidError::SignatureInvalid { key_type: KeyType::Bls12381G1.to_string() });
    }
    Ok(())
}
