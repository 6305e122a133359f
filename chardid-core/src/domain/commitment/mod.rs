//! Hash-of-hash reveal scheme.
//!
//! For a public key `pk`: reveal `r = H(canonical(pk))`, commitment (and
//! Merkle leaf) `H(r)`. Disclosing `r` plus a signature from `pk`
//! authorizes the next operation in a chain.

pub mod merkle;

use crate::domain::keys::PublicKey;
use crate::foundation::util::encoding::sha256;
use crate::foundation::Hash32;
use serde::{Deserialize, Serialize};

pub use merkle::{expected_depth, padding_leaf, verify_proof, MerkleTree};

pub fn reveal_value(key: &PublicKey) -> Hash32 {
    sha256(&key.canonical_bytes())
}

pub fn commitment_from_reveal(reveal: &Hash32) -> Hash32 {
    sha256(reveal)
}

/// Single-mode commitment: `H(H(canonical(pk)))`. Identical to the Merkle
/// leaf for the same key.
pub fn single_commitment(key: &PublicKey) -> Hash32 {
    commitment_from_reveal(&reveal_value(key))
}

pub fn leaf_for_key(key: &PublicKey) -> Hash32 {
    single_commitment(key)
}

pub fn reveal_matches(reveal: &Hash32, commitment: &Hash32) -> bool {
    commitment_from_reveal(reveal) == *commitment
}

/// How one authority chain (update or recovery) is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentMode {
    Single,
    Threshold { m: u8, n: u8 },
}

/// Current commitment of one chain, as held in a DID record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentState {
    pub commitment: Hash32,
    pub mode: CommitmentMode,
}
