//! Merkle commitments for M-of-N threshold sets.
//!
//! Binary tree with fixed left/right order. Leaves are per-key
//! commitments, padded up to the next power of two with `H("")`. Internal
//! node value is `H(left ‖ right)`.
//!
//! The verifier is the normative piece; the builder is derived from it and
//! cross-checked in tests for N in {1, 2, 3, 5, 8, 99}.

use crate::foundation::util::encoding::{sha256, sha256_concat};
use crate::foundation::{DidError, Hash32, Result};

/// Reserved leaf filling padded slots: `H(empty_string)`.
pub fn padding_leaf() -> Hash32 {
    sha256(b"")
}

/// Proof length for an N-leaf set: depth of the padded tree.
pub fn expected_depth(n: u8) -> usize {
    let padded = (n as usize).max(1).next_power_of_two();
    padded.trailing_zeros() as usize
}

/// Folds a proof from `leaf` at `index` up to the root.
///
/// ```text
/// cur = leaf, idx = index
/// for s in siblings:
///     cur = H(cur ‖ s) if idx even else H(s ‖ cur)
///     idx = idx / 2
/// accept if cur == root
/// ```
pub fn verify_proof(leaf: &Hash32, index: u8, siblings: &[Hash32], root: &Hash32) -> bool {
    let mut cur = *leaf;
    let mut idx = index as usize;
    for sibling in siblings {
        cur = if idx % 2 == 0 { sha256_concat(&[&cur, sibling]) } else { sha256_concat(&[sibling, &cur]) };
        idx /= 2;
    }
    cur == *root
}

/// Full tree over a leaf set, for commitment roots and proof generation on
/// the authoring side.
pub struct MerkleTree {
    /// `levels[0]` is the padded leaf row; the last level is the root.
    levels: Vec<Vec<Hash32>>,
    leaf_count: usize,
}

impl MerkleTree {
    pub fn from_leaves(leaves: &[Hash32]) -> Result<Self> {
        if leaves.is_empty() {
            return Err(DidError::Message("merkle tree requires at least one leaf".to_string()));
        }
        if leaves.len() > 255 {
            return Err(DidError::LengthOverflow { field: "merkle leaves", len: leaves.len(), max: 255 });
        }
        let padded_len = leaves.len().next_power_of_two();
        let mut level: Vec<Hash32> = leaves.to_vec();
        level.resize(padded_len, padding_leaf());

        let mut levels = vec![level];
        while levels.last().map(Vec::len) != Some(1) {
            let prev = levels.last().expect("at least one level");
            let next: Vec<Hash32> = prev.chunks(2).map(|pair| sha256_concat(&[&pair[0], &pair[1]])).collect();
            levels.push(next);
        }
        Ok(Self { levels, leaf_count: leaves.len() })
    }

    pub fn root(&self) -> Hash32 {
        self.levels.last().expect("root level")[0]
    }

    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Siblings bottom-up for the leaf at `index`. Proofs are only issued
    /// for real leaves, never for padded slots.
    pub fn proof(&self, index: usize) -> Result<Vec<Hash32>> {
        if index >= self.leaf_count {
            return Err(DidError::MerkleProofInvalid { index: index.min(u8::MAX as usize) as u8 });
        }
        let mut siblings = Vec::with_capacity(self.depth());
        let mut idx = index;
        for level in &self.levels[..self.depth()] {
            let sibling_idx = idx ^ 1;
            siblings.push(level[sibling_idx]);
            idx /= 2;
        }
        Ok(siblings)
    }
}
