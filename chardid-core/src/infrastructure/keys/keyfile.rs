//! Per-DID authoring record.
//!
//! One JSON file per DID under the configured keys directory, named
//! `did_char_<suffix>.json`. It holds, for each chain (update, recovery),
//! the current-epoch secret material and the commitment that material
//! satisfies. The contract with the authoring layer: the file reflects
//! the next epoch on disk before a submission returns, so a crash between
//! submission and confirmation cannot lose the next secret.
//!
//! The replay processor never reads these files.

use crate::domain::commitment::{single_commitment, CommitmentMode, MerkleTree};
use crate::domain::keys::KeyType;
use crate::domain::signing::Keypair;
use crate::foundation::{DidError, DidSuffix, Hash32, Result, NO_BALLOT_APPLIED};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Key material for one commitment chain: a single keypair, or the full
/// N-member set of a threshold commitment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainKeys {
    pub mode: CommitmentMode,
    pub keys: Vec<Keypair>,
    #[serde(with = "crate::foundation::util::serde_hex::hash32")]
    pub commitment: Hash32,
}

impl ChainKeys {
    pub fn generate_single(key_type: KeyType) -> Result<Self> {
        let keypair = Keypair::generate(key_type)?;
        let commitment = single_commitment(&keypair.public_key());
        Ok(Self { mode: CommitmentMode::Single, keys: vec![keypair], commitment })
    }

    pub fn generate_threshold(key_type: KeyType, m: u8, n: u8) -> Result<Self> {
        let mut keys = Vec::with_capacity(n as usize);
        for _ in 0..n {
            keys.push(Keypair::generate(key_type)?);
        }
        let chain = Self { mode: CommitmentMode::Threshold { m, n }, keys, commitment: [0; 32] };
        let commitment = chain.merkle_tree()?.root();
        Ok(Self { commitment, ..chain })
    }

    /// Rotated copy of this chain: fresh keys of the same shape.
    pub fn next_epoch(&self) -> Result<Self> {
        match self.mode {
            CommitmentMode::Single => Self::generate_single(self.keys[0].key_type),
            CommitmentMode::Threshold { m, n } => {
                let key_type = self.keys.first().map(|k| k.key_type).unwrap_or(KeyType::Ed25519);
                Self::generate_threshold(key_type, m, n)
            }
        }
    }

    pub fn merkle_tree(&self) -> Result<MerkleTree> {
        let leaves: Vec<Hash32> = self.keys.iter().map(|k| single_commitment(&k.public_key())).collect();
        MerkleTree::from_leaves(&leaves)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub did: String,
    pub update: ChainKeys,
    pub recovery: ChainKeys,
    /// Next-epoch material, persisted before a submission goes out. The
    /// current chain keeps authorizing until the operation is confirmed;
    /// a crash in between loses neither secret.
    #[serde(default)]
    pub pending_update: Option<ChainKeys>,
    #[serde(default)]
    pub pending_recovery: Option<ChainKeys>,
    pub created_at_ballot: i64,
    pub last_operation_ballot: i64,
}

impl KeyFile {
    pub fn new(suffix: &DidSuffix, update: ChainKeys, recovery: ChainKeys) -> Self {
        Self {
            did: suffix.to_uri(),
            update,
            recovery,
            pending_update: None,
            pending_recovery: None,
            created_at_ballot: NO_BALLOT_APPLIED,
            last_operation_ballot: NO_BALLOT_APPLIED,
        }
    }

    /// Promotes pending chains after the submitted operation was confirmed
    /// on `ballot`.
    pub fn confirm_rotation(&mut self, ballot: i64) {
        if let Some(next) = self.pending_update.take() {
            self.update = next;
        }
        if let Some(next) = self.pending_recovery.take() {
            self.recovery = next;
        }
        self.last_operation_ballot = ballot;
    }

    /// Drops pending chains after a lost authoring race; the current
    /// epoch still authorizes the next attempt.
    pub fn abandon_rotation(&mut self) {
        self.pending_update = None;
        self.pending_recovery = None;
    }

    pub fn path_for(did: &str, keys_dir: &Path) -> PathBuf {
        let suffix = did.strip_prefix("did:char:").unwrap_or(did);
        keys_dir.join(format!("did_char_{}.json", suffix))
    }

    pub fn exists(did: &str, keys_dir: &Path) -> bool {
        Self::path_for(did, keys_dir).exists()
    }

    pub fn save(&self, keys_dir: &Path) -> Result<()> {
        fs::create_dir_all(keys_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            fs::set_permissions(keys_dir, fs::Permissions::from_mode(0o700))?;
        }
        let path = Self::path_for(&self.did, keys_dir);
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(&path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        debug!("key file saved path={}", path.display());
        Ok(())
    }

    pub fn load(did: &str, keys_dir: &Path) -> Result<Self> {
        let path = Self::path_for(did, keys_dir);
        if !path.exists() {
            return Err(DidError::KeyFileMissing(path.display().to_string()));
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = fs::metadata(&path)?.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                return Err(DidError::InsecureFilePermissions { path: path.display().to_string(), mode });
            }
        }
        let data = fs::read(&path)?;
        serde_json::from_slice(&data).map_err(|err| DidError::KeyFileMalformed(format!("{}: {}", path.display(), err)))
    }
}
