use crate::foundation::DidError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported key algorithms, tagged with their wire byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Ed25519,
    Secp256k1,
    P256,
    Bls12381G1,
}

impl KeyType {
    pub const fn tag(self) -> u8 {
        match self {
            KeyType::Ed25519 => 0x00,
            KeyType::Secp256k1 => 0x01,
            KeyType::P256 => 0x02,
            KeyType::Bls12381G1 => 0x03,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, DidError> {
        match tag {
            0x00 => Ok(KeyType::Ed25519),
            0x01 => Ok(KeyType::Secp256k1),
            0x02 => Ok(KeyType::P256),
            0x03 => Ok(KeyType::Bls12381G1),
            other => Err(DidError::UnknownKeyType(other)),
        }
    }

    /// Fixed public key width on the wire. EC keys are SEC1-compressed.
    pub const fn public_key_len(self) -> usize {
        match self {
            KeyType::Ed25519 => 32,
            KeyType::Secp256k1 | KeyType::P256 => 33,
            KeyType::Bls12381G1 => 48,
        }
    }

    /// Fixed signature width on the wire (raw, never DER).
    pub const fn signature_len(self) -> usize {
        match self {
            KeyType::Ed25519 | KeyType::Secp256k1 | KeyType::P256 => 64,
            KeyType::Bls12381G1 => 96,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Ed25519 => write!(f, "ed25519"),
            KeyType::Secp256k1 => write!(f, "secp256k1"),
            KeyType::P256 => write!(f, "p256"),
            KeyType::Bls12381G1 => write!(f, "bls12381g1"),
        }
    }
}

/// A public key with its algorithm tag. Width is enforced at construction
/// so every downstream consumer can rely on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    pub key_type: KeyType,
    #[serde(with = "crate::foundation::util::serde_hex")]
    pub bytes: Vec<u8>,
}

impl PublicKey {
    pub fn new(key_type: KeyType, bytes: Vec<u8>) -> Result<Self, DidError> {
        if bytes.len() != key_type.public_key_len() {
            return Err(DidError::CryptoError {
                operation: "public key construction".to_string(),
                details: format!("{} key must be {} bytes, got {}", key_type, key_type.public_key_len(), bytes.len()),
            });
        }
        Ok(Self { key_type, bytes })
    }

    /// Canonical byte form committed to by reveals: the algorithm tag
    /// followed by the fixed-width key bytes. Binding the tag prevents a
    /// key from satisfying a commitment under a different algorithm.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.bytes.len());
        out.push(self.key_type.tag());
        out.extend_from_slice(&self.bytes);
        out
    }
}
