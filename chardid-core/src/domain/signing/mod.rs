//! Uniform sign/verify surface over the four supported schemes.
//!
//! Every signed message in the protocol is a 32-byte hash (a delta hash or
//! `H(suffix)`), so the surface takes `&Hash32`. Each backend treats it in
//! its own conventional way: Ed25519 signs the bytes as a message, the two
//! ECDSA curves consume them directly as the prehash digest, and BLS
//! hashes them to G2 under the standard ciphersuite DST. Signatures are
//! fixed-width raw bytes, never DER.

pub mod aggregate;

use crate::domain::keys::{KeyType, PublicKey};
use crate::foundation::{DidError, Hash32, Result};
use ed25519_dalek::Verifier as _;
use p256::ecdsa::signature::hazmat::{PrehashSigner as _, PrehashVerifier as _};
use serde::{Deserialize, Serialize};

pub use aggregate::{verify_aggregate, PopRegistry};

/// Ciphersuite DST for BLS12-381 G2 signatures (basic scheme).
pub const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Verifies `signature` over `message` under `key`. Malformed keys or
/// signatures simply fail verification; the caller treats all failures the
/// same way (the operation is invalid).
pub fn verify(key: &PublicKey, message: &Hash32, signature: &[u8]) -> bool {
    if signature.len() != key.key_type.signature_len() {
        return false;
    }
    match key.key_type {
        KeyType::Ed25519 => verify_ed25519(&key.bytes, message, signature),
        KeyType::Secp256k1 => verify_secp256k1(&key.bytes, message, signature),
        KeyType::P256 => verify_p256(&key.bytes, message, signature),
        KeyType::Bls12381G1 => verify_bls(&key.bytes, message, signature),
    }
}

fn verify_ed25519(key: &[u8], message: &Hash32, signature: &[u8]) -> bool {
    let Ok(key_bytes) = <&[u8; 32]>::try_from(key) else { return false };
    let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(key_bytes) else { return false };
    let Ok(sig_bytes) = <&[u8; 64]>::try_from(signature) else { return false };
    let sig = ed25519_dalek::Signature::from_bytes(sig_bytes);
    verifying_key.verify(message, &sig).is_ok()
}

fn verify_secp256k1(key: &[u8], message: &Hash32, signature: &[u8]) -> bool {
    let Ok(public_key) = secp256k1::PublicKey::from_slice(key) else { return false };
    let Ok(sig) = secp256k1::ecdsa::Signature::from_compact(signature) else { return false };
    let msg = secp256k1::Message::from_digest(*message);
    secp256k1::global::SECP256K1.verify_ecdsa(&msg, &sig, &public_key).is_ok()
}

fn verify_p256(key: &[u8], message: &Hash32, signature: &[u8]) -> bool {
    let Ok(verifying_key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(key) else { return false };
    let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else { return false };
    verifying_key.verify_prehash(message, &sig).is_ok()
}

fn verify_bls(key: &[u8], message: &Hash32, signature: &[u8]) -> bool {
    let Ok(public_key) = blst::min_pk::PublicKey::from_bytes(key) else { return false };
    let Ok(sig) = blst::min_pk::Signature::from_bytes(signature) else { return false };
    sig.verify(true, message, BLS_DST, &[], &public_key, true) == blst::BLST_ERROR::BLST_SUCCESS
}

/// Secret key material plus the derived public key, for the authoring
/// side. Secrets are 32 bytes for every scheme (Ed25519 seed, EC scalar,
/// BLS key-gen seed).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub key_type: KeyType,
    #[serde(with = "crate::foundation::util::serde_hex")]
    pub secret: Vec<u8>,
    #[serde(with = "crate::foundation::util::serde_hex")]
    pub public: Vec<u8>,
}

impl Keypair {
    pub fn generate(key_type: KeyType) -> Result<Self> {
        use rand::RngCore as _;
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self::from_secret(key_type, &seed)
    }

    pub fn from_secret(key_type: KeyType, secret: &[u8]) -> Result<Self> {
        let public = derive_public(key_type, secret)?;
        Ok(Self { key_type, secret: secret.to_vec(), public })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey { key_type: self.key_type, bytes: self.public.clone() }
    }

    pub fn sign(&self, message: &Hash32) -> Result<Vec<u8>> {
        match self.key_type {
            KeyType::Ed25519 => {
                use ed25519_dalek::Signer as _;
                let seed: &[u8; 32] =
                    self.secret.as_slice().try_into().map_err(|_| DidError::crypto("ed25519 sign", "secret must be 32 bytes"))?;
                let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
                Ok(signing_key.sign(message).to_bytes().to_vec())
            }
            KeyType::Secp256k1 => {
                let secret_key = secp256k1::SecretKey::from_slice(&self.secret)
                    .map_err(|err| DidError::crypto("secp256k1 sign", err.to_string()))?;
                let msg = secp256k1::Message::from_digest(*message);
                let sig = secp256k1::global::SECP256K1.sign_ecdsa(&msg, &secret_key);
                Ok(sig.serialize_compact().to_vec())
            }
            KeyType::P256 => {
                let signing_key = p256::ecdsa::SigningKey::from_slice(&self.secret)
                    .map_err(|err| DidError::crypto("p256 sign", err.to_string()))?;
                let sig: p256::ecdsa::Signature =
                    signing_key.sign_prehash(message).map_err(|err| DidError::crypto("p256 sign", err.to_string()))?;
                Ok(sig.to_bytes().to_vec())
            }
            KeyType::Bls12381G1 => {
                let secret_key = bls_secret_from_seed(&self.secret)?;
                Ok(secret_key.sign(message, BLS_DST, &[]).to_bytes().to_vec())
            }
        }
    }
}

fn derive_public(key_type: KeyType, secret: &[u8]) -> Result<Vec<u8>> {
    match key_type {
        KeyType::Ed25519 => {
            let seed: &[u8; 32] = secret.try_into().map_err(|_| DidError::crypto("ed25519 keygen", "secret must be 32 bytes"))?;
            Ok(ed25519_dalek::SigningKey::from_bytes(seed).verifying_key().to_bytes().to_vec())
        }
        KeyType::Secp256k1 => {
            let secret_key =
                secp256k1::SecretKey::from_slice(secret).map_err(|err| DidError::crypto("secp256k1 keygen", err.to_string()))?;
            Ok(secp256k1::PublicKey::from_secret_key(secp256k1::global::SECP256K1, &secret_key).serialize().to_vec())
        }
        KeyType::P256 => {
            let signing_key =
                p256::ecdsa::SigningKey::from_slice(secret).map_err(|err| DidError::crypto("p256 keygen", err.to_string()))?;
            Ok(signing_key.verifying_key().to_encoded_point(true).as_bytes().to_vec())
        }
        KeyType::Bls12381G1 => Ok(bls_secret_from_seed(secret)?.sk_to_pk().to_bytes().to_vec()),
    }
}

/// The stored secret is the key-gen seed; the scalar is derived through
/// blst's KDF so any 32 bytes are acceptable material.
fn bls_secret_from_seed(seed: &[u8]) -> Result<blst::min_pk::SecretKey> {
    blst::min_pk::SecretKey::key_gen(seed, &[]).map_err(|err| DidError::crypto("bls keygen", format!("{:?}", err)))
}
