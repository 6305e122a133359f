use crate::foundation::{DidError, Hash32};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// SHA-256. The only hash used anywhere in the protocol: suffixes,
/// commitments, reveals, Merkle nodes, and delta hashes all go through here.
pub fn sha256(data: &[u8]) -> Hash32 {
    Sha256::digest(data).into()
}

pub fn sha256_concat(parts: &[&[u8]]) -> Hash32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Unpadded base64url, the textual form of suffixes and commitments.
pub fn base64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn base64url_decode(encoded: &str) -> Result<Vec<u8>, DidError> {
    URL_SAFE_NO_PAD.decode(encoded).map_err(|err| DidError::ParseError(format!("invalid base64url: {}", err)))
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, DidError> {
    hex::decode(s).map_err(|e| e.into())
}

pub fn decode_hex_prefixed(value: &str) -> Result<Vec<u8>, DidError> {
    let stripped = value.trim().trim_start_matches("0x").trim_start_matches("0X");
    hex::decode(stripped).map_err(|err| DidError::ParseError(format!("invalid hex: {err}")))
}

pub fn parse_hex_fixed<const N: usize>(value: &str) -> Result<[u8; N], DidError> {
    let bytes = decode_hex_prefixed(value)?;
    if bytes.len() != N {
        return Err(DidError::ParseError(format!("expected {N} bytes, got {}", bytes.len())));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

pub fn parse_hex_32bytes(value: &str) -> Result<Hash32, DidError> {
    parse_hex_fixed::<32>(value)
}
