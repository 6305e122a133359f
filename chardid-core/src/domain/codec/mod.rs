//! Compact binary codec for did:char operation payloads, plus the ballot
//! envelope forms the ordering service wraps them in.

pub mod compact;
pub mod envelope;

pub use compact::{
    create_suffix, deactivate_message, decode_operation, delta_preimage_recover, delta_preimage_update, document_digest,
    encode_operation, FLAG_BLS_AGGREGATED, FLAG_THRESHOLD, HEADER_LEN, PAYLOAD_VERSION_COMPACT,
};
pub use envelope::strip_envelope;
