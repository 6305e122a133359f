use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    TruncatedPayload,
    UnknownVersion,
    UnknownOpType,
    UnknownKeyType,
    UnknownPatchType,
    ReservedFlagSet,
    LengthOverflow,
    NonCanonical,
    CommitmentMismatch,
    SignatureInvalid,
    MerkleProofInvalid,
    ThresholdNotMet,
    DuplicateRevealIndex,
    ProofOfPossessionMissing,
    StateConflict,
    DidNotFound,
    DidAlreadyExists,
    InvalidDid,
    InvalidDocument,
    InvalidThresholdParams,
    BallotLogError,
    StoreError,
    SerializationError,
    SchemaMismatch,
    AuthoringError,
    KeyFileMissing,
    KeyFileMalformed,
    InsecureFilePermissions,
    CryptoError,
    ConfigError,
    ParseError,
    Message,
}

#[derive(Debug, Error)]
pub enum DidError {
    // === Codec errors (fatal to one ballot, never to replay) ===
    #[error("truncated payload: needed {needed} more bytes at offset {offset}")]
    TruncatedPayload { offset: usize, needed: usize },

    #[error("unknown payload version: {0:#04x}")]
    UnknownVersion(u8),

    #[error("unknown operation type: {0:#04x}")]
    UnknownOpType(u8),

    #[error("unknown key type: {0:#04x}")]
    UnknownKeyType(u8),

    #[error("unknown patch type: {0:#04x}")]
    UnknownPatchType(u8),

    #[error("reserved flag bits set: {0:#04x}")]
    ReservedFlagSet(u8),

    #[error("length overflow in {field}: {len} exceeds max {max}")]
    LengthOverflow { field: &'static str, len: usize, max: usize },

    #[error("non-canonical encoding: {0}")]
    NonCanonical(String),

    // === Commitment / authorization errors ===
    #[error("reveal does not match commitment")]
    CommitmentMismatch,

    #[error("signature verification failed for key type {key_type}")]
    SignatureInvalid { key_type: String },

    #[error("merkle proof rejected for index {index}")]
    MerkleProofInvalid { index: u8 },

    #[error("threshold not met: required {required}, valid reveals {valid}")]
    ThresholdNotMet { required: u8, valid: u8 },

    #[error("duplicate reveal index: {0}")]
    DuplicateRevealIndex(u8),

    #[error("aggregated signer lacks recorded proof-of-possession")]
    ProofOfPossessionMissing,

    // === Lifecycle errors ===
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("DID not found: {0}")]
    DidNotFound(String),

    #[error("DID already exists: {0}")]
    DidAlreadyExists(String),

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid threshold parameters: m={m} n={n}")]
    InvalidThresholdParams { m: u8, n: u8 },

    // === Infrastructure errors ===
    #[error("ballot log error during {operation}: {details}")]
    BallotLogError { operation: String, details: String },

    #[error("storage error during {operation}: {details}")]
    StoreError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("schema mismatch: stored={stored} current={current}")]
    SchemaMismatch { stored: u32, current: u32 },

    // === Authoring errors (client-side only, never raised by the processor) ===
    #[error("authoring error: {0}")]
    AuthoringError(String),

    #[error("key file not found: {0}")]
    KeyFileMissing(String),

    #[error("key file malformed: {0}")]
    KeyFileMalformed(String),

    #[error("insecure key file permissions: {path} has mode {mode:o}, expected 0600")]
    InsecureFilePermissions { path: String, mode: u32 },

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, DidError>;

impl DidError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DidError::TruncatedPayload { .. } => ErrorCode::TruncatedPayload,
            DidError::UnknownVersion(_) => ErrorCode::UnknownVersion,
            DidError::UnknownOpType(_) => ErrorCode::UnknownOpType,
            DidError::UnknownKeyType(_) => ErrorCode::UnknownKeyType,
            DidError::UnknownPatchType(_) => ErrorCode::UnknownPatchType,
            DidError::ReservedFlagSet(_) => ErrorCode::ReservedFlagSet,
            DidError::LengthOverflow { .. } => ErrorCode::LengthOverflow,
            DidError::NonCanonical(_) => ErrorCode::NonCanonical,
            DidError::CommitmentMismatch => ErrorCode::CommitmentMismatch,
            DidError::SignatureInvalid { .. } => ErrorCode::SignatureInvalid,
            DidError::MerkleProofInvalid { .. } => ErrorCode::MerkleProofInvalid,
            DidError::ThresholdNotMet { .. } => ErrorCode::ThresholdNotMet,
            DidError::DuplicateRevealIndex(_) => ErrorCode::DuplicateRevealIndex,
            DidError::ProofOfPossessionMissing => ErrorCode::ProofOfPossessionMissing,
            DidError::StateConflict(_) => ErrorCode::StateConflict,
            DidError::DidNotFound(_) => ErrorCode::DidNotFound,
            DidError::DidAlreadyExists(_) => ErrorCode::DidAlreadyExists,
            DidError::InvalidDid(_) => ErrorCode::InvalidDid,
            DidError::InvalidDocument(_) => ErrorCode::InvalidDocument,
            DidError::InvalidThresholdParams { .. } => ErrorCode::InvalidThresholdParams,
            DidError::BallotLogError { .. } => ErrorCode::BallotLogError,
            DidError::StoreError { .. } => ErrorCode::StoreError,
            DidError::SerializationError { .. } => ErrorCode::SerializationError,
            DidError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            DidError::AuthoringError(_) => ErrorCode::AuthoringError,
            DidError::KeyFileMissing(_) => ErrorCode::KeyFileMissing,
            DidError::KeyFileMalformed(_) => ErrorCode::KeyFileMalformed,
            DidError::InsecureFilePermissions { .. } => ErrorCode::InsecureFilePermissions,
            DidError::CryptoError { .. } => ErrorCode::CryptoError,
            DidError::ConfigError(_) => ErrorCode::ConfigError,
            DidError::ParseError(_) => ErrorCode::ParseError,
            DidError::Message(_) => ErrorCode::Message,
        }
    }

    /// True for codec / commitment / lifecycle failures that invalidate a
    /// single ballot without stopping replay.
    pub fn is_per_ballot(&self) -> bool {
        !matches!(
            self.code(),
            ErrorCode::BallotLogError
                | ErrorCode::StoreError
                | ErrorCode::SerializationError
                | ErrorCode::SchemaMismatch
                | ErrorCode::ConfigError
        )
    }

    pub fn ballot_log(operation: impl Into<String>, details: impl Into<String>) -> Self {
        DidError::BallotLogError { operation: operation.into(), details: details.into() }
    }

    pub fn crypto(operation: impl Into<String>, details: impl Into<String>) -> Self {
        DidError::CryptoError { operation: operation.into(), details: details.into() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::DidError::StoreError { operation: $op.into(), details: $err.to_string() }
    };
}

impl From<io::Error> for DidError {
    fn from(err: io::Error) -> Self {
        DidError::StoreError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<rocksdb::Error> for DidError {
    fn from(err: rocksdb::Error) -> Self {
        DidError::StoreError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for DidError {
    fn from(err: bincode::Error) -> Self {
        DidError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for DidError {
    fn from(err: serde_json::Error) -> Self {
        DidError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<hex::FromHexError> for DidError {
    fn from(err: hex::FromHexError) -> Self {
        DidError::ParseError(format!("invalid hex: {}", err))
    }
}

impl From<toml::de::Error> for DidError {
    fn from(err: toml::de::Error) -> Self {
        DidError::ConfigError(format!("TOML parsing error: {}", err))
    }
}
