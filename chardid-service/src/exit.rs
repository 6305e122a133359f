//! Process exit categories.

use chardid_core::foundation::ErrorCode;
use chardid_core::DidError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERAL: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_BALLOT_LOG: i32 = 3;
pub const EXIT_STORE: i32 = 4;
pub const EXIT_AUTHORING_SECRET: i32 = 5;
pub const EXIT_LOCAL_VALIDATION: i32 = 6;

pub fn exit_code_for(err: &DidError) -> i32 {
    match err.code() {
        ErrorCode::ConfigError => EXIT_CONFIG,
        ErrorCode::BallotLogError => EXIT_BALLOT_LOG,
        ErrorCode::StoreError | ErrorCode::SerializationError | ErrorCode::SchemaMismatch => EXIT_STORE,
        ErrorCode::KeyFileMissing | ErrorCode::KeyFileMalformed | ErrorCode::InsecureFilePermissions => EXIT_AUTHORING_SECRET,
        ErrorCode::InvalidDid
        | ErrorCode::InvalidDocument
        | ErrorCode::InvalidThresholdParams
        | ErrorCode::NonCanonical
        | ErrorCode::ParseError
        | ErrorCode::LengthOverflow => EXIT_LOCAL_VALIDATION,
        _ => EXIT_GENERAL,
    }
}
