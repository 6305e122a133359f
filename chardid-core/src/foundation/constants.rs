/// Prefix of every textual did:char identifier.
pub const DID_PREFIX: &str = "did:char:";

/// Width of every hash, commitment, and reveal value.
pub const HASH_LEN: usize = 32;

/// Upper bound on both M and N in a threshold commitment set.
pub const MAX_THRESHOLD: u8 = 99;

/// Cursor value meaning "no ballot applied yet".
pub const NO_BALLOT_APPLIED: i64 = -1;
