use crate::foundation::Hash32;

/// Helper to build storage keys consistently.
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.buf.extend_from_slice(prefix);
        self
    }

    pub fn hash32(mut self, hash: &Hash32) -> Self {
        self.buf.extend_from_slice(hash);
        self
    }

    pub fn u64_be(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn sep(mut self) -> Self {
        self.buf.push(b':');
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub const CF_METADATA: &str = "metadata";
pub const CF_DID: &str = "did";
pub const CF_OPLOG: &str = "oplog";
pub const CF_DID_OPS: &str = "did_ops";

pub const ALL_CFS: &[&str] = &[CF_METADATA, CF_DID, CF_OPLOG, CF_DID_OPS];

pub const META_SCHEMA_VERSION: &[u8] = b"schema_version";
pub const META_LAST_APPLIED_BALLOT: &[u8] = b"last_applied_ballot";
