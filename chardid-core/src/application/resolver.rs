//! Read surface over the materialized view.

use crate::domain::{DidDocument, DidRecord, DidStatus, OpType};
use crate::foundation::{DidSuffix, Result};
use crate::infrastructure::storage::{Store, StoreStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terminal marker returned for deactivated DIDs: the suffix, where it
/// died, and the last document seen while active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub suffix: DidSuffix,
    pub deactivated_at_ballot: u64,
    pub last_document: DidDocument,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    NotFound,
    Active(DidRecord),
    Deactivated(Tombstone),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ballot: u64,
    pub op_type: Option<OpType>,
    pub valid: bool,
    pub summary: String,
}

pub struct Resolver {
    store: Arc<dyn Store>,
}

impl Resolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn resolve(&self, did: &str) -> Result<Resolution> {
        let suffix = DidSuffix::parse_did(did)?;
        let Some(record) = self.store.get_did(&suffix)? else {
            return Ok(Resolution::NotFound);
        };
        match record.status {
            DidStatus::Active => Ok(Resolution::Active(record)),
            DidStatus::Deactivated => Ok(Resolution::Deactivated(Tombstone {
                suffix: record.suffix,
                deactivated_at_ballot: record.deactivated_at_ballot.unwrap_or(record.last_operation_ballot),
                last_document: record.document,
            })),
        }
    }

    /// Every logged operation that targeted the DID, in ballot order,
    /// including invalid-for-audit entries.
    pub fn history(&self, did: &str) -> Result<Vec<HistoryEntry>> {
        let suffix = DidSuffix::parse_did(did)?;
        let records = self.store.operations_for_did(&suffix)?;
        Ok(records
            .into_iter()
            .map(|record| HistoryEntry { ballot: record.ballot, op_type: record.op_type, valid: record.valid, summary: record.summary })
            .collect())
    }

    pub fn status(&self) -> Result<StoreStatus> {
        self.store.status()
    }

    pub fn recent_operations(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let records = self.store.recent_operations(limit)?;
        Ok(records
            .into_iter()
            .map(|record| HistoryEntry { ballot: record.ballot, op_type: record.op_type, valid: record.valid, summary: record.summary })
            .collect())
    }
}
