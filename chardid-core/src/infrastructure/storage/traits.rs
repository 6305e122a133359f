use crate::domain::{DidRecord, OperationRecord};
use crate::foundation::{DidSuffix, Result};
use serde::{Deserialize, Serialize};

/// One replay step, committed atomically: the audit-log entry, the DID
/// mutation when the operation was valid, and the cursor advance. On
/// restart the cursor reflects the last fully applied ballot; a partial
/// step is never observable.
#[derive(Clone, Debug)]
pub struct ReplayStep {
    pub ballot: u64,
    /// None for silently skipped ballots (empty, unknown envelope or
    /// version); those advance the cursor without an audit entry.
    pub operation: Option<OperationRecord>,
    pub did_update: Option<DidRecord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub did_count: u64,
    pub active_count: u64,
    pub deactivated_count: u64,
    pub operation_count: u64,
    pub last_applied_ballot: i64,
}

/// The materialized view owned by the replay loop. Deleting it and
/// replaying the ballot log from zero reconstructs it byte-for-byte.
pub trait Store: Send + Sync {
    fn get_did(&self, suffix: &DidSuffix) -> Result<Option<DidRecord>>;
    fn put_did(&self, record: DidRecord) -> Result<()>;
    fn list_dids(&self) -> Result<Vec<DidRecord>>;

    fn append_operation(&self, record: OperationRecord) -> Result<()>;
    fn get_operation(&self, ballot: u64) -> Result<Option<OperationRecord>>;
    fn operations_for_did(&self, suffix: &DidSuffix) -> Result<Vec<OperationRecord>>;
    fn recent_operations(&self, limit: usize) -> Result<Vec<OperationRecord>>;

    /// -1 when no ballot has been applied yet.
    fn last_applied_ballot(&self) -> Result<i64>;
    fn set_last_applied_ballot(&self, ballot: i64) -> Result<()>;

    /// Atomic unit of replay: all-or-nothing.
    fn commit_step(&self, step: ReplayStep) -> Result<()>;

    fn status(&self) -> Result<StoreStatus>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
