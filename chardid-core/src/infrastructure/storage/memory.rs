use crate::domain::{DidRecord, DidStatus, OperationRecord};
use crate::foundation::{DidError, DidSuffix, Result, NO_BALLOT_APPLIED};
use crate::infrastructure::storage::{ReplayStep, Store, StoreStatus};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct MemoryInner {
    dids: BTreeMap<DidSuffix, DidRecord>,
    operations: BTreeMap<u64, OperationRecord>,
    by_did: BTreeMap<DidSuffix, Vec<u64>>,
    cursor: i64,
}

impl MemoryInner {
    fn new() -> Self {
        Self { dids: BTreeMap::new(), operations: BTreeMap::new(), by_did: BTreeMap::new(), cursor: NO_BALLOT_APPLIED }
    }

    fn append_operation(&mut self, record: OperationRecord) {
        if let Some(suffix) = record.suffix {
            let ballots = self.by_did.entry(suffix).or_default();
            if !ballots.contains(&record.ballot) {
                ballots.push(record.ballot);
                ballots.sort_unstable();
            }
        }
        self.operations.insert(record.ballot, record);
    }
}

/// In-memory store, primarily for tests and the determinism suite. The
/// BTreeMap backing keeps every iteration order fixed.
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryInner::new())) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|_| DidError::StoreError {
            operation: "memory lock".to_string(),
            details: "poisoned".to_string(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get_did(&self, suffix: &DidSuffix) -> Result<Option<DidRecord>> {
        Ok(self.lock_inner()?.dids.get(suffix).cloned())
    }

    fn put_did(&self, record: DidRecord) -> Result<()> {
        self.lock_inner()?.dids.insert(record.suffix, record);
        Ok(())
    }

    fn list_dids(&self) -> Result<Vec<DidRecord>> {
        Ok(self.lock_inner()?.dids.values().cloned().collect())
    }

    fn append_operation(&self, record: OperationRecord) -> Result<()> {
        self.lock_inner()?.append_operation(record);
        Ok(())
    }

    fn get_operation(&self, ballot: u64) -> Result<Option<OperationRecord>> {
        Ok(self.lock_inner()?.operations.get(&ballot).cloned())
    }

    fn operations_for_did(&self, suffix: &DidSuffix) -> Result<Vec<OperationRecord>> {
        let inner = self.lock_inner()?;
        let ballots = inner.by_did.get(suffix).cloned().unwrap_or_default();
        Ok(ballots.iter().filter_map(|ballot| inner.operations.get(ballot).cloned()).collect())
    }

    fn recent_operations(&self, limit: usize) -> Result<Vec<OperationRecord>> {
        let inner = self.lock_inner()?;
        Ok(inner.operations.values().rev().take(limit).cloned().collect())
    }

    fn last_applied_ballot(&self) -> Result<i64> {
        Ok(self.lock_inner()?.cursor)
    }

    fn set_last_applied_ballot(&self, ballot: i64) -> Result<()> {
        self.lock_inner()?.cursor = ballot;
        Ok(())
    }

    fn commit_step(&self, step: ReplayStep) -> Result<()> {
        // One lock over the whole mutation is the atomicity unit here.
        let mut inner = self.lock_inner()?;
        if let Some(operation) = step.operation {
            inner.append_operation(operation);
        }
        if let Some(record) = step.did_update {
            inner.dids.insert(record.suffix, record);
        }
        inner.cursor = step.ballot as i64;
        Ok(())
    }

    fn status(&self) -> Result<StoreStatus> {
        let inner = self.lock_inner()?;
        let active_count = inner.dids.values().filter(|r| r.status == DidStatus::Active).count() as u64;
        Ok(StoreStatus {
            did_count: inner.dids.len() as u64,
            active_count,
            deactivated_count: inner.dids.len() as u64 - active_count,
            operation_count: inner.operations.len() as u64,
            last_applied_ballot: inner.cursor,
        })
    }
}
