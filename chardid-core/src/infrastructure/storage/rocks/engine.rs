use crate::domain::{DidRecord, DidStatus, OperationRecord};
use crate::foundation::{DidError, DidSuffix, Result, NO_BALLOT_APPLIED};
use crate::infrastructure::storage::rocks::schema::*;
use crate::infrastructure::storage::{ReplayStep, Store, StoreStatus};
use crate::storage_err;
use bincode::Options;
use log::{debug, info, trace, warn};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options as RocksOptions, WriteBatch, DB};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const SCHEMA_VERSION: u32 = 1;

/// RocksDB-backed materialized view. Column families: DID records, the
/// ballot-keyed operation log, a per-DID secondary index, and metadata
/// (schema version, replay cursor). Replay steps commit through a single
/// WriteBatch, which is the atomicity unit.
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening RocksStore path={}", path.display());
        let mut options = RocksOptions::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        let descriptors: Vec<ColumnFamilyDescriptor> =
            ALL_CFS.iter().map(|name| ColumnFamilyDescriptor::new(*name, RocksOptions::default())).collect();
        let db = DB::open_cf_descriptors(&options, path, descriptors).map_err(|err| storage_err!("rocksdb open", err))?;
        let store = Self { db: Arc::new(db) };
        store.check_schema_version()?;
        info!("RocksStore opened path={}", path.display());
        Ok(store)
    }

    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)?;
        Self::open(dir.join("chardid-view"))
    }

    fn check_schema_version(&self) -> Result<()> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, META_SCHEMA_VERSION).map_err(|err| storage_err!("rocksdb", err))? {
            None => {
                info!("initializing fresh store schema_version={}", SCHEMA_VERSION);
                self.db
                    .put_cf(cf, META_SCHEMA_VERSION, SCHEMA_VERSION.to_be_bytes())
                    .map_err(|err| storage_err!("rocksdb", err))
            }
            Some(bytes) => {
                let array: [u8; 4] =
                    bytes.as_slice().try_into().map_err(|_| storage_err!("decode schema version", "corrupt value"))?;
                let stored = u32::from_be_bytes(array);
                if stored != SCHEMA_VERSION {
                    warn!("store schema version mismatch stored={} current={}", stored, SCHEMA_VERSION);
                    return Err(DidError::SchemaMismatch { stored, current: SCHEMA_VERSION });
                }
                Ok(())
            }
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| storage_err!("cf_handle", format!("missing column family: {}", name)))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(value).map_err(|err| err.into())
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::DefaultOptions::new().with_fixint_encoding().deserialize(bytes).map_err(|err| err.into())
    }

    fn key_did(suffix: &DidSuffix) -> Vec<u8> {
        KeyBuilder::with_capacity(36).prefix(b"did:").hash32(suffix.as_hash()).build()
    }

    fn key_op(ballot: u64) -> Vec<u8> {
        KeyBuilder::with_capacity(11).prefix(b"op:").u64_be(ballot).build()
    }

    fn key_did_op(suffix: &DidSuffix, ballot: u64) -> Vec<u8> {
        KeyBuilder::with_capacity(45).prefix(b"dop:").hash32(suffix.as_hash()).sep().u64_be(ballot).build()
    }

    fn key_did_op_prefix(suffix: &DidSuffix) -> Vec<u8> {
        KeyBuilder::with_capacity(37).prefix(b"dop:").hash32(suffix.as_hash()).sep().build()
    }

    fn write_step(&self, batch: &mut WriteBatch, step: &ReplayStep) -> Result<()> {
        if let Some(operation) = &step.operation {
            let op_cf = self.cf_handle(CF_OPLOG)?;
            batch.put_cf(op_cf, Self::key_op(operation.ballot), Self::encode(operation)?);
            if let Some(suffix) = operation.suffix {
                let idx_cf = self.cf_handle(CF_DID_OPS)?;
                batch.put_cf(idx_cf, Self::key_did_op(&suffix, operation.ballot), operation.ballot.to_be_bytes());
            }
        }
        if let Some(record) = &step.did_update {
            let did_cf = self.cf_handle(CF_DID)?;
            batch.put_cf(did_cf, Self::key_did(&record.suffix), Self::encode(record)?);
        }
        let meta_cf = self.cf_handle(CF_METADATA)?;
        batch.put_cf(meta_cf, META_LAST_APPLIED_BALLOT, (step.ballot as i64).to_be_bytes());
        Ok(())
    }
}

impl Store for RocksStore {
    fn get_did(&self, suffix: &DidSuffix) -> Result<Option<DidRecord>> {
        trace!("get_did suffix={:#x}", suffix);
        let cf = self.cf_handle(CF_DID)?;
        match self.db.get_cf(cf, Self::key_did(suffix)).map_err(|err| storage_err!("rocksdb", err))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_did(&self, record: DidRecord) -> Result<()> {
        trace!("put_did suffix={:#x}", record.suffix);
        let cf = self.cf_handle(CF_DID)?;
        let value = Self::encode(&record)?;
        self.db.put_cf(cf, Self::key_did(&record.suffix), value).map_err(|err| storage_err!("rocksdb", err))
    }

    fn list_dids(&self) -> Result<Vec<DidRecord>> {
        let prefix = b"did:";
        let cf = self.cf_handle(CF_DID)?;
        let mut records = Vec::new();
        let iter = self.db.iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb", err))?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push(Self::decode(&value)?);
        }
        Ok(records)
    }

    fn append_operation(&self, record: OperationRecord) -> Result<()> {
        debug!("append_operation ballot={} valid={}", record.ballot, record.valid);
        let mut batch = WriteBatch::default();
        let cf = self.cf_handle(CF_OPLOG)?;
        batch.put_cf(cf, Self::key_op(record.ballot), Self::encode(&record)?);
        if let Some(suffix) = record.suffix {
            let idx_cf = self.cf_handle(CF_DID_OPS)?;
            batch.put_cf(idx_cf, Self::key_did_op(&suffix, record.ballot), record.ballot.to_be_bytes());
        }
        self.db.write(batch).map_err(|err| storage_err!("rocksdb", err))
    }

    fn get_operation(&self, ballot: u64) -> Result<Option<OperationRecord>> {
        let cf = self.cf_handle(CF_OPLOG)?;
        match self.db.get_cf(cf, Self::key_op(ballot)).map_err(|err| storage_err!("rocksdb", err))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn operations_for_did(&self, suffix: &DidSuffix) -> Result<Vec<OperationRecord>> {
        let prefix = Self::key_did_op_prefix(suffix);
        let cf = self.cf_handle(CF_DID_OPS)?;
        let mut ballots = Vec::new();
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb", err))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let array: [u8; 8] = value.as_ref().try_into().map_err(|_| storage_err!("decode ballot index", "corrupt value"))?;
            ballots.push(u64::from_be_bytes(array));
        }
        let mut records = Vec::with_capacity(ballots.len());
        for ballot in ballots {
            if let Some(record) = self.get_operation(ballot)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn recent_operations(&self, limit: usize) -> Result<Vec<OperationRecord>> {
        let cf = self.cf_handle(CF_OPLOG)?;
        let mut records = Vec::with_capacity(limit);
        let iter = self.db.iterator_cf(cf, IteratorMode::End);
        for item in iter {
            if records.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(|err| storage_err!("rocksdb", err))?;
            if !key.starts_with(b"op:") {
                continue;
            }
            records.push(Self::decode(&value)?);
        }
        Ok(records)
    }

    fn last_applied_ballot(&self) -> Result<i64> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, META_LAST_APPLIED_BALLOT).map_err(|err| storage_err!("rocksdb", err))? {
            None => Ok(NO_BALLOT_APPLIED),
            Some(bytes) => {
                let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| storage_err!("decode cursor", "corrupt value"))?;
                Ok(i64::from_be_bytes(array))
            }
        }
    }

    fn set_last_applied_ballot(&self, ballot: i64) -> Result<()> {
        let cf = self.cf_handle(CF_METADATA)?;
        self.db.put_cf(cf, META_LAST_APPLIED_BALLOT, ballot.to_be_bytes()).map_err(|err| storage_err!("rocksdb", err))
    }

    fn commit_step(&self, step: ReplayStep) -> Result<()> {
        trace!("commit_step ballot={}", step.ballot);
        let mut batch = WriteBatch::default();
        self.write_step(&mut batch, &step)?;
        self.db.write(batch).map_err(|err| storage_err!("rocksdb", err))
    }

    fn status(&self) -> Result<StoreStatus> {
        let mut did_count = 0u64;
        let mut active_count = 0u64;
        for record in self.list_dids()? {
            did_count += 1;
            if record.status == DidStatus::Active {
                active_count += 1;
            }
        }

        let mut operation_count = 0u64;
        let cf = self.cf_handle(CF_OPLOG)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::From(b"op:", Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|err| storage_err!("rocksdb", err))?;
            if !key.starts_with(b"op:") {
                break;
            }
            operation_count += 1;
        }

        Ok(StoreStatus {
            did_count,
            active_count,
            deactivated_count: did_count - active_count,
            operation_count,
            last_applied_ballot: self.last_applied_ballot()?,
        })
    }

    fn health_check(&self) -> Result<()> {
        self.db.property_value("rocksdb.stats").map_err(|err| storage_err!("rocksdb", err))?;
        Ok(())
    }
}
