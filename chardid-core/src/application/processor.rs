//! The replay processor: the only writer to the store.
//!
//! Single-threaded cooperative loop over ballots in strict ascending
//! order, one atomic commit per ballot. Given the same ballot log, any
//! two processors produce byte-identical stores: nothing here consults
//! wall-clock time, randomness, or unordered iteration.

use crate::domain::codec::{create_suffix, decode_operation, strip_envelope, PAYLOAD_VERSION_COMPACT};
use crate::domain::record::apply;
use crate::domain::validation::validate;
use crate::domain::{Operation, OpType, OperationRecord, PopRegistry};
use crate::foundation::{DidSuffix, ErrorCode, Result};
use crate::infrastructure::rpc::{retry_with_backoff, BallotLog};
use crate::infrastructure::storage::{ReplayStep, Store};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncProgress {
    pub processed: u64,
    pub applied: u64,
    pub invalid: u64,
    pub skipped: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Valid operation folded into the store.
    Applied,
    /// Recorded for audit; DID state unchanged.
    Invalid,
    /// Non-DID or empty ballot; cursor advanced, no audit entry.
    Skipped,
}

pub struct Processor {
    store: Arc<dyn Store>,
    ballot_log: Arc<dyn BallotLog>,
    pop: PopRegistry,
    retry_attempts: usize,
    retry_backoff: Duration,
}

impl Processor {
    pub fn new(store: Arc<dyn Store>, ballot_log: Arc<dyn BallotLog>, pop: PopRegistry) -> Self {
        Self { store, ballot_log, pop, retry_attempts: 5, retry_backoff: Duration::from_millis(500) }
    }

    pub fn with_retry(mut self, attempts: usize, backoff: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }

    /// Drains every ballot currently available from the log, in order.
    /// Infrastructure errors abort with the cursor on the last fully
    /// applied ballot; the next call resumes idempotently.
    pub async fn sync_available(&self) -> Result<SyncProgress> {
        let mut progress = SyncProgress::default();
        loop {
            let cursor = self.store.last_applied_ballot()?;
            let next = retry_with_backoff(self.retry_attempts, self.retry_backoff, || {
                self.ballot_log.next_ballot_number(cursor)
            })
            .await?;
            let Some(next) = next else {
                break;
            };
            // Slots between the cursor and the next decided ballot are
            // undecided-empty; they are consumed as silent skips so the
            // cursor only ever moves forward.
            for ballot in (cursor + 1) as u64..=next {
                let outcome = self.process_ballot(ballot).await?;
                progress.processed += 1;
                match outcome {
                    StepOutcome::Applied => progress.applied += 1,
                    StepOutcome::Invalid => progress.invalid += 1,
                    StepOutcome::Skipped => progress.skipped += 1,
                }
            }
        }
        if progress.processed > 0 {
            info!(
                "sync pass complete processed={} applied={} invalid={} skipped={}",
                progress.processed, progress.applied, progress.invalid, progress.skipped
            );
        }
        Ok(progress)
    }

    /// Runs forever: drain, sleep, repeat. Ballot-log outages are retried
    /// on the next poll; store errors terminate the loop. Cancellation is
    /// observed at ballot boundaries by dropping the future.
    pub async fn run(&self, poll_interval: Duration) -> Result<()> {
        loop {
            match self.sync_available().await {
                Ok(_) => {}
                Err(err) if err.code() == ErrorCode::BallotLogError => {
                    warn!("ballot log unavailable, will retry: {}", err);
                }
                Err(err) => return Err(err),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Processes one ballot. Per-ballot protocol failures are absorbed
    /// into the audit log; only infrastructure errors surface.
    pub async fn process_ballot(&self, ballot: u64) -> Result<StepOutcome> {
        trace!("process_ballot ballot={}", ballot);
        let entry = retry_with_backoff(self.retry_attempts, self.retry_backoff, || self.ballot_log.get_ballot(ballot)).await?;

        let bytes = match entry.bytes {
            Some(bytes) if entry.found && !bytes.is_empty() => bytes,
            _ => return self.skip(ballot, "empty or absent ballot"),
        };
        let Some(payload) = strip_envelope(&bytes) else {
            return self.skip(ballot, "unrecognized envelope");
        };
        if payload.is_empty() || payload[0] != PAYLOAD_VERSION_COMPACT {
            // Unknown version means non-DID data in this app domain.
            return self.skip(ballot, "unknown payload version");
        }

        match decode_operation(payload) {
            Ok(op) => self.process_decoded(ballot, payload, op),
            Err(err) if err.is_per_ballot() => {
                debug!("ballot {} payload rejected by codec: {}", ballot, err);
                self.record_invalid(ballot, payload, None, best_effort_op_type(payload), format!("codec: {}", err))
            }
            Err(err) => Err(err),
        }
    }

    fn process_decoded(&self, ballot: u64, payload: &[u8], op: Operation) -> Result<StepOutcome> {
        let target = match op.target_suffix() {
            Some(suffix) => suffix,
            None => create_suffix(payload)?,
        };
        let prior = self.store.get_did(&target)?;

        match validate(&op, payload, prior.as_ref(), &self.pop) {
            Ok(suffix) => {
                let record = match apply(&op, suffix, prior.as_ref(), ballot) {
                    Ok(record) => record,
                    Err(err) if err.is_per_ballot() => {
                        return self.record_invalid(ballot, payload, Some(target), Some(op.op_type()), format!("apply: {}", err));
                    }
                    Err(err) => return Err(err),
                };
                debug!("ballot {} applies {} to {:#x}", ballot, op.op_type(), suffix);
                self.store.commit_step(ReplayStep {
                    ballot,
                    operation: Some(OperationRecord {
                        ballot,
                        suffix: Some(suffix),
                        op_type: Some(op.op_type()),
                        raw_payload: payload.to_vec(),
                        valid: true,
                        summary: op.summary(),
                    }),
                    did_update: Some(record),
                })?;
                Ok(StepOutcome::Applied)
            }
            Err(err) if err.is_per_ballot() => {
                debug!("ballot {} operation invalid: {}", ballot, err);
                self.record_invalid(ballot, payload, Some(target), Some(op.op_type()), err.to_string())
            }
            Err(err) => Err(err),
        }
    }

    /// Invalid-for-audit: the raw payload is retained so nodes never
    /// diverge over a ballot that failed validation, but DID state is
    /// untouched.
    fn record_invalid(
        &self,
        ballot: u64,
        payload: &[u8],
        suffix: Option<DidSuffix>,
        op_type: Option<OpType>,
        reason: String,
    ) -> Result<StepOutcome> {
        self.store.commit_step(ReplayStep {
            ballot,
            operation: Some(OperationRecord {
                ballot,
                suffix,
                op_type,
                raw_payload: payload.to_vec(),
                valid: false,
                summary: reason,
            }),
            did_update: None,
        })?;
        Ok(StepOutcome::Invalid)
    }

    fn skip(&self, ballot: u64, reason: &str) -> Result<StepOutcome> {
        trace!("ballot {} skipped: {}", ballot, reason);
        self.store.commit_step(ReplayStep { ballot, operation: None, did_update: None })?;
        Ok(StepOutcome::Skipped)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

fn best_effort_op_type(payload: &[u8]) -> Option<OpType> {
    payload.get(1).and_then(|tag| OpType::from_tag(*tag).ok())
}
