use crate::domain::commitment::{CommitmentMode, CommitmentState};
use crate::domain::document::DidDocument;
use crate::domain::operation::{OpType, Operation, ThresholdParams};
use crate::foundation::{DidError, DidSuffix, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DidStatus {
    Active,
    Deactivated,
}

/// Current state of one DID in the materialized view. Produced exclusively
/// by folding the operation log; any two nodes replaying the same ballots
/// hold byte-identical records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidRecord {
    pub suffix: DidSuffix,
    pub status: DidStatus,
    pub document: DidDocument,
    pub update_chain: CommitmentState,
    pub recovery_chain: CommitmentState,
    pub created_at_ballot: u64,
    pub last_operation_ballot: u64,
    pub deactivated_at_ballot: Option<u64>,
}

/// One audit-log entry. Written once per processed ballot, including
/// ballots whose operation failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub ballot: u64,
    pub suffix: Option<DidSuffix>,
    pub op_type: Option<OpType>,
    pub raw_payload: Vec<u8>,
    pub valid: bool,
    pub summary: String,
}

fn chain_mode(params: Option<(u8, u8)>) -> CommitmentMode {
    match params {
        Some((m, n)) => CommitmentMode::Threshold { m, n },
        None => CommitmentMode::Single,
    }
}

fn update_mode(params: Option<&ThresholdParams>) -> CommitmentMode {
    chain_mode(params.map(|p| (p.update_m, p.update_n)))
}

fn recovery_mode(params: Option<&ThresholdParams>) -> CommitmentMode {
    chain_mode(params.map(|p| (p.recovery_m, p.recovery_n)))
}

/// Pure folding function: the record after applying a validated operation.
/// Depends only on the operation, the prior record, and the ballot number.
pub fn apply(op: &Operation, suffix: DidSuffix, prior: Option<&DidRecord>, ballot: u64) -> Result<DidRecord> {
    match op {
        Operation::Create(create) => {
            let document = DidDocument::new(create.verification_methods.clone(), create.services.clone())?;
            Ok(DidRecord {
                suffix,
                status: DidStatus::Active,
                document,
                update_chain: CommitmentState {
                    commitment: create.update_commitment,
                    mode: update_mode(create.threshold.as_ref()),
                },
                recovery_chain: CommitmentState {
                    commitment: create.recovery_commitment,
                    mode: recovery_mode(create.threshold.as_ref()),
                },
                created_at_ballot: ballot,
                last_operation_ballot: ballot,
                deactivated_at_ballot: None,
            })
        }
        Operation::Update(update) => {
            let prior = prior.ok_or_else(|| DidError::DidNotFound(suffix.to_uri()))?;
            let mut record = prior.clone();
            record.document.apply_patches(&update.delta.patches);
            // Patched documents obey the same invariants as initial ones.
            record.document.check_invariants()?;
            record.update_chain.commitment = update.new_update_commitment;
            record.last_operation_ballot = ballot;
            Ok(record)
        }
        Operation::Recover(recover) => {
            let prior = prior.ok_or_else(|| DidError::DidNotFound(suffix.to_uri()))?;
            let mut record = prior.clone();
            // Recovery replaces: the delta is applied to an empty document.
            let mut document = DidDocument::default();
            document.apply_patches(&recover.delta.patches);
            document.check_invariants()?;
            record.document = document;
            record.update_chain = CommitmentState {
                commitment: recover.new_update_commitment,
                mode: update_mode(recover.new_threshold.as_ref()),
            };
            record.recovery_chain = CommitmentState {
                commitment: recover.new_recovery_commitment,
                mode: recovery_mode(recover.new_threshold.as_ref()),
            };
            record.last_operation_ballot = ballot;
            Ok(record)
        }
        Operation::Deactivate(_) => {
            let prior = prior.ok_or_else(|| DidError::DidNotFound(suffix.to_uri()))?;
            let mut record = prior.clone();
            // Commitments freeze at deactivation; the state is terminal.
            record.status = DidStatus::Deactivated;
            record.deactivated_at_ballot = Some(ballot);
            record.last_operation_ballot = ballot;
            Ok(record)
        }
    }
}
