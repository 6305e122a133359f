//! In-memory ballot log for tests and local replay experiments.

use crate::foundation::{DidError, Result};
use crate::infrastructure::rpc::{BallotEntry, BallotLog};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockBallotLog {
    ballots: Mutex<BTreeMap<u64, Option<Vec<u8>>>>,
    /// When non-zero, the next N `get_ballot` calls fail transiently.
    fail_reads: AtomicUsize,
}

impl MockBallotLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, ballot: u64, bytes: Vec<u8>) {
        self.ballots.lock().expect("mock lock").insert(ballot, Some(bytes));
    }

    pub fn seed_empty(&self, ballot: u64) {
        self.ballots.lock().expect("mock lock").insert(ballot, None);
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.fail_reads.store(count, Ordering::SeqCst);
    }

    pub fn highest_ballot(&self) -> Option<u64> {
        self.ballots.lock().expect("mock lock").keys().next_back().copied()
    }
}

#[async_trait]
impl BallotLog for MockBallotLog {
    async fn next_ballot_number(&self, after: i64) -> Result<Option<u64>> {
        let ballots = self.ballots.lock().expect("mock lock");
        let next = ballots.keys().find(|&&ballot| (ballot as i64) > after).copied();
        Ok(next)
    }

    async fn get_ballot(&self, number: u64) -> Result<BallotEntry> {
        let remaining = self.fail_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(DidError::ballot_log("get_ballot", "injected transient failure"));
        }
        let ballots = self.ballots.lock().expect("mock lock");
        match ballots.get(&number) {
            None => Ok(BallotEntry { found: false, bytes: None }),
            Some(bytes) => Ok(BallotEntry { found: true, bytes: bytes.clone() }),
        }
    }
}
