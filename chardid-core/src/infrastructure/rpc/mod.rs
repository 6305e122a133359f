//! Ballot log access: the abstract read interface the replay processor
//! consumes, the CHAR JSON-RPC client implementing it, and an in-memory
//! mock for tests.

pub mod char_client;
pub mod mock;
pub mod retry;

pub use char_client::CharRpcClient;
pub use mock::MockBallotLog;
pub use retry::retry_with_backoff;

use crate::foundation::Result;
use async_trait::async_trait;

/// A decided ballot slot. `bytes` is `None` when the slot exists but
/// carries no payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BallotEntry {
    pub found: bool,
    pub bytes: Option<Vec<u8>>,
}

/// The external total order, treated as a black box.
#[async_trait]
pub trait BallotLog: Send + Sync {
    /// The next decided ballot number strictly after `after`, or `None`
    /// when nothing newer has been decided yet.
    async fn next_ballot_number(&self, after: i64) -> Result<Option<u64>>;

    async fn get_ballot(&self, number: u64) -> Result<BallotEntry>;
}
