//! Domain layer: the protocol itself. Pure logic, no I/O.

pub mod codec;
pub mod commitment;
pub mod document;
pub mod keys;
pub mod operation;
pub mod record;
pub mod signing;
pub mod validation;

pub use commitment::{CommitmentMode, CommitmentState};
pub use document::{DidDocument, Patch, ServiceEndpoint, VerificationMethod};
pub use keys::{KeyType, PublicKey};
pub use operation::{
    AggregatedProof, CreateOp, DeactivateOp, Delta, MemberReveal, Operation, OpType, Proof, RecoverOp, SingleReveal, ThresholdParams,
    UpdateOp,
};
pub use record::{DidRecord, DidStatus, OperationRecord};
pub use signing::{Keypair, PopRegistry};
