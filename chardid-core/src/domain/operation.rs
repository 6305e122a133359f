use crate::domain::document::{Patch, ServiceEndpoint, VerificationMethod};
use crate::domain::keys::PublicKey;
use crate::foundation::{DidError, DidSuffix, Hash32, MAX_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Create,
    Update,
    Recover,
    Deactivate,
}

impl OpType {
    pub const fn tag(self) -> u8 {
        match self {
            OpType::Create => 0x01,
            OpType::Update => 0x02,
            OpType::Recover => 0x03,
            OpType::Deactivate => 0x04,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, DidError> {
        match tag {
            0x01 => Ok(OpType::Create),
            0x02 => Ok(OpType::Update),
            0x03 => Ok(OpType::Recover),
            0x04 => Ok(OpType::Deactivate),
            other => Err(DidError::UnknownOpType(other)),
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Create => write!(f, "create"),
            OpType::Update => write!(f, "update"),
            OpType::Recover => write!(f, "recover"),
            OpType::Deactivate => write!(f, "deactivate"),
        }
    }
}

/// M-of-N parameters for both chains, carried by threshold CREATE and
/// threshold RECOVER.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub update_m: u8,
    pub update_n: u8,
    pub recovery_m: u8,
    pub recovery_n: u8,
}

impl ThresholdParams {
    pub fn check(&self) -> Result<(), DidError> {
        for (m, n) in [(self.update_m, self.update_n), (self.recovery_m, self.recovery_n)] {
            if m == 0 || m > n || n > MAX_THRESHOLD {
                return Err(DidError::InvalidThresholdParams { m, n });
            }
        }
        Ok(())
    }
}

/// The patch block of an UPDATE / RECOVER. The signed preimage also covers
/// the rotation commitments; see `codec::compact::delta_preimage_*`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub patches: Vec<Patch>,
}

/// Single-key authorization: reveal value, the revealed key, signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleReveal {
    pub reveal_value: Hash32,
    pub key: PublicKey,
    #[serde(with = "crate::foundation::util::serde_hex")]
    pub signature: Vec<u8>,
}

/// One member of a threshold reveal set: leaf index, revealed key, Merkle
/// siblings bottom-up, and (except in aggregated mode) a signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReveal {
    pub index: u8,
    pub key: PublicKey,
    pub siblings: Vec<Hash32>,
    #[serde(with = "crate::foundation::util::serde_hex")]
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedProof {
    pub members: Vec<MemberReveal>,
    #[serde(with = "crate::foundation::util::serde_hex")]
    pub signature: Vec<u8>,
}

/// How an operation authenticates against a commitment chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proof {
    Single(SingleReveal),
    Threshold(Vec<MemberReveal>),
    /// Threshold set with one BLS aggregate signature over a shared
    /// message; member reveals carry empty signatures.
    Aggregated(AggregatedProof),
}

impl Proof {
    pub fn is_threshold(&self) -> bool {
        !matches!(self, Proof::Single(_))
    }

    pub fn is_aggregated(&self) -> bool {
        matches!(self, Proof::Aggregated(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOp {
    pub suffix_data_hash: Hash32,
    pub update_commitment: Hash32,
    pub recovery_commitment: Hash32,
    pub threshold: Option<ThresholdParams>,
    pub verification_methods: Vec<VerificationMethod>,
    pub services: Vec<ServiceEndpoint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOp {
    pub suffix: DidSuffix,
    pub proof: Proof,
    pub new_update_commitment: Hash32,
    pub delta: Delta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverOp {
    pub suffix: DidSuffix,
    pub proof: Proof,
    pub new_update_commitment: Hash32,
    pub new_recovery_commitment: Hash32,
    pub new_threshold: Option<ThresholdParams>,
    pub delta: Delta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateOp {
    pub suffix: DidSuffix,
    pub proof: Proof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create(CreateOp),
    Update(UpdateOp),
    Recover(RecoverOp),
    Deactivate(DeactivateOp),
}

impl Operation {
    pub fn op_type(&self) -> OpType {
        match self {
            Operation::Create(_) => OpType::Create,
            Operation::Update(_) => OpType::Update,
            Operation::Recover(_) => OpType::Recover,
            Operation::Deactivate(_) => OpType::Deactivate,
        }
    }

    /// The suffix the operation targets. CREATE has none on the wire; its
    /// suffix is derived from the payload bytes.
    pub fn target_suffix(&self) -> Option<DidSuffix> {
        match self {
            Operation::Create(_) => None,
            Operation::Update(op) => Some(op.suffix),
            Operation::Recover(op) => Some(op.suffix),
            Operation::Deactivate(op) => Some(op.suffix),
        }
    }

    /// One-line description stored alongside the raw payload in the audit
    /// log.
    pub fn summary(&self) -> String {
        match self {
            Operation::Create(op) => format!(
                "create keys={} services={} threshold={}",
                op.verification_methods.len(),
                op.services.len(),
                op.threshold.map_or("no".to_string(), |t| format!("{}-of-{}", t.update_m, t.update_n)),
            ),
            Operation::Update(op) => format!("update patches={} reveals={}", op.delta.patches.len(), proof_arity(&op.proof)),
            Operation::Recover(op) => format!("recover patches={} reveals={}", op.delta.patches.len(), proof_arity(&op.proof)),
            Operation::Deactivate(op) => format!("deactivate reveals={}", proof_arity(&op.proof)),
        }
    }
}

fn proof_arity(proof: &Proof) -> usize {
    match proof {
        Proof::Single(_) => 1,
        Proof::Threshold(members) => members.len(),
        Proof::Aggregated(agg) => agg.members.len(),
    }
}
