//! Version 0x02 compact binary format.
//!
//! One-to-one bijection between in-memory operations and byte strings:
//! the encoder emits keys, services, and patch items in ascending id
//! order, and the decoder rejects anything out of order, so that
//! `encode(decode(b)) == b` for every accepted `b`.

use crate::domain::document::{Patch, ServiceEndpoint, VerificationMethod};
use crate::domain::keys::{KeyType, PublicKey};
use crate::domain::operation::{
    AggregatedProof, CreateOp, DeactivateOp, Delta, MemberReveal, Operation, OpType, Proof, RecoverOp, SingleReveal, ThresholdParams,
    UpdateOp,
};
use crate::foundation::util::encoding::sha256;
use crate::foundation::{DidError, DidSuffix, Hash32, Result};

pub const PAYLOAD_VERSION_COMPACT: u8 = 0x02;

pub const FLAG_THRESHOLD: u8 = 0x01;
pub const FLAG_BLS_AGGREGATED: u8 = 0x02;
const FLAG_MASK_ALL: u8 = FLAG_THRESHOLD | FLAG_BLS_AGGREGATED;

/// `version | op_type | flags`.
pub const HEADER_LEN: usize = 3;

const MAX_SHORT_STRING: usize = 255;
const MAX_LONG_STRING: usize = 65_535;
const MAX_COUNT: usize = 255;

/// The DID suffix a CREATE payload certifies: the hash of everything after
/// the header, so re-emitting decoders preserve it.
pub fn create_suffix(payload: &[u8]) -> Result<DidSuffix> {
    if payload.len() < HEADER_LEN {
        return Err(DidError::TruncatedPayload { offset: payload.len(), needed: HEADER_LEN - payload.len() });
    }
    Ok(DidSuffix::new(sha256(&payload[HEADER_LEN..])))
}

/// Signed preimage of an UPDATE delta: the rotation target followed by the
/// patch block.
pub fn delta_preimage_update(new_update_commitment: &Hash32, delta: &Delta) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.hash32(new_update_commitment);
    write_delta(&mut w, delta)?;
    Ok(w.finish())
}

/// Signed preimage of a RECOVER delta: both rotation targets, the new
/// threshold parameters when present, then the patch block.
pub fn delta_preimage_recover(
    new_update_commitment: &Hash32,
    new_recovery_commitment: &Hash32,
    new_threshold: Option<&ThresholdParams>,
    delta: &Delta,
) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.hash32(new_update_commitment);
    w.hash32(new_recovery_commitment);
    if let Some(params) = new_threshold {
        write_threshold_params(&mut w, params);
    }
    write_delta(&mut w, delta)?;
    Ok(w.finish())
}

/// DEACTIVATE has no delta; the recovery key signs the DID suffix hash so
/// the signature still binds the specific DID.
pub fn deactivate_message(suffix: &DidSuffix) -> Hash32 {
    sha256(suffix.as_hash())
}

/// Digest of the canonical document block, used by authoring clients to
/// fill a CREATE's `suffix_data_hash` field.
pub fn document_digest(methods: &[VerificationMethod], services: &[ServiceEndpoint]) -> Result<Hash32> {
    let mut w = Writer::new();
    let methods = sorted_methods(methods)?;
    w.count("keys", methods.len())?;
    for method in &methods {
        write_method(&mut w, method)?;
    }
    let services = sorted_services(services)?;
    w.count("services", services.len())?;
    for service in &services {
        write_service(&mut w, service)?;
    }
    Ok(sha256(&w.finish()))
}

pub fn encode_operation(op: &Operation) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.byte(PAYLOAD_VERSION_COMPACT);
    w.byte(op.op_type().tag());
    match op {
        Operation::Create(create) => {
            w.byte(if create.threshold.is_some() { FLAG_THRESHOLD } else { 0 });
            encode_create_body(&mut w, create)?;
        }
        Operation::Update(update) => {
            w.byte(proof_flags(&update.proof));
            w.hash32(update.suffix.as_hash());
            write_proof(&mut w, &update.proof)?;
            w.hash32(&update.new_update_commitment);
            write_delta(&mut w, &update.delta)?;
        }
        Operation::Recover(recover) => {
            let flags = proof_flags(&recover.proof);
            if recover.new_threshold.is_some() != (flags & FLAG_THRESHOLD != 0) {
                return Err(DidError::NonCanonical("threshold recover must carry new threshold params, and only then".to_string()));
            }
            w.byte(flags);
            w.hash32(recover.suffix.as_hash());
            write_proof(&mut w, &recover.proof)?;
            w.hash32(&recover.new_update_commitment);
            w.hash32(&recover.new_recovery_commitment);
            if let Some(params) = &recover.new_threshold {
                write_threshold_params(&mut w, params);
            }
            write_delta(&mut w, &recover.delta)?;
        }
        Operation::Deactivate(deactivate) => {
            w.byte(proof_flags(&deactivate.proof));
            w.hash32(deactivate.suffix.as_hash());
            write_proof(&mut w, &deactivate.proof)?;
        }
    }
    Ok(w.finish())
}

pub fn decode_operation(payload: &[u8]) -> Result<Operation> {
    let mut r = Reader::new(payload);
    let version = r.byte()?;
    if version != PAYLOAD_VERSION_COMPACT {
        return Err(DidError::UnknownVersion(version));
    }
    let op_type = OpType::from_tag(r.byte()?)?;
    let flags = r.byte()?;
    if flags & !FLAG_MASK_ALL != 0 {
        return Err(DidError::ReservedFlagSet(flags));
    }
    let threshold = flags & FLAG_THRESHOLD != 0;
    let aggregated = flags & FLAG_BLS_AGGREGATED != 0;
    if aggregated && !threshold {
        return Err(DidError::ReservedFlagSet(flags));
    }

    let op = match op_type {
        OpType::Create => {
            if aggregated {
                return Err(DidError::ReservedFlagSet(flags));
            }
            Operation::Create(decode_create_body(&mut r, threshold)?)
        }
        OpType::Update => {
            let suffix = DidSuffix::new(r.hash32()?);
            let proof = read_proof(&mut r, threshold, aggregated)?;
            let new_update_commitment = r.hash32()?;
            let delta = read_delta(&mut r)?;
            Operation::Update(UpdateOp { suffix, proof, new_update_commitment, delta })
        }
        OpType::Recover => {
            let suffix = DidSuffix::new(r.hash32()?);
            let proof = read_proof(&mut r, threshold, aggregated)?;
            let new_update_commitment = r.hash32()?;
            let new_recovery_commitment = r.hash32()?;
            let new_threshold = if threshold { Some(read_threshold_params(&mut r)?) } else { None };
            let delta = read_delta(&mut r)?;
            Operation::Recover(RecoverOp { suffix, proof, new_update_commitment, new_recovery_commitment, new_threshold, delta })
        }
        OpType::Deactivate => {
            let suffix = DidSuffix::new(r.hash32()?);
            let proof = read_proof(&mut r, threshold, aggregated)?;
            Operation::Deactivate(DeactivateOp { suffix, proof })
        }
    };
    r.expect_end()?;
    Ok(op)
}

fn proof_flags(proof: &Proof) -> u8 {
    match proof {
        Proof::Single(_) => 0,
        Proof::Threshold(_) => FLAG_THRESHOLD,
        Proof::Aggregated(_) => FLAG_THRESHOLD | FLAG_BLS_AGGREGATED,
    }
}

fn encode_create_body(w: &mut Writer, create: &CreateOp) -> Result<()> {
    w.hash32(&create.suffix_data_hash);
    w.hash32(&create.update_commitment);
    w.hash32(&create.recovery_commitment);
    if let Some(params) = &create.threshold {
        write_threshold_params(w, params);
    }
    let methods = sorted_methods(&create.verification_methods)?;
    w.count("keys", methods.len())?;
    for method in &methods {
        write_method(w, method)?;
    }
    let services = sorted_services(&create.services)?;
    w.count("services", services.len())?;
    for service in &services {
        write_service(w, service)?;
    }
    Ok(())
}

fn decode_create_body(r: &mut Reader<'_>, threshold: bool) -> Result<CreateOp> {
    let suffix_data_hash = r.hash32()?;
    let update_commitment = r.hash32()?;
    let recovery_commitment = r.hash32()?;
    let params = if threshold { Some(read_threshold_params(r)?) } else { None };

    let key_count = r.byte()? as usize;
    let mut verification_methods = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        verification_methods.push(read_method(r)?);
    }
    check_ascending("key", verification_methods.iter().map(|m| m.id.as_str()))?;

    let service_count = r.byte()? as usize;
    let mut services = Vec::with_capacity(service_count);
    for _ in 0..service_count {
        services.push(read_service(r)?);
    }
    check_ascending("service", services.iter().map(|s| s.id.as_str()))?;

    Ok(CreateOp { suffix_data_hash, update_commitment, recovery_commitment, threshold: params, verification_methods, services })
}

fn write_threshold_params(w: &mut Writer, params: &ThresholdParams) {
    w.byte(params.update_m);
    w.byte(params.update_n);
    w.byte(params.recovery_m);
    w.byte(params.recovery_n);
}

fn read_threshold_params(r: &mut Reader<'_>) -> Result<ThresholdParams> {
    Ok(ThresholdParams { update_m: r.byte()?, update_n: r.byte()?, recovery_m: r.byte()?, recovery_n: r.byte()? })
}

fn write_proof(w: &mut Writer, proof: &Proof) -> Result<()> {
    match proof {
        Proof::Single(reveal) => {
            w.hash32(&reveal.reveal_value);
            w.byte(reveal.key.key_type.tag());
            w.bytes(&reveal.key.bytes);
            w.signature(reveal.key.key_type, &reveal.signature)?;
        }
        Proof::Threshold(members) => {
            w.count("reveals", members.len())?;
            for member in members {
                write_member(w, member, true)?;
            }
        }
        Proof::Aggregated(agg) => {
            w.count("reveals", agg.members.len())?;
            for member in &agg.members {
                if !member.signature.is_empty() {
                    return Err(DidError::NonCanonical("aggregated member reveals must not carry signatures".to_string()));
                }
                write_member(w, member, false)?;
            }
            w.signature(KeyType::Bls12381G1, &agg.signature)?;
        }
    }
    Ok(())
}

fn read_proof(r: &mut Reader<'_>, threshold: bool, aggregated: bool) -> Result<Proof> {
    if !threshold {
        let reveal_value = r.hash32()?;
        let key_type = KeyType::from_tag(r.byte()?)?;
        let key = PublicKey::new(key_type, r.bytes(key_type.public_key_len())?.to_vec()).map_err(non_canonical_key)?;
        let signature = r.bytes(key_type.signature_len())?.to_vec();
        return Ok(Proof::Single(SingleReveal { reveal_value, key, signature }));
    }
    let count = r.byte()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        members.push(read_member(r, !aggregated)?);
    }
    if aggregated {
        let signature = r.bytes(KeyType::Bls12381G1.signature_len())?.to_vec();
        Ok(Proof::Aggregated(AggregatedProof { members, signature }))
    } else {
        Ok(Proof::Threshold(members))
    }
}

fn write_member(w: &mut Writer, member: &MemberReveal, with_signature: bool) -> Result<()> {
    w.byte(member.index);
    w.byte(member.key.key_type.tag());
    w.bytes(&member.key.bytes);
    w.count("merkle depth", member.siblings.len())?;
    for sibling in &member.siblings {
        w.hash32(sibling);
    }
    if with_signature {
        w.signature(member.key.key_type, &member.signature)?;
    }
    Ok(())
}

fn read_member(r: &mut Reader<'_>, with_signature: bool) -> Result<MemberReveal> {
    let index = r.byte()?;
    let key_type = KeyType::from_tag(r.byte()?)?;
    let key = PublicKey::new(key_type, r.bytes(key_type.public_key_len())?.to_vec()).map_err(non_canonical_key)?;
    let depth = r.byte()? as usize;
    let mut siblings = Vec::with_capacity(depth);
    for _ in 0..depth {
        siblings.push(r.hash32()?);
    }
    let signature = if with_signature { r.bytes(key_type.signature_len())?.to_vec() } else { Vec::new() };
    Ok(MemberReveal { index, key, siblings, signature })
}

fn write_delta(w: &mut Writer, delta: &Delta) -> Result<()> {
    w.count("patches", delta.patches.len())?;
    for patch in &delta.patches {
        write_patch(w, patch)?;
    }
    Ok(())
}

fn read_delta(r: &mut Reader<'_>) -> Result<Delta> {
    let count = r.byte()? as usize;
    let mut patches = Vec::with_capacity(count);
    for _ in 0..count {
        patches.push(read_patch(r)?);
    }
    Ok(Delta { patches })
}

fn write_patch(w: &mut Writer, patch: &Patch) -> Result<()> {
    w.byte(patch.tag());
    match patch {
        Patch::AddKeys(methods) => {
            let methods = sorted_methods(methods)?;
            w.count("patch keys", methods.len())?;
            for method in &methods {
                write_method(w, method)?;
            }
        }
        Patch::RemoveKeys(ids) => write_id_list(w, "patch key ids", ids)?,
        Patch::AddServices(services) => {
            let services = sorted_services(services)?;
            w.count("patch services", services.len())?;
            for service in &services {
                write_service(w, service)?;
            }
        }
        Patch::RemoveServices(ids) => write_id_list(w, "patch service ids", ids)?,
    }
    Ok(())
}

fn read_patch(r: &mut Reader<'_>) -> Result<Patch> {
    let tag = r.byte()?;
    let count = r.byte()? as usize;
    match tag {
        0x01 => {
            let mut methods = Vec::with_capacity(count);
            for _ in 0..count {
                methods.push(read_method(r)?);
            }
            check_ascending("patch key", methods.iter().map(|m| m.id.as_str()))?;
            Ok(Patch::AddKeys(methods))
        }
        0x02 => {
            let ids = read_id_list(r, count)?;
            Ok(Patch::RemoveKeys(ids))
        }
        0x03 => {
            let mut services = Vec::with_capacity(count);
            for _ in 0..count {
                services.push(read_service(r)?);
            }
            check_ascending("patch service", services.iter().map(|s| s.id.as_str()))?;
            Ok(Patch::AddServices(services))
        }
        0x04 => {
            let ids = read_id_list(r, count)?;
            Ok(Patch::RemoveServices(ids))
        }
        other => Err(DidError::UnknownPatchType(other)),
    }
}

fn write_id_list(w: &mut Writer, field: &'static str, ids: &[String]) -> Result<()> {
    let ids = sorted_ids(ids)?;
    w.count(field, ids.len())?;
    for id in &ids {
        w.short_string(id)?;
    }
    Ok(())
}

fn read_id_list(r: &mut Reader<'_>, count: usize) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(r.short_string()?);
    }
    check_ascending("id", ids.iter().map(|s| s.as_str()))?;
    Ok(ids)
}

fn write_method(w: &mut Writer, method: &VerificationMethod) -> Result<()> {
    w.short_string(&method.id)?;
    w.byte(method.key.key_type.tag());
    w.bytes(&method.key.bytes);
    w.byte(method.purposes);
    Ok(())
}

fn read_method(r: &mut Reader<'_>) -> Result<VerificationMethod> {
    let id = r.short_string()?;
    let key_type = KeyType::from_tag(r.byte()?)?;
    let key = PublicKey::new(key_type, r.bytes(key_type.public_key_len())?.to_vec()).map_err(non_canonical_key)?;
    let purposes = r.byte()?;
    Ok(VerificationMethod { id, key, purposes })
}

fn write_service(w: &mut Writer, service: &ServiceEndpoint) -> Result<()> {
    w.short_string(&service.id)?;
    w.short_string(&service.service_type)?;
    w.long_string(&service.endpoint)
}

fn read_service(r: &mut Reader<'_>) -> Result<ServiceEndpoint> {
    Ok(ServiceEndpoint { id: r.short_string()?, service_type: r.short_string()?, endpoint: r.long_string()? })
}

fn sorted_methods(methods: &[VerificationMethod]) -> Result<Vec<VerificationMethod>> {
    let mut sorted = methods.to_vec();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    check_ascending("key", sorted.iter().map(|m| m.id.as_str()))?;
    Ok(sorted)
}

fn sorted_services(services: &[ServiceEndpoint]) -> Result<Vec<ServiceEndpoint>> {
    let mut sorted = services.to_vec();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    check_ascending("service", sorted.iter().map(|s| s.id.as_str()))?;
    Ok(sorted)
}

fn sorted_ids(ids: &[String]) -> Result<Vec<String>> {
    let mut sorted = ids.to_vec();
    sorted.sort();
    check_ascending("id", sorted.iter().map(|s| s.as_str()))?;
    Ok(sorted)
}

/// Strictly ascending id order doubles as a uniqueness check.
fn check_ascending<'a>(what: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut previous: Option<&str> = None;
    for id in ids {
        if let Some(prev) = previous {
            if prev >= id {
                return Err(DidError::NonCanonical(format!("{} ids not in strictly ascending order: {:?} after {:?}", what, id, prev)));
            }
        }
        previous = Some(id);
    }
    Ok(())
}

fn non_canonical_key(err: DidError) -> DidError {
    DidError::NonCanonical(err.to_string())
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn byte(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    fn hash32(&mut self, value: &Hash32) {
        self.buf.extend_from_slice(value);
    }

    fn u16_be(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn count(&mut self, field: &'static str, len: usize) -> Result<()> {
        if len > MAX_COUNT {
            return Err(DidError::LengthOverflow { field, len, max: MAX_COUNT });
        }
        self.byte(len as u8);
        Ok(())
    }

    fn short_string(&mut self, value: &str) -> Result<()> {
        if value.len() > MAX_SHORT_STRING {
            return Err(DidError::LengthOverflow { field: "string", len: value.len(), max: MAX_SHORT_STRING });
        }
        self.byte(value.len() as u8);
        self.bytes(value.as_bytes());
        Ok(())
    }

    fn long_string(&mut self, value: &str) -> Result<()> {
        if value.len() > MAX_LONG_STRING {
            return Err(DidError::LengthOverflow { field: "endpoint", len: value.len(), max: MAX_LONG_STRING });
        }
        self.u16_be(value.len() as u16);
        self.bytes(value.as_bytes());
        Ok(())
    }

    fn signature(&mut self, key_type: KeyType, signature: &[u8]) -> Result<()> {
        if signature.len() != key_type.signature_len() {
            return Err(DidError::NonCanonical(format!(
                "{} signature must be {} bytes, got {}",
                key_type,
                key_type.signature_len(),
                signature.len()
            )));
        }
        self.bytes(signature);
        Ok(())
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8> {
        let slice = self.bytes(1)?;
        Ok(slice[0])
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if remaining < n {
            return Err(DidError::TruncatedPayload { offset: self.pos, needed: n - remaining });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn hash32(&mut self) -> Result<Hash32> {
        let slice = self.bytes(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u16_be(&mut self) -> Result<u16> {
        let slice = self.bytes(2)?;
        Ok(u16::from_be_bytes([slice[0], slice[1]]))
    }

    fn short_string(&mut self) -> Result<String> {
        let len = self.byte()? as usize;
        self.utf8(len)
    }

    fn long_string(&mut self) -> Result<String> {
        let len = self.u16_be()? as usize;
        self.utf8(len)
    }

    fn utf8(&mut self, len: usize) -> Result<String> {
        let slice = self.bytes(len)?;
        String::from_utf8(slice.to_vec()).map_err(|_| DidError::NonCanonical("string is not valid UTF-8".to_string()))
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(DidError::NonCanonical(format!("{} trailing bytes after operation body", self.data.len() - self.pos)));
        }
        Ok(())
    }
}
