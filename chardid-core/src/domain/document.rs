use crate::domain::keys::PublicKey;
use crate::foundation::DidError;
use serde::{Deserialize, Serialize};

pub const PURPOSE_AUTHENTICATION: u8 = 0x01;
pub const PURPOSE_ASSERTION: u8 = 0x02;
pub const PURPOSE_KEY_AGREEMENT: u8 = 0x04;
pub const PURPOSE_CAPABILITY_INVOCATION: u8 = 0x08;
pub const PURPOSE_CAPABILITY_DELEGATION: u8 = 0x10;

/// All defined purpose bits. Anything outside this mask is reserved.
pub const PURPOSE_MASK_ALL: u8 = 0x1F;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMethod {
    pub id: String,
    pub key: PublicKey,
    pub purposes: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    pub service_type: String,
    pub endpoint: String,
}

/// A DID document: ordered verification methods and services.
///
/// Both sequences are kept sorted by id at all times, which makes the
/// in-memory form canonical: serializing a document after any sequence of
/// patches yields byte-identical output on every node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    pub verification_methods: Vec<VerificationMethod>,
    pub services: Vec<ServiceEndpoint>,
}

/// Closed set of document mutations carried by UPDATE / RECOVER deltas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Patch {
    AddKeys(Vec<VerificationMethod>),
    RemoveKeys(Vec<String>),
    AddServices(Vec<ServiceEndpoint>),
    RemoveServices(Vec<String>),
}

impl Patch {
    pub const fn tag(&self) -> u8 {
        match self {
            Patch::AddKeys(_) => 0x01,
            Patch::RemoveKeys(_) => 0x02,
            Patch::AddServices(_) => 0x03,
            Patch::RemoveServices(_) => 0x04,
        }
    }
}

impl DidDocument {
    pub fn new(verification_methods: Vec<VerificationMethod>, services: Vec<ServiceEndpoint>) -> Result<Self, DidError> {
        let mut doc = Self { verification_methods, services };
        doc.verification_methods.sort_by(|a, b| a.id.cmp(&b.id));
        doc.services.sort_by(|a, b| a.id.cmp(&b.id));
        doc.check_invariants()?;
        Ok(doc)
    }

    /// Key ids unique, service ids unique, purpose masks within the
    /// defined bits.
    pub fn check_invariants(&self) -> Result<(), DidError> {
        for pair in self.verification_methods.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(DidError::InvalidDocument(format!("duplicate key id: {}", pair[0].id)));
            }
        }
        for pair in self.services.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(DidError::InvalidDocument(format!("duplicate service id: {}", pair[0].id)));
            }
        }
        for method in &self.verification_methods {
            if method.purposes & !PURPOSE_MASK_ALL != 0 {
                return Err(DidError::InvalidDocument(format!("reserved purpose bits set on key {}: {:#04x}", method.id, method.purposes)));
            }
        }
        Ok(())
    }

    pub fn key(&self, id: &str) -> Option<&VerificationMethod> {
        self.verification_methods.iter().find(|m| m.id == id)
    }

    pub fn service(&self, id: &str) -> Option<&ServiceEndpoint> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Applies one patch. Adds upsert by id; removes are no-ops for ids
    /// that are not present. Sorted order is preserved.
    pub fn apply_patch(&mut self, patch: &Patch) {
        match patch {
            Patch::AddKeys(methods) => {
                for method in methods {
                    self.upsert_key(method.clone());
                }
            }
            Patch::RemoveKeys(ids) => {
                self.verification_methods.retain(|m| !ids.iter().any(|id| *id == m.id));
            }
            Patch::AddServices(services) => {
                for service in services {
                    self.upsert_service(service.clone());
                }
            }
            Patch::RemoveServices(ids) => {
                self.services.retain(|s| !ids.iter().any(|id| *id == s.id));
            }
        }
    }

    pub fn apply_patches(&mut self, patches: &[Patch]) {
        for patch in patches {
            self.apply_patch(patch);
        }
    }

    fn upsert_key(&mut self, method: VerificationMethod) {
        match self.verification_methods.binary_search_by(|m| m.id.cmp(&method.id)) {
            Ok(pos) => self.verification_methods[pos] = method,
            Err(pos) => self.verification_methods.insert(pos, method),
        }
    }

    fn upsert_service(&mut self, service: ServiceEndpoint) {
        match self.services.binary_search_by(|s| s.id.cmp(&service.id)) {
            Ok(pos) => self.services[pos] = service,
            Err(pos) => self.services.insert(pos, service),
        }
    }
}
