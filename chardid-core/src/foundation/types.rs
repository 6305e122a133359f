use crate::foundation::constants::DID_PREFIX;
use crate::foundation::util::encoding::{base64url_decode, base64url_encode};
use crate::foundation::DidError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

pub type Hash32 = [u8; 32];

/// The 32-byte self-certifying identifier of a DID: the SHA-256 of the
/// canonical CREATE body. Displayed as unpadded base64url, the same form
/// used in the textual `did:char:` URI.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct DidSuffix(Hash32);

impl DidSuffix {
    pub const fn new(value: Hash32) -> Self {
        Self(value)
    }

    pub fn as_hash(&self) -> &Hash32 {
        &self.0
    }

    pub fn to_uri(&self) -> String {
        format!("{}{}", DID_PREFIX, self)
    }

    /// Parses either a full `did:char:<suffix>` URI or a bare suffix.
    pub fn parse_did(did: &str) -> Result<Self, DidError> {
        let encoded = did.strip_prefix(DID_PREFIX).unwrap_or(did);
        encoded.parse()
    }
}

impl fmt::Display for DidSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64url_encode(&self.0))
    }
}

impl fmt::LowerHex for DidSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for DidSuffix {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = base64url_decode(s)?;
        let array: Hash32 =
            bytes.as_slice().try_into().map_err(|_| DidError::InvalidDid(format!("suffix must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self(array))
    }
}

impl Serialize for DidSuffix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for DidSuffix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            let bytes = Hash32::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}

impl AsRef<[u8]> for DidSuffix {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for DidSuffix {
    type Target = Hash32;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Hash32> for DidSuffix {
    fn from(value: Hash32) -> Self {
        Self(value)
    }
}

impl From<DidSuffix> for Hash32 {
    fn from(value: DidSuffix) -> Self {
        value.0
    }
}
