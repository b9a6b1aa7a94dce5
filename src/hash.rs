// src/hash.rs

//! The hash primitive.
//!
//! A single axiomatic function from byte strings to fixed-width digests.
//! We treat it as injective (two distinct contents never share a digest);
//! SHA-256 is the concrete choice, documented here rather than left
//! implicit, because the rest of the engine (content addressing, operation
//! metadata, obliteration commitments) is written against the axiom, not
//! against a particular algorithm.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::{self, Read};

/// A SHA-256 content digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest {
    #[serde(with = "hex_serde")]
    bytes: [u8; 32],
}

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Some(Self { bytes: arr })
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let decoded = hex::decode(hex).ok()?;
        Self::from_slice(&decoded)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("digest must be exactly 32 bytes"))
    }
}

/// Hash a byte string.
pub fn hash(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest::from_bytes(hasher.finalize().into())
}

/// Hash a stream without buffering it entirely in memory.
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Digest::from_bytes(hasher.finalize().into()))
}

/// Verify that `data` hashes to `digest`.
pub fn verify(data: &[u8], digest: &Digest) -> bool {
    hash(data) == *digest
}

/// The digest of the empty byte string. Used to mark "no content" without a
/// sentinel `Option` at rest in persisted records.
pub fn null_hash() -> Digest {
    hash(&[])
}
