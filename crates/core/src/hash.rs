//! Content hashing for object identifiers
//!
//! Every object in the store is keyed by a 20-byte digest. SHA-1 is the
//! default; BLAKE3 is available with its output truncated to the same width
//! through the extendable-output reader, so the key format never changes.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Digest width in bytes
pub const HASH_LEN: usize = 20;

/// Length of the hex form of a [`ContentHash`]
pub const HEX_LEN: usize = HASH_LEN * 2;

/// Length of the abbreviated hash shown in history output
pub const SHORT_LEN: usize = 5;

/// A 20-byte content hash
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex form, also the object's file name
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First [`SHORT_LEN`] hex characters
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_LEN);
        hex
    }

    /// Parse from a full-length hex string
    pub fn from_hex(s: &str) -> Result<Self, StoreError> {
        if s.len() != HEX_LEN {
            return Err(StoreError::corrupt(
                s,
                format!("expected {} hex characters, got {}", HEX_LEN, s.len()),
            ));
        }
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| StoreError::corrupt(s, e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Whether `s` looks like a full hex hash
    pub fn is_hex_key(s: &str) -> bool {
        s.len() == HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash algorithm used by a store
///
/// Fixed for the lifetime of a store; recorded in `config.toml`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashMethod {
    #[default]
    Sha1,
    Blake3,
}

impl HashMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashMethod::Sha1 => "sha1",
            HashMethod::Blake3 => "blake3",
        }
    }

    /// Hash a byte slice in one shot
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    pub fn hasher(&self) -> IncrementalHasher {
        IncrementalHasher::new(*self)
    }

    /// Hash a file's bytes behind a prefix, streaming the contents
    pub fn hash_file_with_prefix(&self, prefix: &[u8], path: &Path) -> std::io::Result<ContentHash> {
        use std::fs::File;
        use std::io::{BufReader, Read};

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = self.hasher();
        hasher.update(prefix);

        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize())
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HashMethod {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashMethod::Sha1),
            "blake3" => Ok(HashMethod::Blake3),
            other => Err(StoreError::Config(format!("unknown hash method: {}", other))),
        }
    }
}

enum HasherInner {
    Sha1(sha1::Sha1),
    Blake3(Box<blake3::Hasher>),
}

/// Incremental hasher for building hashes across multiple chunks
pub struct IncrementalHasher {
    inner: HasherInner,
}

impl IncrementalHasher {
    pub fn new(method: HashMethod) -> Self {
        use sha1::Digest;

        let inner = match method {
            HashMethod::Sha1 => HasherInner::Sha1(sha1::Sha1::new()),
            HashMethod::Blake3 => HasherInner::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self { inner }
    }

    pub fn update(&mut self, data: &[u8]) {
        use sha1::Digest;

        match &mut self.inner {
            HasherInner::Sha1(h) => h.update(data),
            HasherInner::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> ContentHash {
        use sha1::Digest;

        let mut out = [0u8; HASH_LEN];
        match self.inner {
            HasherInner::Sha1(h) => out.copy_from_slice(&h.finalize()),
            HasherInner::Blake3(h) => h.finalize_xof().fill(&mut out),
        }
        ContentHash::from_bytes(out)
    }
}
