//! Blob encoding: the stored form of one file's contents

use crate::hash::{ContentHash, HashMethod};
use std::path::Path;

/// A blob represents a stored file's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    /// Hash of the encoded blob (magic + content)
    pub hash: ContentHash,
    /// Content size in bytes
    pub size: u64,
}

impl Blob {
    /// Magic prefix that keeps blobs out of the tree/commit keyspace
    pub const MAGIC: &'static [u8; 4] = b"KSB1";

    /// Encode file contents, returning the blob metadata and the bytes to store
    pub fn from_bytes(method: HashMethod, data: &[u8]) -> (Self, Vec<u8>) {
        let mut encoded = Vec::with_capacity(Self::MAGIC.len() + data.len());
        encoded.extend_from_slice(Self::MAGIC);
        encoded.extend_from_slice(data);

        let blob = Blob {
            hash: method.hash(&encoded),
            size: data.len() as u64,
        };
        (blob, encoded)
    }

    /// Hash of the blob that would hold `data`
    pub fn hash_of(method: HashMethod, data: &[u8]) -> ContentHash {
        Self::from_bytes(method, data).0.hash
    }

    /// Hash a file as a blob without loading it whole
    pub fn hash_file(method: HashMethod, path: &Path) -> std::io::Result<ContentHash> {
        method.hash_file_with_prefix(Self::MAGIC, path)
    }

    /// Strip the header from stored bytes
    pub fn read_from_bytes(encoded: &[u8]) -> Result<&[u8], String> {
        encoded
            .strip_prefix(Self::MAGIC.as_slice())
            .ok_or_else(|| "not a blob object".to_string())
    }
}
