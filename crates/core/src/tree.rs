//! Tree representation for directory snapshots

use crate::error::{IoResultExt, StoreError};
use crate::hash::{ContentHash, HashMethod, HASH_LEN};
use crate::store::{normalize_path, ObjectStore};
use crate::blob::Blob;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Relative, `/`-separated path bytes; short paths stay on the stack
///
/// File names are kept as the platform gives them, so they need not be UTF-8.
pub type PathKey = SmallVec<[u8; 64]>;

/// A tree is one full snapshot of a tracked directory
///
/// Entries are kept sorted by path so serialization (and therefore the tree
/// hash) only depends on content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<PathKey, ContentHash>,
}

impl Tree {
    pub const MAGIC: &'static [u8; 4] = b"KST1";

    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path (already normalized) pointing at a blob
    pub fn insert(&mut self, path: impl AsRef<[u8]>, blob_hash: ContentHash) {
        self.entries.insert(SmallVec::from_slice(path.as_ref()), blob_hash);
    }

    pub fn get(&self, path: impl AsRef<[u8]>) -> Option<&ContentHash> {
        self.entries.get(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order, keys as raw path bytes
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &ContentHash)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Serialize the tree (magic included)
    ///
    /// Format:
    /// - magic: "KST1" (4 bytes)
    /// - entry_count: u32
    /// - entries, sorted by path:
    ///   - path_len: u16
    ///   - path_bytes: [u8; path_len]
    ///   - blob_hash: [u8; 20]
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.entries.len() * (2 + 32 + HASH_LEN));
        bytes.extend_from_slice(Self::MAGIC);
        bytes.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for (path_bytes, blob_hash) in &self.entries {
            bytes.extend_from_slice(&(path_bytes.len() as u16).to_le_bytes());
            bytes.extend_from_slice(path_bytes);
            bytes.extend_from_slice(blob_hash.as_bytes());
        }

        bytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 8 {
            return Err("tree data too short".to_string());
        }
        if &bytes[0..4] != Self::MAGIC {
            return Err("not a tree object".to_string());
        }

        let entry_count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let mut entries = BTreeMap::new();
        let mut offset = 8;

        for _ in 0..entry_count {
            if offset + 2 > bytes.len() {
                return Err("incomplete entry".to_string());
            }
            let path_len = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as usize;
            offset += 2;

            if offset + path_len + HASH_LEN > bytes.len() {
                return Err("entry runs past end of data".to_string());
            }
            let path_bytes = PathKey::from_slice(&bytes[offset..offset + path_len]);
            offset += path_len;

            let mut hash_bytes = [0u8; HASH_LEN];
            hash_bytes.copy_from_slice(&bytes[offset..offset + HASH_LEN]);
            offset += HASH_LEN;

            entries.insert(path_bytes, ContentHash::from_bytes(hash_bytes));
        }

        if offset != bytes.len() {
            return Err("trailing bytes after last entry".to_string());
        }

        Ok(Self { entries })
    }

    /// Hash of the serialized tree; equal content gives equal hashes
    pub fn hash(&self, method: HashMethod) -> ContentHash {
        method.hash(&self.serialize())
    }
}

/// A tree captured from disk, remembering where its blobs came from
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tree: Tree,
    pub hash: ContentHash,
    source: PathBuf,
}

impl Snapshot {
    /// Hash every regular file under `dir` without writing anything
    ///
    /// The store directory is skipped when it lives inside `dir`.
    pub fn capture(store: &ObjectStore, dir: &Path) -> Result<Self, StoreError> {
        let dir = dir.canonicalize().at(dir)?;
        let store_root = store.root().canonicalize().at(store.root())?;
        let method = store.hash_method();

        let mut tree = Tree::new();
        let walker = WalkDir::new(&dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.path() != store_root);

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                StoreError::io(path, source)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&dir)
                .map_err(|_| StoreError::PathEscape(entry.path().display().to_string()))?;
            let key = normalize_path(relative)?;
            let blob_hash = Blob::hash_file(method, entry.path()).at(entry.path())?;
            tree.insert(key, blob_hash);
        }

        let hash = tree.hash(method);
        debug!(tree = %hash, entries = tree.len(), "captured snapshot of {}", dir.display());

        Ok(Self {
            tree,
            hash,
            source: dir,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Differences between two trees, by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl TreeDiff {
    pub fn diff(old: &Tree, new: &Tree) -> Self {
        let mut diff = TreeDiff::default();

        for (path, new_hash) in &new.entries {
            let name = String::from_utf8_lossy(path).into_owned();
            match old.entries.get(path) {
                None => diff.added.push(name),
                Some(old_hash) if old_hash != new_hash => diff.modified.push(name),
                Some(_) => {}
            }
        }
        for path in old.entries.keys() {
            if !new.entries.contains_key(path) {
                diff.removed.push(String::from_utf8_lossy(path).into_owned());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}
