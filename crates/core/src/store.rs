//! On-disk object store
//!
//! Manages the store directory:
//! ```text
//! vc/
//!   config.toml
//!   HEAD
//!   LATEST
//!   <label>
//!   <40-hex>      one file per blob, tree and commit
//!   tmp/
//! ```

use crate::blob::Blob;
use crate::config::{StoreConfig, CONFIG_FILE};
use crate::error::{IoResultExt, StoreError};
use crate::hash::{ContentHash, HashMethod, HEX_LEN};
use crate::tree::{PathKey, Snapshot, Tree};
use dashmap::DashMap;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the staging directory used by [`atomic_write`]
pub const TMP_DIR: &str = "tmp";

/// Content-addressed object store rooted at one directory
pub struct ObjectStore {
    root: PathBuf,
    config: StoreConfig,
    tree_cache: DashMap<ContentHash, Arc<Tree>>,
}

impl ObjectStore {
    /// Open the store at `root`, creating it with `config` if it does not exist
    ///
    /// An existing store keeps its recorded hash method; asking for a
    /// different one is an error.
    pub fn open_or_init(root: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root.join(TMP_DIR)).at(root)?;

        let config = match StoreConfig::load(root)? {
            Some(existing) => {
                if existing.hash_method() != config.hash_method() {
                    return Err(StoreError::HashMethodMismatch {
                        stored: existing.hash_method().to_string(),
                        requested: config.hash_method().to_string(),
                    });
                }
                existing
            }
            None => {
                let text = config.to_toml()?;
                atomic_write(&root.join(TMP_DIR), &root.join(CONFIG_FILE), text.as_bytes())?;
                info!(root = %root.display(), method = %config.hash_method(), "initialized object store");
                config
            }
        };

        Ok(Self {
            root: root.to_path_buf(),
            config,
            tree_cache: DashMap::new(),
        })
    }

    /// Open an existing store, whatever its hash method
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let config = StoreConfig::load(root)?.ok_or_else(|| {
            StoreError::Config(format!("store not initialized at {}", root.display()))
        })?;
        std::fs::create_dir_all(root.join(TMP_DIR)).at(root)?;

        Ok(Self {
            root: root.to_path_buf(),
            config,
            tree_cache: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn hash_method(&self) -> HashMethod {
        self.config.hash_method()
    }

    pub fn hash(&self, data: &[u8]) -> ContentHash {
        self.hash_method().hash(data)
    }

    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).is_file()
    }

    /// Store encoded object bytes under `hash`
    ///
    /// Returns `false` when the object was already present (nothing written).
    pub fn write_object(&self, hash: &ContentHash, bytes: &[u8]) -> Result<bool, StoreError> {
        let path = self.object_path(hash);
        if path.exists() {
            debug!(object = %hash, "object already stored");
            return Ok(false);
        }
        atomic_write(&self.tmp_dir(), &path, bytes)?;
        Ok(true)
    }

    /// Raw object bytes, `None` if no such object exists
    pub fn read_object(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.object_path(hash);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Raw object bytes, checked against their key
    pub fn read_verified(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        let bytes = self
            .read_object(hash)?
            .ok_or_else(|| StoreError::MissingObject(hash.to_hex()))?;
        let actual = self.hash(&bytes);
        if actual != *hash {
            return Err(StoreError::corrupt(
                hash.to_hex(),
                format!("content hashes to {}", actual),
            ));
        }
        Ok(bytes)
    }

    /// All object keys starting with the (lowercase hex) `prefix`
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<ContentHash>, StoreError> {
        let prefix = prefix.to_ascii_lowercase();
        let mut keys = Vec::new();

        for entry in std::fs::read_dir(&self.root).at(&self.root)? {
            let entry = entry.at(&self.root)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if ContentHash::is_hex_key(name) && name.starts_with(&prefix) {
                keys.push(ContentHash::from_hex(name)?);
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Number of objects currently stored
    pub fn object_count(&self) -> Result<usize, StoreError> {
        Ok(self.keys_with_prefix("")?.len())
    }

    /// Store file contents as a blob
    pub fn write_blob(&self, data: &[u8]) -> Result<ContentHash, StoreError> {
        let (blob, encoded) = Blob::from_bytes(self.hash_method(), data);
        self.write_object(&blob.hash, &encoded)?;
        Ok(blob.hash)
    }

    /// File contents of a stored blob
    pub fn read_blob(&self, hash: &ContentHash) -> Result<Vec<u8>, StoreError> {
        let encoded = self.read_verified(hash)?;
        Blob::read_from_bytes(&encoded)
            .map(<[u8]>::to_vec)
            .map_err(|reason| StoreError::corrupt(hash.to_hex(), reason))
    }

    /// Store a tree object (its blobs must be written separately)
    pub fn write_tree(&self, tree: &Tree) -> Result<ContentHash, StoreError> {
        let serialized = tree.serialize();
        let hash = self.hash(&serialized);
        self.write_object(&hash, &serialized)?;
        self.tree_cache.insert(hash, Arc::new(tree.clone()));
        Ok(hash)
    }

    /// Load a tree, failing if it is missing or does not decode
    pub fn read_tree(&self, hash: &ContentHash) -> Result<Arc<Tree>, StoreError> {
        if let Some(cached) = self.tree_cache.get(hash) {
            return Ok(Arc::clone(&cached));
        }

        let bytes = self.read_verified(hash)?;
        let tree = Arc::new(
            Tree::deserialize(&bytes).map_err(|reason| StoreError::corrupt(hash.to_hex(), reason))?,
        );
        self.tree_cache.insert(*hash, Arc::clone(&tree));
        Ok(tree)
    }

    /// Persist a snapshot: every blob not yet stored, then the tree
    ///
    /// Blob contents are re-read from the snapshot's source directory and must
    /// still hash to what was captured. Safe to call repeatedly.
    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<ContentHash, StoreError> {
        let mut written = 0usize;

        for (key, blob_hash) in snapshot.tree.iter() {
            if self.contains(blob_hash) {
                continue;
            }
            let file = snapshot.source().join(key_to_path(key)?);
            let data = std::fs::read(&file).at(&file)?;
            let (blob, encoded) = Blob::from_bytes(self.hash_method(), &data);
            if blob.hash != *blob_hash {
                return Err(StoreError::corrupt(
                    blob_hash.to_hex(),
                    format!("{} changed since it was captured", file.display()),
                ));
            }
            if self.write_object(&blob.hash, &encoded)? {
                written += 1;
            }
        }

        let tree_hash = self.write_tree(&snapshot.tree)?;
        debug!(tree = %tree_hash, new_blobs = written, "wrote snapshot");
        Ok(tree_hash)
    }

    /// Write every file of `tree` into `target`
    ///
    /// Nothing is written until every blob has loaded and every destination
    /// is free to take a file. If a write still fails, the files already
    /// written are put back before the error is returned. Files in `target`
    /// that the tree does not mention are left alone.
    pub fn regenerate(&self, tree: &Tree, target: &Path) -> Result<Regeneration, StoreError> {
        let mut staged = Vec::with_capacity(tree.len());
        for (key, blob_hash) in tree.iter() {
            let file = target.join(key_to_path(key)?);
            check_restorable(target, &file)?;
            staged.push((file, self.read_blob(blob_hash)?));
        }

        let mut regeneration = Regeneration::default();
        for (file, data) in &staged {
            if let Err(e) = regeneration.write(file, data) {
                if let Err(rollback) = regeneration.rollback() {
                    warn!(error = %rollback, target = %target.display(), "rollback of partial regeneration failed");
                }
                return Err(e);
            }
        }

        debug!(
            files = staged.len(),
            changed = regeneration.len(),
            target = %target.display(),
            "regenerated tree"
        );
        Ok(regeneration)
    }
}

/// Files changed by [`ObjectStore::regenerate`], with what they held before
///
/// Dropping it keeps the new contents; [`Regeneration::rollback`] restores
/// the old ones.
#[derive(Debug, Default)]
pub struct Regeneration {
    replaced: Vec<(PathBuf, Option<Vec<u8>>)>,
    created_dirs: Vec<PathBuf>,
}

impl Regeneration {
    /// Number of files whose contents changed
    pub fn len(&self) -> usize {
        self.replaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty()
    }

    fn write(&mut self, file: &Path, data: &[u8]) -> Result<(), StoreError> {
        let previous = match std::fs::read(file) {
            Ok(bytes) if bytes == data => return Ok(()),
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::io(file, e)),
        };

        if let Some(parent) = file.parent() {
            if let Some(created) = first_missing_ancestor(parent) {
                self.created_dirs.push(created);
            }
            std::fs::create_dir_all(parent).at(parent)?;
        }

        // recorded first so a half-written file is restored too
        self.replaced.push((file.to_path_buf(), previous));
        std::fs::write(file, data).at(file)
    }

    /// Put every changed file back, then remove directories this run created
    ///
    /// Keeps going past individual failures and reports the first one.
    pub fn rollback(self) -> Result<(), StoreError> {
        let mut first_error = None;

        for (file, previous) in self.replaced.into_iter().rev() {
            let result = match previous {
                Some(bytes) => std::fs::write(&file, bytes).at(&file),
                None => remove_if_present(&file, std::fs::remove_file(&file)),
            };
            if let Err(e) = result {
                warn!(error = %e, "failed to restore file");
                first_error.get_or_insert(e);
            }
        }

        for dir in self.created_dirs.into_iter().rev() {
            if let Err(e) = remove_if_present(&dir, std::fs::remove_dir_all(&dir)) {
                warn!(error = %e, "failed to remove directory");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn remove_if_present(path: &Path, result: std::io::Result<()>) -> Result<(), StoreError> {
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(StoreError::io(path, e)),
        _ => Ok(()),
    }
}

/// Topmost ancestor of `dir` that does not exist yet
fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() || ancestor.symlink_metadata().is_ok() {
            break;
        }
        missing = Some(ancestor.to_path_buf());
    }
    missing
}

/// `file` must be absent or a regular file, and every directory between
/// `target` and `file` must be absent or a real directory
fn check_restorable(target: &Path, file: &Path) -> Result<(), StoreError> {
    if let Ok(meta) = file.symlink_metadata() {
        if !meta.is_file() {
            return Err(StoreError::RestoreConflict(file.to_path_buf()));
        }
    }

    for dir in file.ancestors().skip(1) {
        if dir == target {
            break;
        }
        if let Ok(meta) = dir.symlink_metadata() {
            if !meta.is_dir() {
                return Err(StoreError::RestoreConflict(dir.to_path_buf()));
            }
        }
    }
    Ok(())
}

/// Atomic write helper
///
/// Writes data to a temporary file in `tmp_dir`, fsyncs it, then renames it
/// over the target path.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<(), StoreError> {
    use std::fs;
    use std::io::Write;

    fs::create_dir_all(tmp_dir).at(tmp_dir)?;
    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let result = (|| {
        let mut temp_file = fs::File::create(&temp_path).at(&temp_path)?;
        temp_file.write_all(data).at(&temp_path)?;
        temp_file.sync_all().at(&temp_path)?;
        drop(temp_file);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::rename(&temp_path, target).at(target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    // Fsync parent directory for durability
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Normalize a relative path into a tree key
///
/// - Joins components with `/`
/// - Rejects `..` and absolute paths
/// - Removes `./` components
pub fn normalize_path(path: &Path) -> Result<PathKey, StoreError> {
    let mut key = PathKey::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => {
                let bytes = component_bytes(part)
                    .ok_or_else(|| StoreError::UnsupportedPath(path.display().to_string()))?;
                if !key.is_empty() {
                    key.push(b'/');
                }
                key.extend_from_slice(bytes);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoreError::PathEscape(path.display().to_string()));
            }
        }
    }

    if key.is_empty() {
        return Err(StoreError::PathEscape(path.display().to_string()));
    }
    Ok(key)
}

/// Turn a tree key back into a relative path
///
/// Every `/`-separated part must be a single plain file name.
pub fn key_to_path(key: &[u8]) -> Result<PathBuf, StoreError> {
    let shown = || String::from_utf8_lossy(key).into_owned();
    let mut path = PathBuf::new();

    for part in key.split(|&b| b == b'/') {
        let name = component_os(part).ok_or_else(|| StoreError::UnsupportedPath(shown()))?;
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(name),
            _ => return Err(StoreError::PathEscape(shown())),
        }
    }
    Ok(path)
}

#[cfg(unix)]
fn component_bytes(part: &OsStr) -> Option<&[u8]> {
    use std::os::unix::ffi::OsStrExt;
    Some(part.as_bytes())
}

#[cfg(not(unix))]
fn component_bytes(part: &OsStr) -> Option<&[u8]> {
    part.to_str().map(str::as_bytes)
}

#[cfg(unix)]
fn component_os(bytes: &[u8]) -> Option<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn component_os(bytes: &[u8]) -> Option<&OsStr> {
    std::str::from_utf8(bytes).ok().map(OsStr::new)
}

/// Whether `name` is usable as a label file name inside the store
pub fn is_valid_label_name(name: &str) -> bool {
    !name.is_empty()
        && name != CONFIG_FILE
        && name != TMP_DIR
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !(name.len() == HEX_LEN && ContentHash::is_hex_key(name))
}
