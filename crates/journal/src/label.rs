//! Labels: named, mutable pointers to commits

use crate::commit::Commit;
use keepsake_core::store::{atomic_write, is_valid_label_name};
use keepsake_core::{ContentHash, ObjectStore, Result, StoreError};
use std::path::PathBuf;
use tracing::{debug, warn};

/// The engine's current position
pub const HEAD: &str = "HEAD";

/// Where HEAD was before the most recent revert
pub const LATEST: &str = "LATEST";

const REF_PREFIX: &str = "ref: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub commit: ContentHash,
}

impl Label {
    pub fn new(name: impl Into<String>, commit: ContentHash) -> Self {
        Self {
            name: name.into(),
            commit,
        }
    }

    /// File contents: `ref: <full-hex-hash>`
    pub fn to_file_contents(&self) -> String {
        format!("{}{}", REF_PREFIX, self.commit.to_hex())
    }

    pub fn parse(name: &str, contents: &str) -> Option<Self> {
        let hex = contents.trim().strip_prefix(REF_PREFIX)?;
        let commit = ContentHash::from_hex(hex.trim()).ok()?;
        Some(Self::new(name, commit))
    }
}

/// Label files kept alongside the objects in the store root
pub struct LabelStore<'s> {
    store: &'s ObjectStore,
}

impl<'s> LabelStore<'s> {
    pub fn new(store: &'s ObjectStore) -> Self {
        Self { store }
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_label_name(name) {
            return Err(StoreError::InvalidLabel(name.to_string()));
        }
        Ok(self.store.root().join(name))
    }

    /// Whether a file for `name` exists, readable or not
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Look a label up; missing, invalid and unparsable all give `None`
    pub fn fetch_by_name(&self, name: &str) -> Option<Label> {
        let path = self.path(name).ok()?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(label = name, error = %e, "failed to read label");
                return None;
            }
        };

        let label = Label::parse(name, &contents);
        if label.is_none() {
            warn!(label = name, "label file is not of the form 'ref: <hash>'");
        }
        label
    }

    /// Point a label at a commit, replacing any previous value atomically
    pub fn write(&self, label: &Label) -> Result<()> {
        let path = self.path(&label.name)?;
        atomic_write(&self.store.tmp_dir(), &path, label.to_file_contents().as_bytes())?;
        debug!(label = %label.name, commit = %label.commit, "label updated");
        Ok(())
    }

    pub fn move_head(&self, commit: &Commit) -> Result<()> {
        self.write(&Label::new(HEAD, commit.hash))
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Every readable label, sorted by name
    pub fn list(&self) -> Result<Vec<Label>> {
        let root = self.store.root();
        let mut labels = Vec::new();

        for entry in std::fs::read_dir(root).map_err(|e| StoreError::io(root, e))? {
            let entry = entry.map_err(|e| StoreError::io(root, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_valid_label_name(&name) {
                continue;
            }
            if let Some(label) = self.fetch_by_name(&name) {
                labels.push(label);
            }
        }

        labels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_core::StoreConfig;

    fn temp_store(dir: &std::path::Path) -> ObjectStore {
        ObjectStore::open_or_init(&dir.join("vc"), StoreConfig::default()).unwrap()
    }

    #[test]
    fn test_write_and_fetch() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = temp_store(temp_dir.path());
        let labels = LabelStore::new(&store);

        let hash = store.hash(b"commit");
        labels.write(&Label::new(LATEST, hash))?;

        assert_eq!(labels.fetch_by_name(LATEST), Some(Label::new(LATEST, hash)));
        let on_disk = std::fs::read_to_string(store.root().join(LATEST))?;
        assert_eq!(on_disk, format!("ref: {}", hash.to_hex()));
        Ok(())
    }

    #[test]
    fn test_overwrite() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = temp_store(temp_dir.path());
        let labels = LabelStore::new(&store);

        labels.write(&Label::new(HEAD, store.hash(b"one")))?;
        labels.write(&Label::new(HEAD, store.hash(b"two")))?;

        assert_eq!(labels.fetch_by_name(HEAD).map(|l| l.commit), Some(store.hash(b"two")));
        assert_eq!(std::fs::read_dir(store.tmp_dir())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_missing_and_garbled_labels() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = temp_store(temp_dir.path());
        let labels = LabelStore::new(&store);

        assert_eq!(labels.fetch_by_name(LATEST), None);

        std::fs::write(store.root().join(LATEST), "not a ref")?;
        assert_eq!(labels.fetch_by_name(LATEST), None);
        assert!(labels.exists(LATEST));

        assert_eq!(labels.fetch_by_name("../escape"), None);
        Ok(())
    }

    #[test]
    fn test_invalid_names_are_refused() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = temp_store(temp_dir.path());
        let labels = LabelStore::new(&store);
        let hash = store.hash(b"c");

        assert!(matches!(
            labels.write(&Label::new("config.toml", hash)),
            Err(StoreError::InvalidLabel(_))
        ));
        assert!(labels.write(&Label::new(hash.to_hex(), hash)).is_err());
        assert!(labels.write(&Label::new("a/b", hash)).is_err());
        Ok(())
    }

    #[test]
    fn test_list_skips_objects_and_config() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let store = temp_store(temp_dir.path());
        let labels = LabelStore::new(&store);

        store.write_blob(b"some object")?;
        labels.write(&Label::new(HEAD, store.hash(b"h")))?;
        labels.write(&Label::new("before-import", store.hash(b"b")))?;

        let names: Vec<_> = labels.list()?.into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["HEAD".to_string(), "before-import".to_string()]);

        labels.delete("before-import")?;
        labels.delete("before-import")?;
        assert_eq!(labels.list()?.len(), 1);
        Ok(())
    }
}
