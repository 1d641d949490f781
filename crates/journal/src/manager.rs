//! Version manager: commit, history and revert over one tracked directory

use crate::commit::{Commit, CommitLog};
use crate::history::History;
use crate::label::{Label, LabelStore, HEAD, LATEST};
use keepsake_core::error::IoResultExt;
use keepsake_core::{ObjectStore, Result, Snapshot, StoreConfig, StoreError};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Message of the commit created when a store is bootstrapped
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial Commit";

/// Default store directory name
pub const DEFAULT_STORE_DIR: &str = "vc";

/// Session handle over one store and the directory it versions
///
/// Mutating operations take `&mut self`; one handle is one writer.
pub struct VersionManager {
    store: ObjectStore,
    tracked_dir: PathBuf,
    head: Commit,
}

impl VersionManager {
    /// Open the store at `store_root`, bootstrapping it if it has no HEAD yet
    ///
    /// A fresh store gets one parentless commit of the tracked directory's
    /// current contents.
    pub fn open(
        store_root: impl AsRef<Path>,
        tracked_dir: impl AsRef<Path>,
        config: StoreConfig,
    ) -> Result<Self> {
        let tracked_dir = tracked_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&tracked_dir).at(&tracked_dir)?;
        let store = ObjectStore::open_or_init(store_root.as_ref(), config)?;

        let head = {
            let labels = LabelStore::new(&store);
            match labels.fetch_by_name(HEAD) {
                Some(label) => CommitLog::new(&store).load(&label.commit)?,
                None if labels.exists(HEAD) => {
                    return Err(StoreError::corrupt(HEAD, "label is not of the form 'ref: <hash>'"));
                }
                None => {
                    let commit = record(&store, &tracked_dir, INITIAL_COMMIT_MESSAGE, None)?;
                    info!(commit = %commit.hash, "bootstrapped new store");
                    commit
                }
            }
        };

        Ok(Self {
            store,
            tracked_dir,
            head,
        })
    }

    pub fn head(&self) -> &Commit {
        &self.head
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn tracked_dir(&self) -> &Path {
        &self.tracked_dir
    }

    pub fn commits(&self) -> CommitLog<'_> {
        CommitLog::new(&self.store)
    }

    pub fn labels(&self) -> LabelStore<'_> {
        LabelStore::new(&self.store)
    }

    /// Record the tracked directory; failures are logged and give `false`
    pub fn commit(&mut self, message: &str) -> bool {
        match self.try_commit(message) {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, message, "commit failed");
                false
            }
        }
    }

    /// Record the tracked directory as a child of HEAD and move HEAD to it
    ///
    /// HEAD only moves once the tree, its blobs and the commit are on disk.
    pub fn try_commit(&mut self, message: &str) -> Result<Commit> {
        let commit = record(&self.store, &self.tracked_dir, message, Some(&self.head))?;
        info!(commit = %commit.hash, parent = %self.head.hash, "committed");
        self.head = commit.clone();
        Ok(commit)
    }

    /// History of HEAD, split against `LATEST` when that label resolves
    pub fn history(&self) -> Result<History> {
        let commits = self.commits();
        let marker = self
            .labels()
            .fetch_by_name(LATEST)
            .and_then(|label| commits.fetch_by_hash(&label.commit.to_hex()));
        History::reconstruct(&commits, &self.head, marker.as_ref())
    }

    /// Rendered history lines
    pub fn retrieve_history(&self) -> Result<Vec<String>> {
        Ok(self.history()?.render())
    }

    /// Restore the commit matching `prefix` onto the tracked directory
    ///
    /// Unknown prefixes give `Ok(None)` and change nothing. Otherwise the
    /// current HEAD is kept in `LATEST`, the target's files are written
    /// (files it does not know about are left in place) and HEAD moves.
    /// A failure at any step puts the files and `LATEST` back.
    pub fn revert(&mut self, prefix: &str) -> Result<Option<Commit>> {
        let Some(target) = self.commits().fetch_by_hash(prefix) else {
            info!(prefix, "no commit matches, nothing reverted");
            return Ok(None);
        };
        let tree = self.store.read_tree(&target.tree)?;

        let labels = self.labels();
        let previous_marker = labels.fetch_by_name(LATEST);
        labels.write(&Label::new(LATEST, self.head.hash))?;

        let regeneration = match self.store.regenerate(&tree, &self.tracked_dir) {
            Ok(regeneration) => regeneration,
            Err(e) => {
                restore_marker(&labels, previous_marker);
                return Err(e);
            }
        };
        if let Err(e) = labels.move_head(&target) {
            if let Err(rollback) = regeneration.rollback() {
                warn!(error = %rollback, "failed to put files back after aborted revert");
            }
            restore_marker(&labels, previous_marker);
            return Err(e);
        }

        info!(from = %self.head.hash, to = %target.hash, "reverted");
        self.head = target.clone();
        Ok(Some(target))
    }
}

/// Snapshot `tracked_dir`, persist tree and commit, then move HEAD
fn record(store: &ObjectStore, tracked_dir: &Path, message: &str, parent: Option<&Commit>) -> Result<Commit> {
    let snapshot = Snapshot::capture(store, tracked_dir)?;
    let tree = store.write_snapshot(&snapshot)?;

    let commits = CommitLog::new(store);
    let commit = commits.create_commit(message, tree, parent)?;
    commits.write(&commit)?;

    LabelStore::new(store).move_head(&commit)?;
    Ok(commit)
}

fn restore_marker(labels: &LabelStore<'_>, previous: Option<Label>) {
    let result = match previous {
        Some(label) => labels.write(&label),
        None => labels.delete(LATEST),
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to restore LATEST after aborted revert");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn open(root: &Path) -> VersionManager {
        VersionManager::open(root.join("vc"), root.join("data"), StoreConfig::default()).unwrap()
    }

    #[test]
    fn test_bootstrap_creates_initial_commit() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let manager = open(temp_dir.path());

        assert_eq!(manager.head().message, INITIAL_COMMIT_MESSAGE);
        assert_eq!(manager.head().parent, None);
        assert_eq!(
            manager.labels().fetch_by_name(HEAD).map(|l| l.commit),
            Some(manager.head().hash)
        );
        Ok(())
    }

    #[test]
    fn test_reopen_loads_head() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let head = {
            let mut manager = open(temp_dir.path());
            fs::write(temp_dir.path().join("data/a.txt"), "x")?;
            assert!(manager.commit("add a"));
            manager.head().clone()
        };

        let reopened = open(temp_dir.path());
        assert_eq!(reopened.head(), &head);
        assert_eq!(reopened.commits().ancestor_chain(&head)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_garbled_head_refuses_to_open() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        drop(open(temp_dir.path()));
        fs::write(temp_dir.path().join("vc/HEAD"), "garbage")?;

        let result = VersionManager::open(
            temp_dir.path().join("vc"),
            temp_dir.path().join("data"),
            StoreConfig::default(),
        );
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        Ok(())
    }

    #[test]
    fn test_failed_commit_leaves_head() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut manager = open(temp_dir.path());
        let before = manager.head().clone();

        fs::remove_dir_all(temp_dir.path().join("data"))?;
        assert!(!manager.commit("tracked directory is gone"));

        assert_eq!(manager.head(), &before);
        assert_eq!(
            manager.labels().fetch_by_name(HEAD).map(|l| l.commit),
            Some(before.hash)
        );
        Ok(())
    }

    #[test]
    fn test_revert_unknown_changes_nothing() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut manager = open(temp_dir.path());
        fs::write(temp_dir.path().join("data/a.txt"), "x")?;
        assert!(manager.commit("add a"));
        let head = manager.head().clone();

        assert_eq!(manager.revert("doesNotExist")?, None);
        assert_eq!(manager.revert("00000")?, None);

        assert_eq!(manager.head(), &head);
        assert_eq!(manager.labels().fetch_by_name(LATEST), None);
        assert_eq!(fs::read_to_string(temp_dir.path().join("data/a.txt"))?, "x");
        Ok(())
    }

    #[test]
    fn test_revert_with_missing_blob_rolls_back_marker() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut manager = open(temp_dir.path());
        fs::write(temp_dir.path().join("data/a.txt"), "x")?;
        assert!(manager.commit("add a"));
        let c1 = manager.head().clone();
        fs::write(temp_dir.path().join("data/a.txt"), "y")?;
        assert!(manager.commit("mod a"));
        let c2 = manager.head().clone();

        let blob = keepsake_core::Blob::hash_of(manager.store().hash_method(), b"x");
        fs::remove_file(manager.store().object_path(&blob))?;

        assert!(manager.revert(&c1.short_hash()).is_err());
        assert_eq!(manager.head(), &c2);
        assert_eq!(manager.labels().fetch_by_name(LATEST), None);
        assert_eq!(fs::read_to_string(temp_dir.path().join("data/a.txt"))?, "y");
        Ok(())
    }

    #[test]
    fn test_revert_over_replaced_file_changes_nothing() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let data = temp_dir.path().join("data");
        let mut manager = open(temp_dir.path());
        fs::write(data.join("a.txt"), "x")?;
        fs::write(data.join("b"), "file")?;
        assert!(manager.commit("file b"));
        let c1 = manager.head().clone();

        fs::write(data.join("a.txt"), "y")?;
        fs::remove_file(data.join("b"))?;
        fs::create_dir(data.join("b"))?;
        fs::write(data.join("b/inner.txt"), "z")?;
        assert!(manager.commit("directory b"));
        let c2 = manager.head().clone();

        let result = manager.revert(&c1.short_hash());
        assert!(matches!(result, Err(StoreError::RestoreConflict(_))));
        assert_eq!(fs::read_to_string(data.join("a.txt"))?, "y");
        assert!(data.join("b").is_dir());
        assert_eq!(manager.head(), &c2);
        assert_eq!(manager.labels().fetch_by_name(LATEST), None);
        Ok(())
    }

    #[test]
    fn test_revert_with_unwritable_head_puts_files_back() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let data = temp_dir.path().join("data");
        let mut manager = open(temp_dir.path());
        fs::write(data.join("a.txt"), "x")?;
        assert!(manager.commit("add a"));
        let c1 = manager.head().clone();
        fs::write(data.join("a.txt"), "y")?;
        assert!(manager.commit("mod a"));
        let c2 = manager.head().clone();

        let head_file = temp_dir.path().join("vc/HEAD");
        fs::remove_file(&head_file)?;
        fs::create_dir(&head_file)?;
        fs::write(head_file.join("occupied"), "")?;

        assert!(manager.revert(&c1.short_hash()).is_err());
        assert_eq!(fs::read_to_string(data.join("a.txt"))?, "y");
        assert_eq!(manager.head(), &c2);
        assert_eq!(manager.labels().fetch_by_name(LATEST), None);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_with_non_utf8_file_name() -> anyhow::Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::tempdir()?;
        let mut manager = open(temp_dir.path());
        let file = temp_dir.path().join("data").join(OsStr::from_bytes(b"caf\xe9.txt"));
        fs::write(&file, "v1")?;
        let c1 = manager.try_commit("latin-1 name")?;

        fs::write(&file, "v2")?;
        manager.try_commit("edit")?;
        manager.revert(&c1.short_hash())?;
        assert_eq!(fs::read_to_string(&file)?, "v1");
        Ok(())
    }
}
