//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use keepsake_core::StoreConfig;
use keepsake_journal::{Commit, VersionManager};
use std::path::PathBuf;
use tracing::debug;

/// Store and tracked directory taken from the global flags
pub struct Paths {
    pub store: PathBuf,
    pub tracked: PathBuf,
}

/// Open an existing store; `ks init` is the only command that creates one
pub fn open_manager(paths: &Paths) -> Result<VersionManager> {
    debug!(store = %paths.store.display(), tracked = %paths.tracked.display(), "opening store");
    let config = StoreConfig::load(&paths.store)
        .with_context(|| format!("Failed to read store config in {}", paths.store.display()))?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Not a keepsake store: {} (run 'ks init' first)",
                paths.store.display()
            )
        })?;

    VersionManager::open(&paths.store, &paths.tracked, config).context("Failed to open store")
}

/// Resolve a commit reference
/// Supports:
/// - Label name: "HEAD", "LATEST", "before-refactor"
/// - Full hash: 40 hex characters
/// - Hash prefix: at least 4 hex characters (must be unique)
pub fn resolve_commit_ref(manager: &VersionManager, reference: &str) -> Result<Commit> {
    if let Some(label) = manager.labels().fetch_by_name(reference) {
        debug!(reference, commit = %label.commit, "resolved label");
        return manager
            .commits()
            .load(&label.commit)
            .with_context(|| format!("Label '{}' points at an unreadable commit", reference));
    }

    manager
        .commits()
        .fetch_by_hash(reference)
        .ok_or_else(|| anyhow::anyhow!("Unknown or ambiguous commit reference: '{}'", reference))
}
