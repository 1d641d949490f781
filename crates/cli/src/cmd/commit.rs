//! Record the tracked directory

use crate::util::{self, Paths};
use anyhow::{Context, Result};
use keepsake_core::TreeDiff;
use owo_colors::OwoColorize;

pub fn run(paths: &Paths, message: &str) -> Result<()> {
    let mut manager = util::open_manager(paths)?;
    let parent_tree = manager.store().read_tree(&manager.head().tree)?;

    let commit = manager.try_commit(message).context("Failed to commit")?;
    let tree = manager.store().read_tree(&commit.tree)?;
    let diff = TreeDiff::diff(&parent_tree, &tree);

    println!("[{}] {}", commit.short_hash().yellow(), commit.message);
    if diff.is_empty() {
        println!("  {}", "(no changes)".dimmed());
    } else {
        println!(
            "  {} added, {} modified, {} removed",
            diff.added.len(),
            diff.modified.len(),
            diff.removed.len()
        );
    }
    Ok(())
}
