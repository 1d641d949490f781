//! Restore the tracked directory to an earlier commit

use crate::util::{self, Paths};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub fn run(paths: &Paths, prefix: &str) -> Result<()> {
    let mut manager = util::open_manager(paths)?;
    let previous = manager.head().clone();

    let target = manager
        .revert(prefix)
        .context("Failed to revert")?
        .ok_or_else(|| anyhow::anyhow!("Unknown or ambiguous commit reference: '{}'", prefix))?;

    println!(
        "Reverted to {} {}",
        target.short_hash().yellow(),
        target.message
    );
    println!(
        "  {} {} (LATEST)",
        "previous HEAD:".dimmed(),
        previous.short_hash().cyan()
    );
    Ok(())
}
