//! Read or set a label

use crate::util::{self, Paths};
use anyhow::{Context, Result};
use keepsake_journal::{Label, HEAD};
use owo_colors::OwoColorize;

pub fn run(paths: &Paths, name: &str, target: Option<&str>) -> Result<()> {
    let manager = util::open_manager(paths)?;
    let labels = manager.labels();

    let Some(target) = target else {
        let label = labels
            .fetch_by_name(name)
            .ok_or_else(|| anyhow::anyhow!("Label not found: {}", name))?;
        println!("{} {}", label.name.bold(), label.commit.to_hex().cyan());
        return Ok(());
    };

    if name == HEAD {
        anyhow::bail!("HEAD only moves through 'ks commit' and 'ks revert'");
    }

    let commit = util::resolve_commit_ref(&manager, target)?;
    labels
        .write(&Label::new(name, commit.hash))
        .with_context(|| format!("Failed to write label '{}'", name))?;

    println!("{} -> {} {}", name.bold(), commit.short_hash().yellow(), commit.message);
    Ok(())
}
