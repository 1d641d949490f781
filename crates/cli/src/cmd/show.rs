//! Show commit details

use crate::util::{self, Paths};
use anyhow::Result;
use chrono::Local;
use keepsake_core::{Tree, TreeDiff};
use keepsake_journal::history::format_timestamp;
use owo_colors::OwoColorize;
use std::sync::Arc;

pub fn run(paths: &Paths, reference: &str) -> Result<()> {
    let manager = util::open_manager(paths)?;
    let commit = util::resolve_commit_ref(&manager, reference)?;

    println!("{} {}", "commit".yellow().bold(), commit.hash.to_hex().cyan());
    match commit.parent {
        Some(parent) => println!("{} {}", "Parent:    ".dimmed(), parent.to_hex().cyan()),
        None => println!("{} {}", "Parent:    ".dimmed(), "(none - initial commit)".dimmed()),
    }
    println!("{} {}", "Tree:      ".dimmed(), commit.tree.to_hex().bright_green());
    println!("{} {}", "Author:    ".dimmed(), commit.author);
    println!(
        "{} {}",
        "Date:      ".dimmed(),
        format_timestamp(&commit.timestamp.with_timezone(&Local))
    );
    println!("\n    {}\n", commit.message);

    let tree = manager.store().read_tree(&commit.tree)?;
    let parent_tree = match commit.parent {
        Some(parent) => {
            let parent = manager.commits().load(&parent)?;
            manager.store().read_tree(&parent.tree)?
        }
        None => Arc::new(Tree::new()),
    };

    let diff = TreeDiff::diff(&parent_tree, &tree);
    if diff.is_empty() {
        println!("{}", "(no changes)".dimmed());
        return Ok(());
    }

    println!(
        "{} ({} files)",
        "Changed files:".bold(),
        diff.added.len() + diff.modified.len() + diff.removed.len()
    );
    for path in &diff.added {
        println!("  {} {}", "A".green(), path);
    }
    for path in &diff.modified {
        println!("  {} {}", "M".yellow(), path);
    }
    for path in &diff.removed {
        println!("  {} {}", "D".red(), path);
    }
    Ok(())
}
