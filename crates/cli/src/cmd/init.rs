//! Initialize a keepsake store

use crate::util::Paths;
use anyhow::{Context, Result};
use keepsake_core::{HashMethod, StoreConfig};
use keepsake_journal::VersionManager;
use owo_colors::OwoColorize;

pub fn run(paths: &Paths, hash: HashMethod) -> Result<()> {
    if StoreConfig::load(&paths.store)?.is_some() {
        println!("Error: keepsake store already initialized");
        println!("Location: {}", paths.store.display());
        std::process::exit(1);
    }

    let manager = VersionManager::open(&paths.store, &paths.tracked, StoreConfig::with_hash_method(hash))
        .context("Failed to initialize store")?;

    println!("Initialized keepsake store at {}", paths.store.display());
    println!("  Hash method: {}", hash);
    println!(
        "  {} {}",
        manager.head().short_hash().yellow(),
        manager.head().message
    );
    Ok(())
}
