//! Keepsake CLI - ks command

use anyhow::Result;
use clap::{Parser, Subcommand};
use keepsake_core::HashMethod;
use keepsake_journal::manager::DEFAULT_STORE_DIR;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// Keepsake - snapshot, history and revert for a directory
#[derive(Parser)]
#[command(name = "ks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store directory
    #[arg(long, global = true, default_value = DEFAULT_STORE_DIR)]
    store: PathBuf,

    /// Directory under version control
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and record the initial commit
    Init {
        /// Hash function for object keys (fixed once the store exists)
        #[arg(long, default_value = "sha1")]
        hash: HashMethod,
    },
    /// Record the tracked directory as a new commit
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: String,
    },
    /// Show commit history
    Log,
    /// Restore the tracked directory to a commit
    Revert {
        /// Commit hash or unique prefix
        commit: String,
    },
    /// Show commit details and changed files
    Show {
        /// Commit hash, unique prefix or label name (default: HEAD)
        #[arg(default_value = "HEAD")]
        reference: String,
    },
    /// Read or set a label
    Label {
        /// Label name
        name: String,
        /// Commit hash, unique prefix or label to point it at
        target: Option<String>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("KEEPSAKE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = util::Paths {
        store: cli.store,
        tracked: cli.dir,
    };

    match cli.command {
        Commands::Init { hash } => cmd::init::run(&paths, hash),
        Commands::Commit { message } => cmd::commit::run(&paths, &message),
        Commands::Log => cmd::log::run(&paths),
        Commands::Revert { commit } => cmd::revert::run(&paths, &commit),
        Commands::Show { reference } => cmd::show::run(&paths, &reference),
        Commands::Label { name, target } => cmd::label::run(&paths, &name, target.as_deref()),
    }
}
