//! Commit graph, labels and history on top of keepsake-core
//!
//! This crate provides:
//! - Commit records and ancestor walks
//! - HEAD / LATEST label files
//! - Two-lane history reconstruction
//! - The version manager (commit, history, revert)

pub mod commit;
pub mod label;
pub mod history;
pub mod manager;

// Re-exports
pub use commit::{Commit, CommitLog, CommitSource};
pub use history::{History, Lane};
pub use label::{Label, LabelStore, HEAD, LATEST};
pub use manager::VersionManager;
