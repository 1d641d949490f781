//! Keepsake Core - content-addressed storage primitives
//!
//! This crate provides the foundational storage layer:
//! - SHA-1 / BLAKE3 content hashing
//! - Blob encoding
//! - Tree snapshots, diffing and regeneration
//! - On-disk object store management

pub mod error;
pub mod hash;
pub mod config;
pub mod blob;
pub mod tree;
pub mod store;

// Re-export main types for convenience
pub use error::StoreError;
pub use hash::{ContentHash, HashMethod, IncrementalHasher};
pub use config::StoreConfig;
pub use blob::Blob;
pub use tree::{Snapshot, Tree, TreeDiff};
pub use store::{ObjectStore, Regeneration};

/// Common result type used throughout keepsake-core
pub type Result<T> = std::result::Result<T, StoreError>;
