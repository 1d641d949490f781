//! Error taxonomy for the object store

use std::path::PathBuf;

/// Errors surfaced by the storage layers
///
/// Lookups that merely miss (unknown hash, unknown label, corrupt object file)
/// are reported as `None` by the callers that own them, not through this type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt object {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("object {0} is missing from the store")]
    MissingObject(String),

    #[error("cycle detected in ancestor chain at commit {0}")]
    CycleDetected(String),

    #[error("store uses hash method {stored}, refusing to open it with {requested}")]
    HashMethodMismatch { stored: String, requested: String },

    #[error("invalid label name: {0:?}")]
    InvalidLabel(String),

    #[error("path escapes the target directory: {0}")]
    PathEscape(String),

    #[error("file name cannot be represented on this platform: {0}")]
    UnsupportedPath(String),

    #[error("cannot restore over {}: not a regular file or directory as expected", .0.display())]
    RestoreConflict(PathBuf),

    #[error("failed to encode {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Extension for attaching a path to raw `std::io::Result`s
pub trait IoResultExt<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T, StoreError>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T, StoreError> {
        self.map_err(|e| StoreError::io(path, e))
    }
}
