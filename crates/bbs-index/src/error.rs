//! Error types for the index crate.

use std::path::PathBuf;

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The index document exists but does not have the expected shape.
    #[error("index document {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] bbs_store::StoreError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
