use std::path::PathBuf;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested file does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An exclusive create found the target already present.
    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// JSON encoding or decoding failed.
    #[error("serialization error at {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The in-process lock table was poisoned by a panicking holder.
    #[error("lock table poisoned")]
    LockPoisoned,

    /// The configuration file could not be read or parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
