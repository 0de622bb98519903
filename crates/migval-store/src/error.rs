use std::path::PathBuf;

use migval_types::TypeError;

/// Errors from result store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A persisted record could not be decoded.
    #[error("corrupt result file {path}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    /// A record failed to serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] TypeError),

    /// A directory name under the store root is not a valid encoded id.
    #[error("invalid object directory name: {0}")]
    InvalidDirectory(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A temp file could not be moved into place.
    #[error("persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
