use std::path::PathBuf;

use migval_crypto::DigestError;

/// Errors from reading or writing a target store.
///
/// Absence of a resource is not an error; see [`crate::Lookup`].
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// An object manifest exists but cannot be decoded.
    #[error("corrupt manifest {path}: {reason}")]
    CorruptManifest { path: PathBuf, reason: String },

    /// A write referenced an object that does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A resource id that does not belong to the session's object.
    #[error("resource {resource} is not under object {object}")]
    ForeignResource { object: String, resource: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("digest error: {0}")]
    Digest(#[from] DigestError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result alias for target operations.
pub type TargetResult<T> = Result<T, TargetError>;
