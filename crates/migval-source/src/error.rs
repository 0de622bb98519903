use std::path::PathBuf;

/// Errors raised while listing, opening, or streaming source objects.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The export for an object could not be parsed.
    #[error("malformed export {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// The export's own pid disagrees with the pid it was listed under.
    #[error("export lists pid {listed} but contains {found}")]
    PidMismatch { listed: String, found: String },

    /// The handle was used after being closed.
    #[error("object {0} is already closed")]
    Closed(String),

    /// Opening the object failed for a source-specific reason.
    #[error("cannot open object {pid}: {reason}")]
    Unreadable { pid: String, reason: String },

    /// I/O error from the underlying export.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
