use std::path::PathBuf;

use migval_source::SourceError;
use migval_store::StoreError;
use migval_target::TargetError;

/// Errors from the resume checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// The object at the checkpoint ordinal is not the one recorded there:
    /// the source sequence changed between runs.
    #[error("object sequence changed: ordinal {ordinal} was {expected}, now {found}")]
    SequenceMismatch {
        ordinal: u64,
        expected: String,
        found: String,
    },

    #[error("corrupt checkpoint {path}: {reason}")]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors detected before any object is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resume error: {0}")]
    Resume(#[from] ResumeError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("target error: {0}")]
    Target(#[from] TargetError),

    #[error("result store error: {0}")]
    Store(#[from] StoreError),

    /// The worker pool could not be built.
    #[error("runtime error: {0}")]
    Runtime(std::io::Error),
}

pub type ResumeResult<T> = Result<T, ResumeError>;
pub type RunResult<T> = Result<T, RunError>;
