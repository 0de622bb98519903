use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown result status: {0}")]
    UnknownStatus(String),

    #[error("unknown validation level: {0}")]
    UnknownLevel(String),

    #[error("unknown validation type: {0}")]
    UnknownType(String),

    #[error("result {index} is missing {field}")]
    MissingField { index: u64, field: &'static str },

    #[error("serialization error: {0}")]
    Serialization(String),
}
