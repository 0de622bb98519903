/// Errors from digest operations.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// The algorithm name is not one this crate implements.
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A digest urn did not have the `urn:<algorithm>:<hex>` shape.
    #[error("malformed digest urn: {0}")]
    MalformedUrn(String),

    /// Reading the content being digested failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;
