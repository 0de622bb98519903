use migval_target::TargetError;

/// Errors that escape a validation task.
///
/// Comparison mismatches and rule-local failures never surface here; they
/// become `FAIL` results, as does a source object that cannot be read.
/// What remains is infrastructure the task cannot work around.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("target error: {0}")]
    Target(#[from] TargetError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
