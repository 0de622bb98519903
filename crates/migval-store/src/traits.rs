use migval_types::ValidationResult;

use crate::error::StoreResult;

/// Destination for validation results.
///
/// All implementations must satisfy these invariants:
/// - A call carries complete result lists: every result of one object run
///   arrives in a single call and replaces any earlier results persisted for
///   that object.
/// - Calls for different objects may arrive concurrently from worker threads.
/// - Results are never mutated after they are accepted.
pub trait ResultSink: Send + Sync {
    /// Persist a batch of results.
    fn write(&self, results: &[ValidationResult]) -> StoreResult<()>;
}
