use migval_types::{ResultStatus, ValidationResult, ValidationType};

use crate::rules::Check;

/// Hands out result indices for one validation run, starting at 0.
///
/// Owned by a single traversal, so indices within a run are contiguous and
/// strictly increasing.
#[derive(Debug, Default)]
pub struct IndexCounter {
    next: u64,
}

impl IndexCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&mut self) -> u64 {
        let index = self.next;
        self.next += 1;
        index
    }
}

/// Source and target identity of one object, attached to every result.
#[derive(Clone, Debug)]
pub struct ObjectIds {
    pub source: String,
    pub target: String,
}

impl ObjectIds {
    pub fn object_result(&self, counter: &mut IndexCounter, check: Check) -> ValidationResult {
        ValidationResult::object(
            counter.next_index(),
            check.status,
            check.validation_type,
            &self.source,
            &self.target,
            check.details,
        )
    }

    pub fn resource_result(
        &self,
        counter: &mut IndexCounter,
        source_resource: &str,
        target_resource: &str,
        check: Check,
    ) -> ValidationResult {
        ValidationResult::resource(
            counter.next_index(),
            check.status,
            check.validation_type,
            &self.source,
            &self.target,
            source_resource,
            target_resource,
            check.details,
        )
    }

    /// The synthetic result for an object that could not be read.
    pub fn unreadable(&self, counter: &mut IndexCounter, reason: &str) -> ValidationResult {
        self.object_result(
            counter,
            Check::new(
                ResultStatus::Fail,
                ValidationType::ObjectReadable,
                format!("source object could not be read: {reason}"),
            ),
        )
    }
}
