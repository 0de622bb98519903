use std::collections::BTreeMap;

use crate::result::{ResultStatus, ValidationResult, ValidationType};

/// All persisted results for one source object, ordered by index.
///
/// Built by the report side from a result store walk. The validation path
/// never constructs one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectValidationResultSet {
    source_object_id: String,
    results: Vec<ValidationResult>,
}

impl ObjectValidationResultSet {
    /// Create a set; results are sorted by index.
    pub fn new(source_object_id: impl Into<String>, mut results: Vec<ValidationResult>) -> Self {
        results.sort_by_key(|r| r.index);
        Self {
            source_object_id: source_object_id.into(),
            results,
        }
    }

    pub fn source_object_id(&self) -> &str {
        &self.source_object_id
    }

    /// The target object id, taken from the first result that carries one.
    pub fn target_object_id(&self) -> Option<&str> {
        self.results
            .iter()
            .find_map(|r| r.target_object_id.as_deref())
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn passed(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.status == ResultStatus::Ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.status == ResultStatus::Fail)
    }

    pub fn pass_count(&self) -> usize {
        self.passed().count()
    }

    pub fn fail_count(&self) -> usize {
        self.failed().count()
    }

    pub fn has_failure(&self) -> bool {
        self.results.iter().any(ValidationResult::is_fail)
    }

    /// Count of (type, status) pairs in this set.
    pub fn outcome_counts(&self) -> BTreeMap<(ValidationType, ResultStatus), usize> {
        let mut counts = BTreeMap::new();
        for r in &self.results {
            *counts.entry((r.validation_type, r.status)).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(index: u64, status: ResultStatus, t: ValidationType) -> ValidationResult {
        ValidationResult::object(index, status, t, "demo:1", "info:fedora/demo:1", "")
    }

    #[test]
    fn sorts_by_index_and_partitions() {
        let set = ObjectValidationResultSet::new(
            "demo:1",
            vec![
                obj(2, ResultStatus::Fail, ValidationType::Metadata),
                obj(0, ResultStatus::Ok, ValidationType::SourceObjectExistsInTarget),
                obj(1, ResultStatus::Ok, ValidationType::Metadata),
            ],
        );
        let indices: Vec<u64> = set.results().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(set.pass_count(), 2);
        assert_eq!(set.fail_count(), 1);
        assert!(set.has_failure());
        assert_eq!(set.target_object_id(), Some("info:fedora/demo:1"));
    }

    #[test]
    fn all_pass_has_no_failure() {
        let set = ObjectValidationResultSet::new(
            "demo:1",
            vec![obj(0, ResultStatus::Ok, ValidationType::Metadata)],
        );
        assert!(!set.has_failure());
        assert_eq!(set.failed().count(), 0);
    }

    #[test]
    fn outcome_counts_group_by_type_and_status() {
        let set = ObjectValidationResultSet::new(
            "demo:1",
            vec![
                obj(0, ResultStatus::Ok, ValidationType::Metadata),
                obj(1, ResultStatus::Ok, ValidationType::Metadata),
                obj(2, ResultStatus::Fail, ValidationType::Metadata),
            ],
        );
        let counts = set.outcome_counts();
        assert_eq!(counts[&(ValidationType::Metadata, ResultStatus::Ok)], 2);
        assert_eq!(counts[&(ValidationType::Metadata, ResultStatus::Fail)], 1);
    }

    #[test]
    fn empty_set() {
        let set = ObjectValidationResultSet::new("demo:1", Vec::new());
        assert!(set.is_empty());
        assert!(set.target_object_id().is_none());
    }
}
