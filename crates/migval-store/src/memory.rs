use std::collections::BTreeMap;
use std::sync::RwLock;

use migval_types::ValidationResult;

use crate::error::StoreResult;
use crate::traits::ResultSink;

/// In-memory result sink.
///
/// Intended for tests and embedding. Results are grouped by source object id
/// (`None` for repository-level results) behind a `RwLock`; a write replaces
/// the group it touches, matching [`ResultStore`](crate::ResultStore).
#[derive(Default)]
pub struct InMemoryResultSink {
    groups: RwLock<BTreeMap<Option<String>, Vec<ValidationResult>>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results recorded for one object, in index order.
    pub fn results_for(&self, source_object_id: &str) -> Vec<ValidationResult> {
        let groups = self.groups.read().expect("lock poisoned");
        groups
            .get(&Some(source_object_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Repository-level results.
    pub fn repository_results(&self) -> Vec<ValidationResult> {
        let groups = self.groups.read().expect("lock poisoned");
        groups.get(&None).cloned().unwrap_or_default()
    }

    /// Every recorded result.
    pub fn all(&self) -> Vec<ValidationResult> {
        let groups = self.groups.read().expect("lock poisoned");
        groups.values().flatten().cloned().collect()
    }

    /// Source object ids with at least one recorded result, sorted.
    pub fn object_ids(&self) -> Vec<String> {
        let groups = self.groups.read().expect("lock poisoned");
        groups.keys().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.groups
            .read()
            .expect("lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for InMemoryResultSink {
    fn write(&self, results: &[ValidationResult]) -> StoreResult<()> {
        let mut incoming: BTreeMap<Option<String>, Vec<ValidationResult>> = BTreeMap::new();
        for r in results {
            incoming
                .entry(r.source_object_id.clone())
                .or_default()
                .push(r.clone());
        }
        let mut groups = self.groups.write().expect("lock poisoned");
        for (key, mut group) in incoming {
            group.sort_by_key(|r| r.index);
            groups.insert(key, group);
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryResultSink")
            .field("result_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migval_types::{ResultStatus, ValidationType};

    fn result(pid: &str, index: u64) -> ValidationResult {
        ValidationResult::object(index, ResultStatus::Ok, ValidationType::Metadata, pid, pid, "")
    }

    #[test]
    fn groups_by_object() {
        let sink = InMemoryResultSink::new();
        sink.write(&[result("a", 1), result("a", 0), result("b", 0)]).unwrap();
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.object_ids(), vec!["a".to_string(), "b".to_string()]);
        let a: Vec<u64> = sink.results_for("a").iter().map(|r| r.index).collect();
        assert_eq!(a, vec![0, 1]);
    }

    #[test]
    fn write_replaces_group() {
        let sink = InMemoryResultSink::new();
        sink.write(&[result("a", 0), result("a", 1)]).unwrap();
        sink.write(&[result("a", 0)]).unwrap();
        assert_eq!(sink.results_for("a").len(), 1);
    }

    #[test]
    fn repository_group_is_separate() {
        let sink = InMemoryResultSink::new();
        sink.write(&[ValidationResult::repository(
            0,
            ResultStatus::Ok,
            ValidationType::RepositoryResourceCount,
            "",
        )])
        .unwrap();
        assert_eq!(sink.repository_results().len(), 1);
        assert!(sink.object_ids().is_empty());
    }

    #[test]
    fn debug_format() {
        let sink = InMemoryResultSink::new();
        assert!(format!("{sink:?}").contains("result_count"));
    }
}
