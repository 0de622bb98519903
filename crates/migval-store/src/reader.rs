use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use migval_types::{ObjectValidationResultSet, ValidationResult};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::layout::{self, ResultLayout};

/// Everything recovered from one walk of a result store.
#[derive(Clone, Debug, Default)]
pub struct StoreContents {
    /// Per-object result sets, sorted by source object id.
    pub objects: Vec<ObjectValidationResultSet>,
    /// Repository-level results, sorted by index.
    pub repository: Vec<ValidationResult>,
    /// Files that looked like results but could not be decoded.
    pub skipped: Vec<PathBuf>,
}

impl StoreContents {
    /// Objects with at least one `FAIL` result.
    pub fn failed_objects(&self) -> impl Iterator<Item = &ObjectValidationResultSet> {
        self.objects.iter().filter(|s| s.has_failure())
    }

    /// `true` when no object or repository result failed.
    pub fn all_passed(&self) -> bool {
        self.failed_objects().next().is_none() && self.repository.iter().all(|r| r.is_ok())
    }
}

/// Read side of the result store, used by report generation.
pub struct ResultStoreReader {
    layout: ResultLayout,
}

impl ResultStoreReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: ResultLayout::new(root),
        }
    }

    /// Walk the whole store and rebuild per-object result sets.
    ///
    /// Files are grouped by their containing leaf directory and sorted by the
    /// index encoded in the file name. Undecodable records are logged and
    /// reported in [`StoreContents::skipped`] rather than failing the walk.
    pub fn read_all(&self) -> StoreResult<StoreContents> {
        let root = self.layout.root();
        let mut contents = StoreContents::default();
        if !root.exists() {
            return Ok(contents);
        }

        let leaf_depth = self.layout.leaf_depth();
        let mut repository_files = Vec::new();
        let mut object_files: BTreeMap<PathBuf, Vec<(u64, PathBuf)>> = BTreeMap::new();

        for entry in WalkDir::new(root).min_depth(1).max_depth(leaf_depth + 1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(index) = entry.file_name().to_str().and_then(layout::parse_file_name)
            else {
                continue;
            };
            if entry.depth() == 1 {
                repository_files.push((index, entry.path().to_path_buf()));
            } else if entry.depth() == leaf_depth + 1 {
                if let Some(parent) = entry.path().parent() {
                    object_files
                        .entry(parent.to_path_buf())
                        .or_default()
                        .push((index, entry.path().to_path_buf()));
                }
            }
        }

        contents.repository = read_sorted(repository_files, &mut contents.skipped);

        for (dir, files) in object_files {
            let pid = match dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => match layout::decode_id(name) {
                    Ok(pid) => pid,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "skipping unrecognised directory");
                        contents.skipped.extend(files.into_iter().map(|(_, p)| p));
                        continue;
                    }
                },
                None => continue,
            };
            let results = read_sorted(files, &mut contents.skipped);
            if !results.is_empty() {
                contents.objects.push(ObjectValidationResultSet::new(pid, results));
            }
        }
        contents
            .objects
            .sort_by(|a, b| a.source_object_id().cmp(b.source_object_id()));
        Ok(contents)
    }

    /// Read the results of a single object, if any were persisted.
    pub fn read_object(&self, source_object_id: &str) -> StoreResult<Option<ObjectValidationResultSet>> {
        let dir = self.layout.object_dir(source_object_id);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(layout::parse_file_name) {
                files.push((index, entry.path()));
            }
        }
        let mut results = Vec::with_capacity(files.len());
        files.sort_by_key(|(index, _)| *index);
        for (_, path) in files {
            results.push(read_record(&path)?);
        }
        Ok(Some(ObjectValidationResultSet::new(source_object_id, results)))
    }
}

fn read_record(path: &Path) -> StoreResult<ValidationResult> {
    let data = fs::read(path)?;
    ValidationResult::from_json(&data).map_err(|e| StoreError::CorruptRecord {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_sorted(mut files: Vec<(u64, PathBuf)>, skipped: &mut Vec<PathBuf>) -> Vec<ValidationResult> {
    files.sort_by_key(|(index, _)| *index);
    let mut results = Vec::with_capacity(files.len());
    for (_, path) in files {
        match read_record(&path) {
            Ok(r) => results.push(r),
            Err(e) => {
                warn!(error = %e, "skipping unreadable result file");
                skipped.push(path);
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ResultStore;
    use crate::traits::ResultSink;
    use migval_types::{ResultStatus, ValidationType};

    fn object_result(pid: &str, index: u64, status: ResultStatus) -> ValidationResult {
        ValidationResult::object(index, status, ValidationType::Metadata, pid, pid, "")
    }

    #[test]
    fn read_back_groups_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        let many: Vec<_> = (0..12)
            .map(|i| object_result("demo:1", i, ResultStatus::Ok))
            .collect();
        store.write(&many).unwrap();
        store
            .write(&[
                object_result("demo:2", 0, ResultStatus::Ok),
                object_result("demo:2", 1, ResultStatus::Fail),
            ])
            .unwrap();
        store
            .write(&[ValidationResult::repository(
                0,
                ResultStatus::Ok,
                ValidationType::RepositoryResourceCount,
                "",
            )])
            .unwrap();

        let contents = ResultStoreReader::new(dir.path()).read_all().unwrap();
        assert_eq!(contents.objects.len(), 2);
        assert_eq!(contents.repository.len(), 1);

        let first = &contents.objects[0];
        assert_eq!(first.source_object_id(), "demo:1");
        // numeric, not lexical: 10 and 11 come after 9
        let indices: Vec<u64> = first.results().iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());

        assert!(contents.objects[1].has_failure());
        assert!(!contents.all_passed());
        assert_eq!(contents.failed_objects().count(), 1);
    }

    #[test]
    fn corrupt_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store
            .write(&[
                object_result("demo:1", 0, ResultStatus::Ok),
                object_result("demo:1", 1, ResultStatus::Ok),
            ])
            .unwrap();
        let bad = store.layout().object_dir("demo:1").join("1.json");
        fs::write(&bad, b"{not json").unwrap();

        let contents = ResultStoreReader::new(dir.path()).read_all().unwrap();
        assert_eq!(contents.objects[0].len(), 1);
        assert_eq!(contents.skipped, vec![bad]);
    }

    #[test]
    fn missing_root_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let contents = ResultStoreReader::new(dir.path().join("absent"))
            .read_all()
            .unwrap();
        assert!(contents.objects.is_empty());
        assert!(contents.all_passed());
    }

    #[test]
    fn read_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path()).unwrap();
        store
            .write(&[object_result("demo:7", 0, ResultStatus::Fail)])
            .unwrap();
        let reader = ResultStoreReader::new(dir.path());
        let set = reader.read_object("demo:7").unwrap().unwrap();
        assert!(set.has_failure());
        assert!(reader.read_object("demo:8").unwrap().is_none());
    }
}
