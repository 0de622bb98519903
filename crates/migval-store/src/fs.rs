use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use migval_types::ValidationResult;
use tracing::debug;

use crate::error::StoreResult;
use crate::layout::{self, ResultLayout};
use crate::traits::ResultSink;

/// Sharded on-disk result store.
///
/// See the crate docs for the directory layout. Writers for different
/// objects only ever touch their own leaf directory, so no locking is
/// needed across worker threads.
#[derive(Clone, Debug)]
pub struct ResultStore {
    layout: ResultLayout,
    failure_only: bool,
}

impl ResultStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let layout = ResultLayout::new(root);
        fs::create_dir_all(layout.root())?;
        Ok(Self {
            layout,
            failure_only: false,
        })
    }

    /// Persist only `FAIL` results. `OK` results are dropped on write.
    pub fn with_failure_only(mut self, failure_only: bool) -> Self {
        self.failure_only = failure_only;
        self
    }

    pub fn failure_only(&self) -> bool {
        self.failure_only
    }

    pub fn layout(&self) -> &ResultLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Replace the persisted results of one object (or of the repository
    /// run when `source_object_id` is `None`).
    fn write_group(
        &self,
        source_object_id: Option<&str>,
        results: &[&ValidationResult],
    ) -> StoreResult<()> {
        let dir = self.layout.dir_for(source_object_id);
        fs::create_dir_all(&dir)?;
        clear_result_files(&dir)?;

        let mut written = 0usize;
        for result in results {
            if self.failure_only && result.is_ok() {
                continue;
            }
            let data = result.to_json()?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_data()?;
            tmp.persist(dir.join(layout::file_name(result.index)))?;
            written += 1;
        }

        debug!(
            pid = source_object_id.unwrap_or("<repository>"),
            received = results.len(),
            written,
            "results persisted"
        );
        Ok(())
    }
}

impl ResultSink for ResultStore {
    fn write(&self, results: &[ValidationResult]) -> StoreResult<()> {
        let mut groups: BTreeMap<Option<&str>, Vec<&ValidationResult>> = BTreeMap::new();
        for result in results {
            groups
                .entry(result.source_object_id.as_deref())
                .or_default()
                .push(result);
        }
        for (source_object_id, group) in groups {
            self.write_group(source_object_id, &group)?;
        }
        Ok(())
    }
}

/// Remove result files left in `dir` by an earlier run of the same object.
///
/// Only regular files with a result file name are touched; shard
/// subdirectories under the root are left alone.
fn clear_result_files(dir: &Path) -> StoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().and_then(layout::parse_file_name).is_some() {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
