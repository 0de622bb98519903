use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use migval_engine::ValidationConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::resume::ResumeOptions;

/// Upper bound on `workers`.
pub const MAX_WORKERS: usize = 1024;

/// Settings for one validation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of objects validated (and source handles open) at once.
    pub workers: usize,
    /// Maximum number of objects admitted in this run.
    pub limit: Option<u64>,
    /// Continue after the checkpoint left by an earlier run.
    pub resume: bool,
    /// Validate objects below the checkpoint again.
    pub accept_all: bool,
    pub resume_file: PathBuf,
    pub results_dir: PathBuf,
    /// Persist only FAIL results; OK results are dropped on write.
    pub failure_only: bool,
    /// Compare total object counts once the source is exhausted.
    pub repository_count_check: bool,
    /// Restrict the run to these source pids. Disables the repository check.
    pub pids: Vec<String>,
    pub shutdown_grace_secs: u64,
    /// Directory of JSON export files.
    pub source_dir: Option<PathBuf>,
    /// Root of the local target store.
    pub target_root: Option<PathBuf>,
    pub validation: ValidationConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            limit: None,
            resume: false,
            accept_all: false,
            resume_file: PathBuf::from("migval.resume"),
            results_dir: PathBuf::from("results"),
            failure_only: false,
            repository_count_check: true,
            pids: Vec::new(),
            shutdown_grace_secs: 30,
            source_dir: None,
            target_root: None,
            validation: ValidationConfig::default(),
        }
    }
}

impl RunConfig {
    /// Read a TOML file. Relative paths in it are taken relative to the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        debug!(path = %path.display(), workers = config.workers, "configuration loaded");
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.resume_file);
        join(&mut self.results_dir);
        if let Some(p) = self.source_dir.as_mut() {
            join(p);
        }
        if let Some(p) = self.target_root.as_mut() {
            join(p);
        }
    }

    /// Reject settings no run can start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Invalid("limit must be at least 1".into()));
        }
        if self.accept_all && !self.resume {
            return Err(ConfigError::Invalid("accept_all requires resume".into()));
        }
        if self.pids.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("pids must not be blank".into()));
        }
        Ok(())
    }

    /// The source directory and target root, both required for a local run.
    pub fn local_paths(&self) -> Result<(&Path, &Path), ConfigError> {
        let source = self
            .source_dir
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("source_dir is not set".into()))?;
        if !source.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "source_dir {} is not a directory",
                source.display()
            )));
        }
        let target = self
            .target_root
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("target_root is not set".into()))?;
        Ok((source, target))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// The repository check only makes sense over the whole source.
    pub fn checks_repository(&self) -> bool {
        self.repository_count_check && self.pids.is_empty()
    }

    pub fn resume_options(&self) -> ResumeOptions {
        ResumeOptions {
            file: self.resume_file.clone(),
            resume: self.resume,
            accept_all: self.accept_all,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migval_engine::Strategy;

    #[test]
    fn default_config() {
        let c = RunConfig::default();
        assert_eq!(c.workers, 4);
        assert_eq!(c.shutdown_grace(), Duration::from_secs(30));
        assert!(c.repository_count_check);
        assert!(c.checks_repository());
        assert!(c.limit.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("export")).unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            r#"
workers = 8
limit = 100
resume = true
source_dir = "export"
target_root = "/srv/target"

[validation]
strategy = "head-only"
"#,
        )
        .unwrap();

        let c = RunConfig::load(&path).unwrap();
        assert_eq!(c.workers, 8);
        assert_eq!(c.limit, Some(100));
        assert_eq!(c.validation.strategy, Strategy::HeadOnly);
        assert_eq!(c.results_dir, dir.path().join("results"));
        assert_eq!(c.resume_file, dir.path().join("migval.resume"));
        let (source, target) = c.local_paths().unwrap();
        assert_eq!(source, dir.path().join("export"));
        assert_eq!(target, Path::new("/srv/target"));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad = [
            RunConfig { workers: 0, ..Default::default() },
            RunConfig { workers: MAX_WORKERS + 1, ..Default::default() },
            RunConfig { limit: Some(0), ..Default::default() },
            RunConfig { accept_all: true, ..Default::default() },
            RunConfig { pids: vec![" ".into()], ..Default::default() },
        ];
        for c in bad {
            assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))), "{c:?}");
        }
    }

    #[test]
    fn unreadable_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = RunConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let path = dir.path().join("bad.toml");
        fs::write(&path, "workers = \"many\"").unwrap();
        assert!(matches!(RunConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn pid_subset_disables_repository_check() {
        let c = RunConfig { pids: vec!["demo:1".into()], ..Default::default() };
        assert!(!c.checks_repository());
    }

    #[test]
    fn local_paths_require_source_dir() {
        let c = RunConfig::default();
        assert!(matches!(c.local_paths(), Err(ConfigError::Invalid(_))));
    }
}
