use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use migval_engine::{repository_resource_count, ComparisonEngine, ObjectValidator};
use migval_source::{JsonExportSource, ObjectHandle, ObjectSource, PidFilter};
use migval_store::{ResultSink, ResultStore};
use migval_target::{LocalTargetStore, TargetRepository};
use migval_types::ValidationResult;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::{RunError, RunResult};
use crate::resume::{Admission, ResumeManager};

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// What a run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// `false` when any task failed and admission was stopped early.
    pub success: bool,
    /// Objects whose validation task ran to completion.
    pub processed: u64,
    /// Processed objects with at least one failed result.
    pub failed_objects: u64,
    /// Objects released unvalidated because an earlier run covered them.
    pub skipped: u64,
    /// Objects pulled from the source, whether validated or not.
    pub observed: u64,
    pub halted_by_limit: bool,
    pub repository_checked: bool,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.success
    }
}

// ---------------------------------------------------------------------------
// Shared task state
// ---------------------------------------------------------------------------

struct Tasks {
    validator: ObjectValidator,
    repository: Arc<dyn TargetRepository>,
    sink: Arc<dyn ResultSink>,
    resume: ResumeManager,
    abort: AtomicBool,
    processed: AtomicU64,
    failed_objects: AtomicU64,
}

impl Tasks {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Validate one admitted object, persist its results, and report its
    /// completion. Any failure along the way, panics included, stops further
    /// admission. The permit is returned only after completion is recorded.
    fn validate_object(
        &self,
        ordinal: u64,
        pid: &str,
        handle: Box<dyn ObjectHandle>,
        permit: OwnedSemaphorePermit,
    ) {
        let mut completion = Completion {
            tasks: self,
            ordinal,
            pid,
            succeeded: false,
            _permit: permit,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| self.validate_and_write(ordinal, pid, handle))) {
            Ok(succeeded) => completion.succeeded = succeeded,
            Err(_) => error!(ordinal, pid, "object task panicked"),
        }
    }

    fn validate_and_write(&self, ordinal: u64, pid: &str, handle: Box<dyn ObjectHandle>) -> bool {
        let results = match self.validator.validate(handle) {
            Ok(results) => results,
            Err(e) => {
                error!(ordinal, pid, error = %e, "object validation failed");
                return false;
            }
        };
        if results.iter().any(ValidationResult::is_fail) {
            self.failed_objects.fetch_add(1, Ordering::SeqCst);
        }
        match self.sink.write(&results) {
            Ok(()) => true,
            Err(e) => {
                error!(ordinal, pid, error = %e, "cannot persist results");
                false
            }
        }
    }

    fn check_repository(&self, observed: u64) {
        let written = panic::catch_unwind(AssertUnwindSafe(|| {
            let result = repository_resource_count(observed, self.repository.as_ref());
            self.sink.write(&[result])
        }));
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "cannot persist repository result");
                self.request_abort();
            }
            Err(_) => {
                error!("repository task panicked");
                self.request_abort();
            }
        }
    }
}

/// Records the end of one object task when dropped, on every exit path.
struct Completion<'a> {
    tasks: &'a Tasks,
    ordinal: u64,
    pid: &'a str,
    succeeded: bool,
    // released after `drop` has recorded completion
    _permit: OwnedSemaphorePermit,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let tasks = self.tasks;
        if !self.succeeded {
            tasks.request_abort();
        }
        tasks.processed.fetch_add(1, Ordering::SeqCst);
        let completed = panic::catch_unwind(AssertUnwindSafe(|| {
            tasks.resume.complete(self.ordinal, self.pid)
        }));
        match completed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(ordinal = self.ordinal, pid = self.pid, error = %e, "cannot write checkpoint");
                tasks.request_abort();
            }
            Err(_) => {
                error!(ordinal = self.ordinal, pid = self.pid, "checkpoint update panicked");
                tasks.request_abort();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionManager
// ---------------------------------------------------------------------------

/// Drives a run: pulls objects, admits them through the [`ResumeManager`],
/// and validates at most `workers` of them at a time.
///
/// A permit is taken before each admitted object is handed to a worker and
/// returned after its completion is recorded, so no more than `workers`
/// source handles are ever open. The first failing task raises the abort
/// flag; the admitting loop stops at its next iteration while tasks already
/// started run to completion.
///
/// `run` blocks the calling thread and must not be called from inside an
/// async runtime.
pub struct ExecutionManager {
    config: RunConfig,
    validator: ObjectValidator,
    repository: Arc<dyn TargetRepository>,
    sink: Arc<dyn ResultSink>,
}

impl ExecutionManager {
    pub fn new(
        config: RunConfig,
        validator: ObjectValidator,
        repository: Arc<dyn TargetRepository>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            config,
            validator,
            repository,
            sink,
        }
    }

    /// Wire a JSON export directory, a local target store and an on-disk
    /// result store from `config`, then run.
    pub fn run_local(config: RunConfig) -> RunResult<RunOutcome> {
        config.validate()?;
        let (source_dir, target_root) = config.local_paths()?;
        let source = JsonExportSource::open(source_dir)?;
        let target = LocalTargetStore::open(target_root)?;
        let sink = ResultStore::open(config.results_dir.clone())?
            .with_failure_only(config.failure_only);
        let engine = ComparisonEngine::new(config.validation.clone());
        let validator = ObjectValidator::new(engine, Arc::new(target.clone()));
        Self::new(config, validator, Arc::new(target), Arc::new(sink)).run(source)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validate every admitted object of `source`.
    ///
    /// Task failures end in an unsuccessful [`RunOutcome`]. A changed
    /// object sequence on resume is returned as an error once the tasks
    /// already started have finished.
    pub fn run<S: ObjectSource + 'static>(&self, source: S) -> RunResult<RunOutcome> {
        self.config.validate()?;
        let workers = self.config.workers;
        let tasks = Arc::new(Tasks {
            validator: self.validator.clone(),
            repository: Arc::clone(&self.repository),
            sink: Arc::clone(&self.sink),
            resume: ResumeManager::open(self.config.resume_options())?,
            abort: AtomicBool::new(false),
            processed: AtomicU64::new(0),
            failed_objects: AtomicU64::new(0),
        });
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("migval-worker")
            .enable_all()
            .build()
            .map_err(RunError::Runtime)?;
        let permits = Arc::new(Semaphore::new(workers));

        let mut source: Box<dyn ObjectSource> = if self.config.pids.is_empty() {
            Box::new(source)
        } else {
            Box::new(PidFilter::new(source, self.config.pids.iter().cloned()))
        };

        info!(
            workers,
            limit = ?self.config.limit,
            resume = self.config.resume,
            strategy = %self.validator.engine().strategy(),
            "run started"
        );

        let mut outcome = RunOutcome::default();
        let mut fatal = None;
        loop {
            if tasks.aborted() {
                warn!(observed = outcome.observed, "abort requested, admission stopped");
                break;
            }
            let mut handle = match source.next_object() {
                None => break,
                Some(Ok(handle)) => handle,
                Some(Err(e)) => {
                    error!(error = %e, "cannot read next source object");
                    tasks.request_abort();
                    break;
                }
            };
            outcome.observed += 1;
            let pid = handle.pid().to_string();

            let ticket = match tasks.resume.accept(&pid) {
                Ok(ticket) => ticket,
                Err(e) => {
                    handle.close();
                    tasks.request_abort();
                    fatal = Some(e);
                    break;
                }
            };
            match ticket.admission {
                Admission::Admit => {}
                Admission::Skip => {
                    debug!(ordinal = ticket.ordinal, pid = %pid, "already validated");
                    handle.close();
                    outcome.skipped += 1;
                    continue;
                }
                Admission::HaltLimit => {
                    info!(limit = ?self.config.limit, "run limit reached");
                    handle.close();
                    outcome.halted_by_limit = true;
                    break;
                }
            }

            let Ok(permit) = runtime.block_on(Arc::clone(&permits).acquire_owned()) else {
                handle.close();
                break;
            };
            debug!(ordinal = ticket.ordinal, pid = %pid, "admitted");
            let task = Arc::clone(&tasks);
            runtime.spawn_blocking(move || {
                task.validate_object(ticket.ordinal, &pid, handle, permit);
            });
        }

        if fatal.is_none() && !tasks.aborted() && self.config.checks_repository() {
            outcome.observed += drain(source.as_mut(), &tasks);
            if !tasks.aborted() {
                if let Ok(permit) = runtime.block_on(Arc::clone(&permits).acquire_owned()) {
                    let task = Arc::clone(&tasks);
                    let observed = outcome.observed;
                    runtime.spawn_blocking(move || {
                        task.check_repository(observed);
                        drop(permit);
                    });
                    outcome.repository_checked = true;
                }
            }
        }

        wait_for_workers(runtime, &permits, workers, &self.config);

        outcome.success = !tasks.aborted();
        outcome.processed = tasks.processed.load(Ordering::SeqCst);
        outcome.failed_objects = tasks.failed_objects.load(Ordering::SeqCst);
        if let Some(e) = fatal {
            error!(error = %e, "run stopped");
            return Err(e.into());
        }
        info!(
            success = outcome.success,
            processed = outcome.processed,
            failed_objects = outcome.failed_objects,
            skipped = outcome.skipped,
            admitted = tasks.resume.admitted(),
            checkpoint = ?tasks.resume.checkpoint().map(|c| c.ordinal),
            "run finished"
        );
        Ok(outcome)
    }
}

/// Pull and release what the source still holds, for the repository count.
fn drain(source: &mut dyn ObjectSource, tasks: &Tasks) -> u64 {
    let mut counted = 0;
    while let Some(next) = source.next_object() {
        match next {
            Ok(mut handle) => {
                handle.close();
                counted += 1;
            }
            Err(e) => {
                error!(error = %e, "cannot read next source object");
                tasks.request_abort();
                break;
            }
        }
    }
    counted
}

/// Take back every permit, then stop the pool within the grace period.
fn wait_for_workers(runtime: Runtime, permits: &Semaphore, workers: usize, config: &RunConfig) {
    // `workers` is bounded by `MAX_WORKERS`
    if runtime.block_on(permits.acquire_many(workers as u32)).is_err() {
        warn!("worker permits closed before all tasks returned");
    }
    runtime.shutdown_timeout(config.shutdown_grace());
}

impl std::fmt::Debug for ExecutionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpoint, CheckpointFile};
    use crate::error::{ConfigError, ResumeError};
    use migval_engine::fixture::{migrate_object, sample_object};
    use migval_engine::ValidationConfig;
    use migval_source::{MemorySource, SourceObject};
    use migval_store::{InMemoryResultSink, ResultStoreReader, StoreError, StoreResult};
    use migval_target::{SessionFactory, TargetError, TargetResult, TargetSession};
    use migval_types::{ValidationLevel, ValidationType};

    struct Fixture {
        dir: tempfile::TempDir,
        target: LocalTargetStore,
        objects: Vec<SourceObject>,
    }

    impl Fixture {
        /// `count` objects, all migrated faithfully.
        fn new(count: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let target = LocalTargetStore::open(dir.path().join("target")).unwrap();
            let objects: Vec<_> = (1..=count)
                .map(|i| sample_object(&format!("demo:{i:03}"), 1))
                .collect();
            let writer = target.writer();
            for object in &objects {
                migrate_object(&writer, object, &ValidationConfig::default()).unwrap();
            }
            Self { dir, target, objects }
        }

        fn config(&self, workers: usize) -> RunConfig {
            RunConfig {
                workers,
                resume_file: self.dir.path().join("run.resume"),
                results_dir: self.dir.path().join("results"),
                shutdown_grace_secs: 5,
                ..Default::default()
            }
        }

        fn manager(&self, config: RunConfig, sink: Arc<dyn ResultSink>) -> ExecutionManager {
            let engine = ComparisonEngine::new(config.validation.clone());
            let validator = ObjectValidator::new(engine, Arc::new(self.target.clone()));
            ExecutionManager::new(config, validator, Arc::new(self.target.clone()), sink)
        }

        fn source(&self) -> MemorySource {
            MemorySource::new(self.objects.clone())
        }
    }

    struct BrokenSessions;

    impl SessionFactory for BrokenSessions {
        fn session(&self, object_id: &str) -> TargetResult<Box<dyn TargetSession>> {
            Err(TargetError::ObjectNotFound(object_id.to_string()))
        }
    }

    struct BrokenSink;

    impl ResultSink for BrokenSink {
        fn write(&self, _results: &[ValidationResult]) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    struct PanickingSink;

    impl ResultSink for PanickingSink {
        fn write(&self, _results: &[ValidationResult]) -> StoreResult<()> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn clean_run_validates_everything() {
        let fx = Fixture::new(10);
        let sink = Arc::new(InMemoryResultSink::new());
        let source = fx.source();
        let stats = source.stats();

        let outcome = fx.manager(fx.config(3), sink.clone()).run(source).unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.processed, 10);
        assert_eq!(outcome.observed, 10);
        assert_eq!(outcome.failed_objects, 0);
        assert!(outcome.repository_checked);
        assert_eq!(sink.object_ids().len(), 10);
        assert!(sink.all().iter().all(|r| r.is_ok()), "{:?}", sink.all());
        assert!(stats.peak_open() <= 3);
        assert_eq!(stats.opened(), 10);
        assert_eq!(stats.closed(), 10);
    }

    #[test]
    fn result_indices_are_sequential_per_object() {
        let fx = Fixture::new(4);
        let sink = Arc::new(InMemoryResultSink::new());
        fx.manager(fx.config(4), sink.clone()).run(fx.source()).unwrap();
        for pid in sink.object_ids() {
            let indices: Vec<u64> = sink.results_for(&pid).iter().map(|r| r.index).collect();
            let expected: Vec<u64> = (0..indices.len() as u64).collect();
            assert_eq!(indices, expected, "{pid}");
        }
    }

    #[test]
    fn extra_target_object_fails_repository_count() {
        let fx = Fixture::new(5);
        migrate_object(
            &fx.target.writer(),
            &sample_object("demo:extra", 0),
            &ValidationConfig::default(),
        )
        .unwrap();
        let sink = Arc::new(InMemoryResultSink::new());

        let outcome = fx.manager(fx.config(2), sink.clone()).run(fx.source()).unwrap();

        assert!(outcome.success());
        let repo = sink.repository_results();
        assert_eq!(repo.len(), 1);
        assert!(repo[0].is_fail());
        assert_eq!(repo[0].level, ValidationLevel::Repository);
        assert_eq!(repo[0].validation_type, ValidationType::RepositoryResourceCount);
        assert_eq!(repo[0].index, 0);
    }

    #[test]
    fn pid_subset_skips_repository_count() {
        let fx = Fixture::new(5);
        let sink = Arc::new(InMemoryResultSink::new());
        let config = RunConfig {
            pids: vec!["demo:002".into(), "demo:004".into()],
            ..fx.config(2)
        };

        let outcome = fx.manager(config, sink.clone()).run(fx.source()).unwrap();

        assert!(outcome.success());
        assert!(!outcome.repository_checked);
        assert!(sink.repository_results().is_empty());
        assert_eq!(sink.object_ids(), vec!["demo:002", "demo:004"]);
    }

    #[test]
    fn limited_runs_resume_where_they_stopped() {
        let fx = Fixture::new(6);
        let sink = Arc::new(InMemoryResultSink::new());

        let first = fx
            .manager(RunConfig { limit: Some(4), ..fx.config(2) }, sink.clone())
            .run(fx.source())
            .unwrap();
        assert!(first.success());
        assert!(first.halted_by_limit);
        assert_eq!(first.processed, 4);
        assert_eq!(first.observed, 6);
        assert_eq!(sink.object_ids().len(), 4);
        let checkpoint = CheckpointFile::new(fx.dir.path().join("run.resume"))
            .load()
            .unwrap();
        assert_eq!(checkpoint, Some(Checkpoint::new(4, "demo:004")));

        let second = fx
            .manager(RunConfig { resume: true, ..fx.config(2) }, sink.clone())
            .run(fx.source())
            .unwrap();
        assert!(second.success());
        assert_eq!(second.skipped, 4);
        assert_eq!(second.processed, 2);
        assert_eq!(sink.object_ids().len(), 6);
        assert!(sink.repository_results().iter().all(|r| r.is_ok()));
    }

    #[test]
    fn changed_sequence_stops_the_run() {
        let fx = Fixture::new(4);
        CheckpointFile::new(fx.dir.path().join("run.resume"))
            .store(&Checkpoint::new(2, "demo:999"))
            .unwrap();
        let sink = Arc::new(InMemoryResultSink::new());

        let err = fx
            .manager(RunConfig { resume: true, ..fx.config(2) }, sink.clone())
            .run(fx.source())
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Resume(ResumeError::SequenceMismatch { ordinal: 2, .. })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn failing_task_stops_admission() {
        let fx = Fixture::new(10);
        let sink = Arc::new(InMemoryResultSink::new());
        let config = fx.config(1);
        let engine = ComparisonEngine::new(config.validation.clone());
        let validator = ObjectValidator::new(engine, Arc::new(BrokenSessions));
        let manager =
            ExecutionManager::new(config, validator, Arc::new(fx.target.clone()), sink.clone());
        let source = fx.source();
        let stats = source.stats();

        let outcome = manager.run(source).unwrap();

        assert!(!outcome.success());
        assert!(outcome.processed >= 1);
        assert!(outcome.processed < 10);
        assert!(!outcome.repository_checked);
        assert!(sink.is_empty());
        assert_eq!(stats.closed() as u64, outcome.observed);
    }

    #[test]
    fn failing_sink_aborts() {
        let fx = Fixture::new(6);
        let outcome = fx
            .manager(fx.config(1), Arc::new(BrokenSink))
            .run(fx.source())
            .unwrap();
        assert!(!outcome.success());
        assert!(outcome.processed < 6);
    }

    #[test]
    fn panic_while_persisting_aborts_and_still_completes() {
        let fx = Fixture::new(4);
        let source = fx.source();
        let stats = source.stats();

        let outcome = fx
            .manager(fx.config(1), Arc::new(PanickingSink))
            .run(source)
            .unwrap();

        assert!(!outcome.success());
        assert!(outcome.processed >= 1);
        assert!(outcome.processed < 4);
        assert!(!outcome.repository_checked);
        assert_eq!(stats.closed() as u64, outcome.observed);
        let checkpoint = CheckpointFile::new(fx.dir.path().join("run.resume"))
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.ordinal, outcome.processed);
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let fx = Fixture::new(2);
        let sink = Arc::new(InMemoryResultSink::new());
        let source = fx.source();
        let stats = source.stats();

        let err = fx
            .manager(RunConfig { workers: 0, ..fx.config(1) }, sink.clone())
            .run(source)
            .unwrap_err();

        assert!(matches!(err, RunError::Config(ConfigError::Invalid(_))));
        assert_eq!(stats.opened(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn unreadable_object_is_reported_not_fatal() {
        let fx = Fixture::new(3);
        let sink = Arc::new(InMemoryResultSink::new());
        let source = fx.source().with_unreadable("demo:002");

        let outcome = fx.manager(fx.config(2), sink.clone()).run(source).unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.failed_objects, 1);
        let results = sink.results_for("demo:002");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].validation_type, ValidationType::ObjectReadable);
        assert!(results[0].is_fail());
    }

    #[test]
    fn local_run_round_trips_through_disk() {
        let fx = Fixture::new(3);
        let export = fx.dir.path().join("export");
        std::fs::create_dir(&export).unwrap();
        for object in &fx.objects {
            let name = format!("{}.json", migval_source::json::encode_pid(object.pid()));
            std::fs::write(export.join(name), serde_json::to_vec(object).unwrap()).unwrap();
        }
        let config = RunConfig {
            source_dir: Some(export),
            target_root: Some(fx.target.root().to_path_buf()),
            ..fx.config(2)
        };

        let outcome = ExecutionManager::run_local(config).unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.processed, 3);
        let contents = ResultStoreReader::new(fx.dir.path().join("results"))
            .read_all()
            .unwrap();
        assert_eq!(contents.objects.len(), 3);
        assert!(contents.all_passed());
        assert_eq!(contents.repository.len(), 1);
    }
}
