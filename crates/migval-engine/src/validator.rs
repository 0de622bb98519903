use std::sync::Arc;

use migval_source::{ObjectHandle, SourceResult};
use migval_target::SessionFactory;
use migval_types::ValidationResult;
use tracing::{debug, warn};

use crate::comparison::{ComparisonEngine, ObjectComparison};
use crate::error::EngineResult;

/// Closes the wrapped handle when dropped, on every exit path.
struct HandleGuard(Box<dyn ObjectHandle>);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Validates one source object at a time against the target.
///
/// Shared by all workers: the engine is immutable and the session factory
/// is required to support concurrent use.
#[derive(Clone)]
pub struct ObjectValidator {
    engine: Arc<ComparisonEngine>,
    sessions: Arc<dyn SessionFactory>,
}

impl ObjectValidator {
    pub fn new(engine: ComparisonEngine, sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            engine: Arc::new(engine),
            sessions,
        }
    }

    pub fn engine(&self) -> &ComparisonEngine {
        &self.engine
    }

    /// Validate the object behind `handle`, consuming and closing it.
    ///
    /// A source object that cannot be opened or streamed is reported as
    /// data: the results produced so far plus one `OBJECT_READABLE` failure.
    /// Only a failure to open the target session is returned as an error.
    pub fn validate(&self, handle: Box<dyn ObjectHandle>) -> EngineResult<Vec<ValidationResult>> {
        let mut guard = HandleGuard(handle);
        let pid = guard.0.pid().to_string();
        let target_id = self.engine.target_object_id(&pid);
        let session = self.sessions.session(&target_id)?;

        let mut comparison = self.engine.start(&pid, session.as_ref());
        let results = match stream(guard.0.as_mut(), &mut comparison) {
            Ok(()) => comparison.finish(),
            Err(e) => {
                warn!(pid = %pid, error = %e, "source object unreadable");
                comparison.fail_unreadable(&e.to_string())
            }
        };
        debug!(
            pid = %pid,
            results = results.len(),
            failed = results.iter().filter(|r| r.is_fail()).count(),
            "object validated"
        );
        Ok(results)
    }
}

fn stream(handle: &mut dyn ObjectHandle, comparison: &mut ObjectComparison<'_>) -> SourceResult<()> {
    let mut reader = handle.open()?;
    let info = reader.object_info()?;
    if !comparison.begin(&info) {
        return Ok(());
    }
    while let Some(datastream) = reader.next_datastream()? {
        comparison.datastream(&datastream);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::fixture;
    use migval_source::{MemorySource, ObjectSource};
    use migval_target::LocalTargetStore;
    use migval_types::ValidationType;

    fn setup(managed: usize) -> (tempfile::TempDir, ObjectValidator, migval_source::SourceObject) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTargetStore::open(dir.path()).unwrap();
        let config = ValidationConfig::default();
        let object = fixture::sample_object("demo:1", managed);
        fixture::migrate_object(&store.writer(), &object, &config).unwrap();
        let validator = ObjectValidator::new(ComparisonEngine::new(config), Arc::new(store));
        (dir, validator, object)
    }

    #[test]
    fn validates_and_closes_the_handle() {
        let (_dir, validator, object) = setup(2);
        let mut source = MemorySource::new([object]);
        let stats = source.stats();
        let handle = source.next_object().unwrap().unwrap();
        let results = validator.validate(handle).unwrap();
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.closed(), 1);
    }

    #[test]
    fn unopenable_object_yields_object_readable_failure() {
        let (_dir, validator, object) = setup(1);
        let mut source = MemorySource::new([object]).with_unreadable("demo:1");
        let stats = source.stats();
        let results = validator
            .validate(source.next_object().unwrap().unwrap())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_fail());
        assert_eq!(results[0].validation_type, ValidationType::ObjectReadable);
        assert!(results[0].details.contains("injected open failure"));
        assert_eq!(stats.closed(), 1);
    }

    #[test]
    fn stream_failure_keeps_partial_results() {
        let (_dir, validator, object) = setup(2);
        let mut source = MemorySource::new([object]).with_broken_stream("demo:1", 1);
        let results = validator
            .validate(source.next_object().unwrap().unwrap())
            .unwrap();
        let last = results.last().unwrap();
        assert_eq!(last.validation_type, ValidationType::ObjectReadable);
        assert!(last.is_fail());
        // object existence, properties and the DC datastream came first
        assert!(results
            .iter()
            .any(|r| r.source_resource_id.as_deref() == Some("demo:1/DC")));
        assert!(!results
            .iter()
            .any(|r| r.validation_type == ValidationType::BinaryHeadCount));
        let indices: Vec<u64> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..results.len() as u64).collect::<Vec<_>>());
    }
}
