use std::collections::BTreeSet;

use migval_source::{Datastream, DatastreamVersion, ObjectInfo, PropertyName, SourceObject};
use migval_target::{ids, Lookup, ResourceHeaders, TargetSession, TargetVersion};
use migval_types::{ValidationResult, ValidationType};
use tracing::debug;

use crate::config::{Strategy, ValidationConfig};
use crate::index::{IndexCounter, ObjectIds};
use crate::rules::{self, Check};

/// Runs the configured strategy over source objects.
///
/// Stateless between objects; one engine serves every worker.
#[derive(Clone, Debug, Default)]
pub struct ComparisonEngine {
    config: ValidationConfig,
}

impl ComparisonEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    pub fn target_object_id(&self, pid: &str) -> String {
        self.config.target_object_id(pid)
    }

    /// Begin comparing the object `pid` against `session`.
    pub fn start<'a>(&'a self, pid: &str, session: &'a dyn TargetSession) -> ObjectComparison<'a> {
        ObjectComparison {
            config: &self.config,
            session,
            ids: ObjectIds {
                source: pid.to_string(),
                target: session.object_id().to_string(),
            },
            counter: IndexCounter::new(),
            results: Vec::new(),
            comparing: false,
            source_names: BTreeSet::new(),
            live_datastreams: 0,
        }
    }

    /// Compare a fully materialized object.
    pub fn validate(&self, object: &SourceObject, session: &dyn TargetSession) -> Vec<ValidationResult> {
        let mut comparison = self.start(object.pid(), session);
        if comparison.begin(&object.info) {
            for datastream in &object.datastreams {
                comparison.datastream(datastream);
            }
        }
        comparison.finish()
    }
}

/// The comparison of one object, fed incrementally.
///
/// Call [`begin`](Self::begin) with the object's properties, then
/// [`datastream`](Self::datastream) for each datastream in order, then
/// [`finish`](Self::finish). Results are numbered in the order they are
/// produced.
pub struct ObjectComparison<'a> {
    config: &'a ValidationConfig,
    session: &'a dyn TargetSession,
    ids: ObjectIds,
    counter: IndexCounter,
    results: Vec<ValidationResult>,
    /// The object exists on both sides and datastreams are being compared.
    comparing: bool,
    source_names: BTreeSet<String>,
    live_datastreams: usize,
}

impl<'a> ObjectComparison<'a> {
    /// Reconcile the object's existence, then its properties.
    ///
    /// Returns whether datastreams should be fed. An object that is deleted
    /// on either side, or missing from the target, yields exactly one result
    /// and nothing more.
    pub fn begin(&mut self, info: &ObjectInfo) -> bool {
        let source_deleted = info.state().is_deleted(self.config.inactive_as_deleted);
        let lookup = match self.session.headers(&self.ids.target) {
            Ok(lookup) => lookup,
            Err(e) => {
                self.object(Check::fail(
                    ValidationType::SourceObjectExistsInTarget,
                    format!("target lookup failed: {e}"),
                ));
                return false;
            }
        };
        self.object(rules::existence(
            ValidationType::SourceObjectExistsInTarget,
            source_deleted,
            &lookup,
        ));
        let headers = match lookup {
            Lookup::Found(headers) if !source_deleted => headers,
            _ => return false,
        };

        for property in &info.properties {
            let Some(name) = PropertyName::from_uri(&property.name) else {
                continue;
            };
            self.object(rules::property_equality(name, &property.value, &headers));
        }
        self.comparing = true;
        true
    }

    /// Compare one source datastream with its target resource.
    pub fn datastream(&mut self, datastream: &Datastream) {
        if !self.comparing {
            return;
        }
        self.source_names.insert(datastream.id.clone());
        let deleted = datastream.state.is_deleted(self.config.inactive_as_deleted);
        if !deleted {
            self.live_datastreams += 1;
        }

        let target_resource = ids::resource_id(&self.ids.target, &datastream.id);
        let source_resource = format!("{}/{}", self.ids.source, datastream.id);
        let lookup = match self.session.headers(&target_resource) {
            Ok(lookup) => lookup,
            Err(e) => {
                self.resource(
                    &source_resource,
                    &target_resource,
                    Check::fail(
                        ValidationType::SourceResourceExistsInTarget,
                        format!("target lookup failed: {e}"),
                    ),
                );
                return;
            }
        };
        self.resource(
            &source_resource,
            &target_resource,
            rules::existence(ValidationType::SourceResourceExistsInTarget, deleted, &lookup),
        );
        let head = match lookup {
            Lookup::Found(headers) if !deleted => headers,
            _ => return,
        };

        let stored = self.stored_versions(&source_resource, &target_resource);
        match self.config.strategy {
            Strategy::FullHistory => {
                let migrated = migrated_versions(datastream);
                self.resource(
                    &source_resource,
                    &target_resource,
                    rules::version_count(migrated.len(), stored.len()),
                );
                for (version, target) in migrated.iter().zip(&stored) {
                    let source_version = format!("{source_resource}/{}", version.id);
                    match self.session.headers(&target.id) {
                        Ok(Lookup::Found(headers)) => {
                            self.version(datastream, version, &source_version, &target.id, &headers)
                        }
                        Ok(_) => self.resource(
                            &source_version,
                            &target.id,
                            Check::fail(
                                ValidationType::SourceResourceExistsInTarget,
                                "listed version not found in target",
                            ),
                        ),
                        Err(e) => self.resource(
                            &source_version,
                            &target.id,
                            Check::fail(
                                ValidationType::SourceResourceExistsInTarget,
                                format!("target lookup failed: {e}"),
                            ),
                        ),
                    }
                }
            }
            Strategy::HeadOnly => {
                self.resource(
                    &source_resource,
                    &target_resource,
                    rules::version_count(1, stored.len()),
                );
                if let Some(version) = datastream.head() {
                    self.version(datastream, version, &source_resource, &target_resource, &head);
                }
            }
        }
    }

    /// Run the whole-object checks and return every result produced.
    pub fn finish(mut self) -> Vec<ValidationResult> {
        if self.comparing {
            match self.session.resource_headers() {
                Ok(target) => {
                    let binaries = target.iter().filter(|h| h.is_binary()).count();
                    self.object(rules::binary_head_count(self.live_datastreams, binaries));
                    match rules::unmatched_target_resources(&self.source_names, &target) {
                        Ok(check) => self.object(check),
                        Err(unmatched) => {
                            for (target_resource, check) in unmatched {
                                let name = target_resource.rsplit('/').next().unwrap_or_default();
                                let source_resource = format!("{}/{name}", self.ids.source);
                                self.resource(&source_resource, &target_resource, check);
                            }
                        }
                    }
                }
                Err(e) => self.object(Check::fail(
                    ValidationType::BinaryHeadCount,
                    format!("cannot list target resources: {e}"),
                )),
            }
        }
        self.results
    }

    /// Stop early because the source could not be read: keep what was
    /// produced and append one `OBJECT_READABLE` failure.
    pub fn fail_unreadable(mut self, reason: &str) -> Vec<ValidationResult> {
        let result = self.ids.unreadable(&mut self.counter, reason);
        self.results.push(result);
        self.results
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn version(
        &mut self,
        datastream: &Datastream,
        version: &DatastreamVersion,
        source_resource: &str,
        target_resource: &str,
        target: &ResourceHeaders,
    ) {
        self.resource(source_resource, target_resource, rules::created_date(version, target));
        self.resource(
            source_resource,
            target_resource,
            rules::last_modified_date(version, target),
        );
        if let Some(check) = rules::binary_metadata(version, target) {
            self.resource(source_resource, target_resource, check);
        }
        if !datastream.control_group.is_managed() {
            return;
        }
        let size = match self.session.content_path(target_resource) {
            Ok(path) => rules::binary_size(version, target, path.as_deref()),
            Err(e) => Check::fail(
                ValidationType::BinarySize,
                format!("cannot locate target content: {e}"),
            ),
        };
        self.resource(source_resource, target_resource, size);
        if self.config.checksum {
            let check = rules::checksum(self.config.digest_algorithm, &version.content, target);
            self.resource(source_resource, target_resource, check);
        }
    }

    /// Stored versions of a live resource; a listing failure is recorded
    /// and treated as no versions.
    fn stored_versions(&mut self, source_resource: &str, target_resource: &str) -> Vec<TargetVersion> {
        match self.session.versions(target_resource) {
            Ok(Lookup::Found(versions)) => versions,
            Ok(_) => Vec::new(),
            Err(e) => {
                self.resource(
                    source_resource,
                    target_resource,
                    Check::fail(
                        ValidationType::BinaryVersionCount,
                        format!("cannot list target versions: {e}"),
                    ),
                );
                Vec::new()
            }
        }
    }

    fn object(&mut self, check: Check) {
        let result = self.ids.object_result(&mut self.counter, check);
        self.push(result);
    }

    fn resource(&mut self, source_resource: &str, target_resource: &str, check: Check) {
        let result = self
            .ids
            .resource_result(&mut self.counter, source_resource, target_resource, check);
        self.push(result);
    }

    fn push(&mut self, result: ValidationResult) {
        debug!(
            pid = %self.ids.source,
            index = result.index,
            status = %result.status,
            kind = result.validation_type.as_str(),
            "result"
        );
        self.results.push(result);
    }
}

/// Source versions that a full-history migration carries over. A
/// non-versionable datastream only ever migrates its HEAD.
pub fn migrated_versions(datastream: &Datastream) -> &[DatastreamVersion] {
    if datastream.versionable {
        &datastream.versions
    } else {
        let start = datastream.versions.len().saturating_sub(1);
        &datastream.versions[start..]
    }
}
