use std::collections::BTreeMap;
use std::fs;

use migval_crypto::{DigestAlgorithm, DigestUrn};
use tracing::debug;

use crate::error::{TargetError, TargetResult};
use crate::ids;
use crate::local::{LocalTargetStore, ObjectManifest};
use crate::model::{ResourceHeaders, ResourceKind, Triple};

/// Populates a [`LocalTargetStore`].
///
/// Digests are computed from the bytes actually written, in every
/// configured algorithm (SHA-512 and SHA-256 by default).
pub struct LocalTargetWriter {
    store: LocalTargetStore,
    algorithms: Vec<DigestAlgorithm>,
}

impl LocalTargetWriter {
    pub(crate) fn new(store: LocalTargetStore) -> Self {
        Self {
            store,
            algorithms: vec![DigestAlgorithm::Sha512, DigestAlgorithm::Sha256],
        }
    }

    /// Record digests in exactly these algorithms.
    pub fn with_algorithms(mut self, algorithms: impl IntoIterator<Item = DigestAlgorithm>) -> Self {
        self.algorithms = algorithms.into_iter().collect();
        self
    }

    /// Create an object, or reset an existing one to no resources.
    pub fn create_object(
        &self,
        object_id: &str,
        created: Option<&str>,
        last_modified: Option<&str>,
        triples: Vec<Triple>,
    ) -> TargetResult<()> {
        let mut headers = ResourceHeaders::new(object_id, ResourceKind::Container);
        headers.created = created.map(str::to_string);
        headers.last_modified = last_modified.map(str::to_string);
        headers.triples = triples;
        self.store.store_manifest(&ObjectManifest {
            id: object_id.to_string(),
            deleted: false,
            headers,
            resources: BTreeMap::new(),
        })
    }

    /// Append a stored version to binary resource `name`, creating the
    /// resource if needed. Returns the new version's id.
    pub fn add_version(
        &self,
        object_id: &str,
        name: &str,
        bytes: &[u8],
        mime_type: Option<&str>,
        created: &str,
    ) -> TargetResult<String> {
        let mut manifest = self.existing(object_id)?;
        let entry = manifest.resources.entry(name.to_string()).or_default();
        entry.deleted = false;
        let n = entry.versions.len();

        let path = self.store.content_file(object_id, name, n);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;

        let version = ids::version_id(&ids::resource_id(object_id, name), n);
        let mut headers = ResourceHeaders::new(version.clone(), ResourceKind::Binary);
        headers.created = Some(created.to_string());
        headers.last_modified = Some(created.to_string());
        headers.content_length = Some(bytes.len() as u64);
        headers.mime_type = mime_type.map(str::to_string);
        headers.digests = self
            .algorithms
            .iter()
            .map(|alg| DigestUrn::new(*alg, alg.hex_digest(bytes)).to_string())
            .collect();
        entry.versions.push(headers);

        self.store.store_manifest(&manifest)?;
        debug!(object = object_id, resource = name, version = n, "version added");
        Ok(version)
    }

    /// Replace a resource with a tombstone.
    pub fn delete_resource(&self, object_id: &str, name: &str) -> TargetResult<()> {
        let mut manifest = self.existing(object_id)?;
        manifest
            .resources
            .entry(name.to_string())
            .or_default()
            .deleted = true;
        self.store.store_manifest(&manifest)
    }

    /// Replace an object with a tombstone.
    pub fn delete_object(&self, object_id: &str) -> TargetResult<()> {
        let mut manifest = self.existing(object_id)?;
        manifest.deleted = true;
        self.store.store_manifest(&manifest)
    }

    /// Remove an object entirely.
    pub fn purge_object(&self, object_id: &str) -> TargetResult<()> {
        self.store.purge(object_id)
    }

    fn existing(&self, object_id: &str) -> TargetResult<ObjectManifest> {
        self.store
            .read_manifest(object_id)?
            .ok_or_else(|| TargetError::ObjectNotFound(object_id.to_string()))
    }
}
