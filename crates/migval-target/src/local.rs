use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use migval_crypto::ShardHasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{TargetError, TargetResult};
use crate::ids::{self, ResourceRef};
use crate::model::{Lookup, ResourceHeaders, TargetVersion};
use crate::traits::{SessionFactory, TargetRepository, TargetSession};
use crate::writer::LocalTargetWriter;

pub(crate) const MANIFEST_FILE: &str = "manifest.json";
const OBJECTS_DIR: &str = "objects";
const CONTENT_DIR: &str = "content";

// ---------------------------------------------------------------------------
// On-disk records
// ---------------------------------------------------------------------------

/// Everything the store knows about one object except content bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ObjectManifest {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    pub headers: ResourceHeaders,
    /// Binary resources keyed by name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceEntry>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct ResourceEntry {
    #[serde(default)]
    pub deleted: bool,
    /// Headers per stored version, oldest first.
    pub versions: Vec<ResourceHeaders>,
}

// ---------------------------------------------------------------------------
// LocalTargetStore
// ---------------------------------------------------------------------------

struct Inner {
    root: PathBuf,
    shard: ShardHasher,
    manifests: RwLock<HashMap<String, Arc<ObjectManifest>>>,
}

/// A target store laid out on the local filesystem.
///
/// ```text
/// <root>/objects/<shard>/<shard>/<b64(object id)>/manifest.json
/// <root>/objects/<shard>/<shard>/<b64(object id)>/content/<b64(name)>/<n>.bin
/// ```
///
/// Cloning is cheap; clones share one manifest cache, so a store can back
/// every worker's sessions at once. Manifests are cached on first read and
/// dropped from the cache whenever [`LocalTargetWriter`] rewrites them.
#[derive(Clone)]
pub struct LocalTargetStore {
    inner: Arc<Inner>,
}

impl LocalTargetStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> TargetResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(OBJECTS_DIR))?;
        Ok(Self {
            inner: Arc::new(Inner {
                root,
                shard: ShardHasher::new(2, 2),
                manifests: RwLock::new(HashMap::new()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// A writer sharing this store's cache.
    pub fn writer(&self) -> LocalTargetWriter {
        LocalTargetWriter::new(self.clone())
    }

    /// Directory of one object.
    pub fn object_dir(&self, object_id: &str) -> PathBuf {
        let mut dir = self.inner.root.join(OBJECTS_DIR);
        for segment in self.inner.shard.segments(object_id) {
            dir.push(segment);
        }
        dir.push(encode(object_id));
        dir
    }

    /// File holding stored version `n` of resource `name`.
    pub fn content_file(&self, object_id: &str, name: &str, n: usize) -> PathBuf {
        self.object_dir(object_id)
            .join(CONTENT_DIR)
            .join(encode(name))
            .join(format!("{n}.bin"))
    }

    /// Number of manifests currently cached.
    pub fn cached_objects(&self) -> usize {
        self.inner.manifests.read().expect("lock poisoned").len()
    }

    /// Manifest of `object_id`, through the cache.
    pub(crate) fn load(&self, object_id: &str) -> TargetResult<Option<Arc<ObjectManifest>>> {
        if let Some(m) = self
            .inner
            .manifests
            .read()
            .expect("lock poisoned")
            .get(object_id)
        {
            trace!(object = object_id, "manifest cache hit");
            return Ok(Some(Arc::clone(m)));
        }
        let Some(manifest) = self.read_manifest(object_id)? else {
            return Ok(None);
        };
        let manifest = Arc::new(manifest);
        self.inner
            .manifests
            .write()
            .expect("lock poisoned")
            .insert(object_id.to_string(), Arc::clone(&manifest));
        Ok(Some(manifest))
    }

    /// Manifest of `object_id` straight from disk.
    pub(crate) fn read_manifest(&self, object_id: &str) -> TargetResult<Option<ObjectManifest>> {
        let path = self.object_dir(object_id).join(MANIFEST_FILE);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let manifest: ObjectManifest =
            serde_json::from_slice(&data).map_err(|e| TargetError::CorruptManifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Some(manifest))
    }

    /// Atomically replace the manifest on disk and evict it from the cache.
    pub(crate) fn store_manifest(&self, manifest: &ObjectManifest) -> TargetResult<()> {
        let dir = self.object_dir(&manifest.id);
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_vec_pretty(manifest)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_data()?;
        tmp.persist(dir.join(MANIFEST_FILE))?;
        self.inner
            .manifests
            .write()
            .expect("lock poisoned")
            .remove(&manifest.id);
        debug!(object = %manifest.id, resources = manifest.resources.len(), "manifest stored");
        Ok(())
    }

    /// Remove every trace of an object, leaving no tombstone.
    pub(crate) fn purge(&self, object_id: &str) -> TargetResult<()> {
        let dir = self.object_dir(object_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        self.inner
            .manifests
            .write()
            .expect("lock poisoned")
            .remove(object_id);
        Ok(())
    }
}

impl fmt::Debug for LocalTargetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTargetStore")
            .field("root", &self.inner.root)
            .field("cached_objects", &self.cached_objects())
            .finish()
    }
}

impl SessionFactory for LocalTargetStore {
    fn session(&self, object_id: &str) -> TargetResult<Box<dyn TargetSession>> {
        Ok(Box::new(LocalSession {
            object_id: object_id.to_string(),
            manifest: self.load(object_id)?,
            store: self.clone(),
        }))
    }
}

impl TargetRepository for LocalTargetStore {
    fn list_object_ids(&self) -> TargetResult<Vec<String>> {
        let objects = self.inner.root.join(OBJECTS_DIR);
        let depth = self.inner.shard.depth() + 2;
        let mut ids = Vec::new();
        for entry in WalkDir::new(&objects).min_depth(depth).max_depth(depth) {
            let entry = entry?;
            if entry.file_name() != MANIFEST_FILE {
                continue;
            }
            let decoded = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .and_then(decode);
            match decoded {
                Some(id) => ids.push(id),
                None => {
                    return Err(TargetError::CorruptManifest {
                        path: entry.path().to_path_buf(),
                        reason: "object directory name is not an encoded id".into(),
                    })
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// LocalSession
// ---------------------------------------------------------------------------

/// Session over one object of a [`LocalTargetStore`].
///
/// The manifest is resolved once when the session opens.
pub struct LocalSession {
    object_id: String,
    manifest: Option<Arc<ObjectManifest>>,
    store: LocalTargetStore,
}

/// A binary resource or version resolved against the manifest.
struct Located<'a> {
    name: &'a str,
    n: usize,
    headers: &'a ResourceHeaders,
}

impl LocalSession {
    fn locate<'a>(&'a self, id: &'a str) -> Lookup<Located<'a>> {
        let Some(manifest) = &self.manifest else {
            return Lookup::NotFound;
        };
        let (name, n) = match ResourceRef::parse(&self.object_id, id) {
            Some(ResourceRef::Resource { name }) => (name, None),
            Some(ResourceRef::Version { name, n }) => (name, Some(n)),
            Some(ResourceRef::Object) | None => return Lookup::NotFound,
        };
        if manifest.deleted {
            return Lookup::Tombstone;
        }
        let Some((name, entry)) = manifest.resources.get_key_value(name) else {
            return Lookup::NotFound;
        };
        if entry.deleted {
            return Lookup::Tombstone;
        }
        let n = match n {
            Some(n) => n,
            None => match entry.versions.len().checked_sub(1) {
                Some(head) => head,
                None => return Lookup::NotFound,
            },
        };
        match entry.versions.get(n) {
            Some(headers) => Lookup::Found(Located {
                name: name.as_str(),
                n,
                headers,
            }),
            None => Lookup::NotFound,
        }
    }
}

impl TargetSession for LocalSession {
    fn object_id(&self) -> &str {
        &self.object_id
    }

    fn headers(&self, id: &str) -> TargetResult<Lookup<ResourceHeaders>> {
        if id == self.object_id {
            return Ok(match &self.manifest {
                None => Lookup::NotFound,
                Some(m) if m.deleted => Lookup::Tombstone,
                Some(m) => Lookup::Found(m.headers.clone()),
            });
        }
        Ok(self.locate(id).map(|loc| {
            let mut headers = loc.headers.clone();
            headers.id = id.to_string();
            headers
        }))
    }

    fn content(&self, id: &str) -> TargetResult<Lookup<Box<dyn Read + Send>>> {
        match self.locate(id) {
            Lookup::Found(loc) => {
                let path = self.store.content_file(&self.object_id, loc.name, loc.n);
                let file: Box<dyn Read + Send> = Box::new(File::open(path)?);
                Ok(Lookup::Found(file))
            }
            Lookup::Tombstone => Ok(Lookup::Tombstone),
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }

    fn content_path(&self, id: &str) -> TargetResult<Option<PathBuf>> {
        Ok(self
            .locate(id)
            .found()
            .map(|loc| self.store.content_file(&self.object_id, loc.name, loc.n)))
    }

    fn versions(&self, id: &str) -> TargetResult<Lookup<Vec<TargetVersion>>> {
        let Some(manifest) = &self.manifest else {
            return Ok(Lookup::NotFound);
        };
        let Some(ResourceRef::Resource { name }) = ResourceRef::parse(&self.object_id, id) else {
            return Ok(Lookup::NotFound);
        };
        if manifest.deleted {
            return Ok(Lookup::Tombstone);
        }
        Ok(match manifest.resources.get(name) {
            None => Lookup::NotFound,
            Some(entry) if entry.deleted => Lookup::Tombstone,
            Some(entry) => Lookup::Found(
                entry
                    .versions
                    .iter()
                    .enumerate()
                    .map(|(n, h)| TargetVersion {
                        id: ids::version_id(id, n),
                        created: h.created.clone(),
                    })
                    .collect(),
            ),
        })
    }

    fn resource_headers(&self) -> TargetResult<Vec<ResourceHeaders>> {
        let Some(manifest) = &self.manifest else {
            return Ok(Vec::new());
        };
        if manifest.deleted {
            return Ok(Vec::new());
        }
        Ok(manifest
            .resources
            .iter()
            .filter(|(_, entry)| !entry.deleted)
            .filter_map(|(name, entry)| {
                let mut headers = entry.versions.last()?.clone();
                headers.id = ids::resource_id(&self.object_id, name);
                Some(headers)
            })
            .collect())
    }
}

fn encode(id: &str) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

fn decode(name: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(name).ok()?;
    String::from_utf8(bytes).ok()
}
