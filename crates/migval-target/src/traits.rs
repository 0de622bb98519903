use std::io::Read;
use std::path::PathBuf;

use crate::error::TargetResult;
use crate::model::{Lookup, ResourceHeaders, TargetVersion};

/// Read access to the resources of one target object.
///
/// Resource ids follow [`crate::ids`]; an id outside the session's object is
/// reported as [`Lookup::NotFound`].
pub trait TargetSession: Send {
    /// The object this session is scoped to.
    fn object_id(&self) -> &str;

    /// Headers of a resource, a stored version, or the object itself.
    fn headers(&self, id: &str) -> TargetResult<Lookup<ResourceHeaders>>;

    /// Content stream of a binary resource or version.
    fn content(&self, id: &str) -> TargetResult<Lookup<Box<dyn Read + Send>>>;

    /// Where the store keeps the bytes of `id` on disk, if it uses a disk
    /// layout and knows the resource.
    fn content_path(&self, id: &str) -> TargetResult<Option<PathBuf>>;

    /// Stored versions of a resource, oldest first.
    fn versions(&self, id: &str) -> TargetResult<Lookup<Vec<TargetVersion>>>;

    /// Headers of every live resource under the object.
    fn resource_headers(&self) -> TargetResult<Vec<ResourceHeaders>>;
}

/// Opens sessions; one factory is shared by all workers.
pub trait SessionFactory: Send + Sync {
    fn session(&self, object_id: &str) -> TargetResult<Box<dyn TargetSession>>;
}

/// Whole-repository queries.
pub trait TargetRepository: Send + Sync {
    /// Every object id the target holds, including tombstoned objects.
    fn list_object_ids(&self) -> TargetResult<Vec<String>>;
}
