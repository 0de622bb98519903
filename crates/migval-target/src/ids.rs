//! Identifier scheme for resources inside a target object.
//!
//! ```text
//! info:fedora/demo:1                          object
//! info:fedora/demo:1/DS1                      resource (HEAD)
//! info:fedora/demo:1/DS1/fcr:versions/0       first stored version
//! ```

/// Path segment that introduces a version number.
pub const VERSIONS_SEGMENT: &str = "fcr:versions";

/// Id of the resource `name` inside `object_id`.
pub fn resource_id(object_id: &str, name: &str) -> String {
    format!("{object_id}/{name}")
}

/// Id of stored version `n` (oldest is 0) of `resource_id`.
pub fn version_id(resource_id: &str, n: usize) -> String {
    format!("{resource_id}/{VERSIONS_SEGMENT}/{n}")
}

/// What an id refers to, relative to one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    Object,
    Resource { name: &'a str },
    Version { name: &'a str, n: usize },
}

impl<'a> ResourceRef<'a> {
    /// Classify `id` against `object_id`. `None` when `id` is not under the
    /// object or is not well formed.
    pub fn parse(object_id: &str, id: &'a str) -> Option<Self> {
        if id == object_id {
            return Some(Self::Object);
        }
        let rest = id.strip_prefix(object_id)?.strip_prefix('/')?;
        let marker = format!("/{VERSIONS_SEGMENT}/");
        match rest.split_once(marker.as_str()) {
            Some((name, n)) if !name.is_empty() => Some(Self::Version {
                name,
                n: n.parse().ok()?,
            }),
            Some(_) => None,
            None if rest.is_empty() || rest.contains('/') => None,
            None => Some(Self::Resource { name: rest }),
        }
    }
}
