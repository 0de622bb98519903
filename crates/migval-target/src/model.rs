use serde::{Deserialize, Serialize};

/// Outcome of looking a resource up in the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    /// The resource existed and was deleted; the target keeps a marker.
    Tombstone,
    /// The target has never held the resource.
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Self::Found(v) => Lookup::Found(v),
            Self::Tombstone => Lookup::Tombstone,
            Self::NotFound => Lookup::NotFound,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::Tombstone => Lookup::Tombstone,
            Self::NotFound => Lookup::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Container,
    Binary,
}

/// One statement of a resource's embedded metadata graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// Headers the target records for a resource (or one of its versions).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHeaders {
    pub id: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Digest urns, e.g. `urn:sha-512:...`.
    #[serde(default)]
    pub digests: Vec<String>,
    #[serde(default)]
    pub triples: Vec<Triple>,
}

impl ResourceHeaders {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            created: None,
            last_modified: None,
            content_length: None,
            mime_type: None,
            digests: Vec::new(),
            triples: Vec::new(),
        }
    }

    pub fn is_binary(&self) -> bool {
        self.kind == ResourceKind::Binary
    }

    /// Object of the first triple with `predicate`.
    pub fn triple_value(&self, predicate: &str) -> Option<&str> {
        self.triples
            .iter()
            .find(|t| t.predicate == predicate)
            .map(|t| t.object.as_str())
    }

    /// Last path segment of the id.
    pub fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}

/// A stored version as listed by the target, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetVersion {
    /// Resource id of this version.
    pub id: String,
    pub created: Option<String>,
}
