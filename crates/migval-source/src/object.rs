use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a legacy object or datastream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectState {
    #[default]
    #[serde(rename = "A", alias = "Active")]
    Active,
    #[serde(rename = "I", alias = "Inactive")]
    Inactive,
    #[serde(rename = "D", alias = "Deleted")]
    Deleted,
}

impl ObjectState {
    /// Whether this state means "must not exist in the target".
    ///
    /// Inactive counts as deleted only when the migration was configured to
    /// treat it that way.
    pub fn is_deleted(&self, inactive_as_deleted: bool) -> bool {
        match self {
            Self::Deleted => true,
            Self::Inactive => inactive_as_deleted,
            Self::Active => false,
        }
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
            Self::Deleted => write!(f, "Deleted"),
        }
    }
}

impl FromStr for ObjectState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "Active" => Ok(Self::Active),
            "I" | "Inactive" => Ok(Self::Inactive),
            "D" | "Deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown object state: {other}")),
        }
    }
}

/// How a datastream's bytes are held by the legacy repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlGroup {
    /// Inline XML inside the object export.
    #[serde(rename = "X")]
    InlineXml,
    /// Bytes stored and owned by the repository.
    #[serde(rename = "M")]
    Managed,
    /// Externally referenced content.
    #[serde(rename = "E")]
    External,
    /// Redirect to content elsewhere.
    #[serde(rename = "R")]
    Redirect,
}

impl ControlGroup {
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed)
    }
}

impl fmt::Display for ControlGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::InlineXml => "X",
            Self::Managed => "M",
            Self::External => "E",
            Self::Redirect => "R",
        };
        f.write_str(code)
    }
}

/// The fixed set of object properties the validator reconciles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyName {
    Label,
    State,
    Owner,
    CreatedDate,
    LastModifiedDate,
}

impl PropertyName {
    pub const ALL: [PropertyName; 5] = [
        Self::Label,
        Self::State,
        Self::Owner,
        Self::CreatedDate,
        Self::LastModifiedDate,
    ];

    /// The legacy property URI.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Label => "info:fedora/fedora-system:def/model#label",
            Self::State => "info:fedora/fedora-system:def/model#state",
            Self::Owner => "info:fedora/fedora-system:def/model#ownerId",
            Self::CreatedDate => "info:fedora/fedora-system:def/model#createdDate",
            Self::LastModifiedDate => "info:fedora/fedora-system:def/view#lastModifiedDate",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.uri() == uri)
    }

    /// Date-valued properties are compared as instants.
    pub fn is_date(&self) -> bool {
        matches!(self, Self::CreatedDate | Self::LastModifiedDate)
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Label => "label",
            Self::State => "state",
            Self::Owner => "ownerId",
            Self::CreatedDate => "createdDate",
            Self::LastModifiedDate => "lastModifiedDate",
        };
        f.write_str(name)
    }
}

/// One object-level property as exported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectProperty {
    /// Property URI.
    pub name: String,
    pub value: String,
}

impl ObjectProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Object identity and properties, available before any datastream is read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub pid: String,
    #[serde(default)]
    pub properties: Vec<ObjectProperty>,
}

impl ObjectInfo {
    /// Value of the first property with this URI.
    pub fn property(&self, name: PropertyName) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name.uri())
            .map(|p| p.value.as_str())
    }

    /// Object state; objects without a state property are active.
    pub fn state(&self) -> ObjectState {
        self.property(PropertyName::State)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// Where a datastream version's bytes live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    /// Inline text (inline XML datastreams).
    Inline { text: String },
    /// A file on the legacy repository's disk.
    File { path: PathBuf },
    /// An external or redirect URL; the bytes are not owned by the repository.
    Url { url: String },
}

impl Content {
    /// Open the bytes for reading.
    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Inline { text } => Ok(Box::new(Cursor::new(text.clone().into_bytes()))),
            Self::File { path } => Ok(Box::new(File::open(path)?)),
            Self::Url { url } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("content at {url} is not held by the repository"),
            )),
        }
    }

    /// Byte length of the content.
    pub fn byte_len(&self) -> io::Result<u64> {
        match self {
            Self::Inline { text } => Ok(text.len() as u64),
            Self::File { path } => Ok(std::fs::metadata(path)?.len()),
            Self::Url { url } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("content at {url} has no local length"),
            )),
        }
    }

    /// Resolve a relative file path against `base`.
    pub fn resolve(self, base: &Path) -> Self {
        match self {
            Self::File { path } if path.is_relative() => Self::File {
                path: base.join(path),
            },
            other => other,
        }
    }
}

/// One version of a datastream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastreamVersion {
    /// Version id, e.g. `DS1.0`.
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Creation timestamp as exported.
    pub created: String,
    pub content: Content,
}

/// A datastream and its versions, oldest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastream {
    pub id: String,
    pub control_group: ControlGroup,
    #[serde(default)]
    pub state: ObjectState,
    #[serde(default = "default_versionable")]
    pub versionable: bool,
    pub versions: Vec<DatastreamVersion>,
}

fn default_versionable() -> bool {
    true
}

impl Datastream {
    /// The most recent version.
    pub fn head(&self) -> Option<&DatastreamVersion> {
        self.versions.last()
    }
}

/// A fully materialized export: properties plus all datastreams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceObject {
    #[serde(flatten)]
    pub info: ObjectInfo,
    #[serde(default)]
    pub datastreams: Vec<Datastream>,
}

impl SourceObject {
    pub fn new(pid: impl Into<String>) -> Self {
        Self {
            info: ObjectInfo {
                pid: pid.into(),
                properties: Vec::new(),
            },
            datastreams: Vec::new(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.info.pid
    }

    pub fn with_property(mut self, name: PropertyName, value: impl Into<String>) -> Self {
        self.info.properties.push(ObjectProperty::new(name.uri(), value));
        self
    }

    pub fn with_datastream(mut self, datastream: Datastream) -> Self {
        self.datastreams.push(datastream);
        self
    }
}
