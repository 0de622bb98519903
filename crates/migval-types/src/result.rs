use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Outcome of a single comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Ok,
    Fail,
}

impl ResultStatus {
    /// `Ok` when `passed`, otherwise `Fail`.
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Self::Ok
        } else {
            Self::Fail
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

impl FromStr for ResultStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Self::Ok),
            "FAIL" => Ok(Self::Fail),
            other => Err(TypeError::UnknownStatus(other.to_string())),
        }
    }
}

/// Scope a result applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationLevel {
    /// Whole-repository reconciliation (object counts).
    Repository,
    /// One object's own properties and aggregate counts.
    Object,
    /// One datastream (or datastream version) inside an object.
    ObjectResource,
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository => write!(f, "REPOSITORY"),
            Self::Object => write!(f, "OBJECT"),
            Self::ObjectResource => write!(f, "OBJECT_RESOURCE"),
        }
    }
}

impl FromStr for ValidationLevel {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REPOSITORY" => Ok(Self::Repository),
            "OBJECT" => Ok(Self::Object),
            "OBJECT_RESOURCE" => Ok(Self::ObjectResource),
            other => Err(TypeError::UnknownLevel(other.to_string())),
        }
    }
}

/// The rule that produced a result.
///
/// This is a closed set. Report and aggregation code matches on it
/// exhaustively, so adding a variant is a compile-time change everywhere a
/// result is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationType {
    /// The source object could not be opened or streamed.
    ObjectReadable,
    /// A source object resolves (or is confirmed absent) in the target.
    SourceObjectExistsInTarget,
    /// A source datastream resolves (or is confirmed absent) in the target.
    SourceResourceExistsInTarget,
    /// Every binary resource under the target object has a source datastream.
    TargetResourceExistsInSource,
    /// A target tombstone agrees (or disagrees) with the source state.
    Deleted,
    /// Object property or datastream date equality.
    Metadata,
    /// Datastream mime type equality.
    BinaryMetadata,
    BinarySize,
    BinaryChecksum,
    BinaryVersionCount,
    BinaryHeadCount,
    RepositoryResourceCount,
}

impl ValidationType {
    /// All variants, in declaration order.
    pub const ALL: [ValidationType; 12] = [
        Self::ObjectReadable,
        Self::SourceObjectExistsInTarget,
        Self::SourceResourceExistsInTarget,
        Self::TargetResourceExistsInSource,
        Self::Deleted,
        Self::Metadata,
        Self::BinaryMetadata,
        Self::BinarySize,
        Self::BinaryChecksum,
        Self::BinaryVersionCount,
        Self::BinaryHeadCount,
        Self::RepositoryResourceCount,
    ];

    /// The wire name used in persisted result records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectReadable => "OBJECT_READABLE",
            Self::SourceObjectExistsInTarget => "SOURCE_OBJECT_EXISTS_IN_TARGET",
            Self::SourceResourceExistsInTarget => "SOURCE_RESOURCE_EXISTS_IN_TARGET",
            Self::TargetResourceExistsInSource => "TARGET_RESOURCE_EXISTS_IN_SOURCE",
            Self::Deleted => "DELETED",
            Self::Metadata => "METADATA",
            Self::BinaryMetadata => "BINARY_METADATA",
            Self::BinarySize => "BINARY_SIZE",
            Self::BinaryChecksum => "BINARY_CHECKSUM",
            Self::BinaryVersionCount => "BINARY_VERSION_COUNT",
            Self::BinaryHeadCount => "BINARY_HEAD_COUNT",
            Self::RepositoryResourceCount => "REPOSITORY_RESOURCE_COUNT",
        }
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownType(s.to_string()))
    }
}

/// Immutable record of one comparison outcome.
///
/// `index` is unique and strictly increasing within one object's validation
/// run (or within the repository-level run); it carries no meaning across
/// objects. Resource ids are present only at [`ValidationLevel::ObjectResource`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub index: u64,
    pub status: ResultStatus,
    pub level: ValidationLevel,
    #[serde(rename = "type")]
    pub validation_type: ValidationType,
    /// `None` only for repository-level results.
    pub source_object_id: Option<String>,
    pub target_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_resource_id: Option<String>,
    pub details: String,
}

impl ValidationResult {
    /// A repository-level result: no object or resource ids.
    pub fn repository(
        index: u64,
        status: ResultStatus,
        validation_type: ValidationType,
        details: impl Into<String>,
    ) -> Self {
        Self {
            index,
            status,
            level: ValidationLevel::Repository,
            validation_type,
            source_object_id: None,
            target_object_id: None,
            source_resource_id: None,
            target_resource_id: None,
            details: details.into(),
        }
    }

    /// An object-level result.
    pub fn object(
        index: u64,
        status: ResultStatus,
        validation_type: ValidationType,
        source_object_id: impl Into<String>,
        target_object_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            index,
            status,
            level: ValidationLevel::Object,
            validation_type,
            source_object_id: Some(source_object_id.into()),
            target_object_id: Some(target_object_id.into()),
            source_resource_id: None,
            target_resource_id: None,
            details: details.into(),
        }
    }

    /// A result about one resource inside an object.
    #[allow(clippy::too_many_arguments)]
    pub fn resource(
        index: u64,
        status: ResultStatus,
        validation_type: ValidationType,
        source_object_id: impl Into<String>,
        target_object_id: impl Into<String>,
        source_resource_id: impl Into<String>,
        target_resource_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            index,
            status,
            level: ValidationLevel::ObjectResource,
            validation_type,
            source_object_id: Some(source_object_id.into()),
            target_object_id: Some(target_object_id.into()),
            source_resource_id: Some(source_resource_id.into()),
            target_resource_id: Some(target_resource_id.into()),
            details: details.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn is_fail(&self) -> bool {
        self.status.is_fail()
    }

    /// Check that the id fields agree with the level.
    ///
    /// Used on read-back to reject records that were hand-edited or written
    /// by an incompatible version.
    pub fn check_shape(&self) -> Result<(), TypeError> {
        let missing = |field| TypeError::MissingField {
            index: self.index,
            field,
        };
        match self.level {
            ValidationLevel::Repository => Ok(()),
            ValidationLevel::Object => {
                self.source_object_id.as_ref().ok_or_else(|| missing("source_object_id"))?;
                Ok(())
            }
            ValidationLevel::ObjectResource => {
                self.source_object_id.as_ref().ok_or_else(|| missing("source_object_id"))?;
                self.source_resource_id.as_ref().ok_or_else(|| missing("source_resource_id"))?;
                Ok(())
            }
        }
    }

    /// Serialize as pretty JSON (the persisted record format).
    pub fn to_json(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Parse a persisted record.
    pub fn from_json(data: &[u8]) -> Result<Self, TypeError> {
        let result: Self =
            serde_json::from_slice(data).map_err(|e| TypeError::Serialization(e.to_string()))?;
        result.check_shape()?;
        Ok(result)
    }
}
