//! Comparison rule primitives.
//!
//! Each rule compares one aspect of a source object against what the target
//! recorded and returns a [`Check`]. Rules never return errors: a failure to
//! read or parse either side becomes a `FAIL` carrying the error text, so
//! one bad datastream cannot stop the rest of an object's validation.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use migval_crypto::{DigestAlgorithm, DigestUrn};
use migval_source::{Content, DatastreamVersion, ObjectState, PropertyName};
use migval_target::{Lookup, ResourceHeaders};
use migval_types::{ResultStatus, ValidationType};

/// The outcome of one rule, before it is numbered and attributed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Check {
    pub status: ResultStatus,
    pub validation_type: ValidationType,
    pub details: String,
}

impl Check {
    pub fn new(
        status: ResultStatus,
        validation_type: ValidationType,
        details: impl Into<String>,
    ) -> Self {
        Self {
            status,
            validation_type,
            details: details.into(),
        }
    }

    pub fn pass(validation_type: ValidationType, details: impl Into<String>) -> Self {
        Self::new(ResultStatus::Ok, validation_type, details)
    }

    pub fn fail(validation_type: ValidationType, details: impl Into<String>) -> Self {
        Self::new(ResultStatus::Fail, validation_type, details)
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a timestamp as an instant.
///
/// RFC 3339 with any offset is accepted, as is a bare `YYYY-MM-DDTHH:MM:SS`
/// with optional fraction, read as UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| format!("unparseable timestamp {value:?}: {e}"))
}

fn compare_instants(
    validation_type: ValidationType,
    what: &str,
    source: &str,
    target: Option<&str>,
) -> Check {
    let Some(target) = target else {
        return Check::fail(validation_type, format!("{what} not found in target"));
    };
    let parsed = parse_instant(source).and_then(|s| parse_instant(target).map(|t| (s, t)));
    match parsed {
        Ok((s, t)) if s == t => Check::pass(validation_type, format!("{what} matches: {source}")),
        Ok(_) => Check::fail(
            validation_type,
            format!("{what} mismatch: source={source} target={target}"),
        ),
        Err(e) => Check::fail(validation_type, format!("{what}: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Object properties
// ---------------------------------------------------------------------------

/// The target's value for a source property: a recorded header first, then
/// the embedded metadata graph.
pub fn resolve_target_property(name: PropertyName, target: &ResourceHeaders) -> Option<&str> {
    let header = match name {
        PropertyName::CreatedDate => target.created.as_deref(),
        PropertyName::LastModifiedDate => target.last_modified.as_deref(),
        PropertyName::Label | PropertyName::State | PropertyName::Owner => None,
    };
    header.or_else(|| target.triple_value(name.uri()))
}

/// Property equality. Dates compare as instants, state by meaning.
pub fn property_equality(name: PropertyName, source: &str, target: &ResourceHeaders) -> Check {
    const TYPE: ValidationType = ValidationType::Metadata;
    let what = name.to_string();
    if name.is_date() {
        return compare_instants(TYPE, &what, source, resolve_target_property(name, target));
    }
    let Some(value) = resolve_target_property(name, target) else {
        return Check::fail(TYPE, format!("{what} not found in target"));
    };
    let equal = match name {
        PropertyName::State => match (source.parse::<ObjectState>(), value.parse::<ObjectState>()) {
            (Ok(s), Ok(t)) => s == t,
            (Err(e), _) | (_, Err(e)) => return Check::fail(TYPE, format!("{what}: {e}")),
        },
        _ => source == value,
    };
    if equal {
        Check::pass(TYPE, format!("{what} matches: {source}"))
    } else {
        Check::fail(TYPE, format!("{what} mismatch: source={source} target={value}"))
    }
}

// ---------------------------------------------------------------------------
// Existence
// ---------------------------------------------------------------------------

/// Reconcile source deletion state with a target lookup.
///
/// A plain presence/absence outcome is reported as `exists_type`; a target
/// tombstone is reported as [`ValidationType::Deleted`].
pub fn existence<T>(
    exists_type: ValidationType,
    source_deleted: bool,
    target: &Lookup<T>,
) -> Check {
    match (source_deleted, target) {
        (true, Lookup::NotFound) => Check::pass(exists_type, "deleted in source, confirmed absent in target"),
        (true, Lookup::Found(_)) => Check::fail(exists_type, "deleted in source but present in target"),
        (true, Lookup::Tombstone) => Check::pass(ValidationType::Deleted, "deleted in source and in target"),
        (false, Lookup::Found(_)) => Check::pass(exists_type, "found in target"),
        (false, Lookup::NotFound) => Check::fail(exists_type, "not found in target"),
        (false, Lookup::Tombstone) => {
            Check::fail(ValidationType::Deleted, "active in source but deleted in target")
        }
    }
}

// ---------------------------------------------------------------------------
// Datastream versions
// ---------------------------------------------------------------------------

/// Version creation timestamp against the target's created header.
pub fn created_date(source: &DatastreamVersion, target: &ResourceHeaders) -> Check {
    compare_instants(
        ValidationType::Metadata,
        "created",
        &source.created,
        target.created.as_deref(),
    )
}

/// The target derives last-modified from resource creation, so the source
/// side is the version's own creation timestamp.
pub fn last_modified_date(source: &DatastreamVersion, target: &ResourceHeaders) -> Check {
    compare_instants(
        ValidationType::Metadata,
        "lastModified",
        &source.created,
        target.last_modified.as_deref(),
    )
}

/// Mime type, when the source declares one.
pub fn binary_metadata(source: &DatastreamVersion, target: &ResourceHeaders) -> Option<Check> {
    const TYPE: ValidationType = ValidationType::BinaryMetadata;
    let source_mime = source.mime_type.as_deref()?;
    Some(match target.mime_type.as_deref() {
        None => Check::fail(TYPE, "mime type not found in target"),
        Some(t) if t.eq_ignore_ascii_case(source_mime) => {
            Check::pass(TYPE, format!("mime type matches: {source_mime}"))
        }
        Some(t) => Check::fail(
            TYPE,
            format!("mime type mismatch: source={source_mime} target={t}"),
        ),
    })
}

/// Byte length against both the recorded content length and the file the
/// target keeps on disk.
pub fn binary_size(
    source: &DatastreamVersion,
    target: &ResourceHeaders,
    target_file: Option<&Path>,
) -> Check {
    const TYPE: ValidationType = ValidationType::BinarySize;
    let expected = match source.content.byte_len() {
        Ok(n) => n,
        Err(e) => return Check::fail(TYPE, format!("cannot measure source content: {e}")),
    };
    let Some(recorded) = target.content_length else {
        return Check::fail(TYPE, "content length not found in target");
    };
    if recorded != expected {
        return Check::fail(
            TYPE,
            format!("size mismatch: source={expected} target header={recorded}"),
        );
    }
    let Some(path) = target_file else {
        return Check::fail(TYPE, "content file not found in target");
    };
    match fs::metadata(path) {
        Ok(meta) if meta.len() == expected => Check::pass(TYPE, format!("size matches: {expected}")),
        Ok(meta) => Check::fail(
            TYPE,
            format!("size mismatch: source={expected} target file={}", meta.len()),
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Check::fail(
            TYPE,
            format!("content file {} not found in target", path.display()),
        ),
        Err(e) => Check::fail(TYPE, format!("cannot stat {}: {e}", path.display())),
    }
}

/// Source digest in `algorithm` against the target's recorded digest.
pub fn checksum(algorithm: DigestAlgorithm, source: &Content, target: &ResourceHeaders) -> Check {
    const TYPE: ValidationType = ValidationType::BinaryChecksum;
    let computed = source
        .open()
        .map_err(|e| e.to_string())
        .and_then(|reader| algorithm.hex_digest_reader(reader).map_err(|e| e.to_string()));
    let source_hex = match computed {
        Ok(hex) => hex,
        Err(e) => return Check::fail(TYPE, format!("cannot digest source content: {e}")),
    };
    let Some(urn) = DigestUrn::find(&target.digests, algorithm) else {
        return Check::fail(
            TYPE,
            format!("{} digest not found in target", algorithm.urn_name()),
        );
    };
    if urn.matches_hex(&source_hex) {
        Check::pass(TYPE, urn.to_string())
    } else {
        Check::fail(
            TYPE,
            format!("checksum mismatch: source=urn:{}:{source_hex} target={urn}", algorithm.urn_name()),
        )
    }
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Stored version count of one resource.
pub fn version_count(expected: usize, actual: usize) -> Check {
    const TYPE: ValidationType = ValidationType::BinaryVersionCount;
    if expected == actual {
        Check::pass(TYPE, format!("{actual} version(s)"))
    } else {
        Check::fail(
            TYPE,
            format!("version count mismatch: expected={expected} target={actual}"),
        )
    }
}

/// Live source datastreams against binary resources under the target object.
pub fn binary_head_count(source: usize, target: usize) -> Check {
    const TYPE: ValidationType = ValidationType::BinaryHeadCount;
    if source == target {
        Check::pass(TYPE, format!("{source} binary resource(s)"))
    } else {
        Check::fail(
            TYPE,
            format!("binary count mismatch: source={source} target={target}"),
        )
    }
}

/// Target binary resources whose name is not a source datastream id.
///
/// Returns the target resource id with a `FAIL` for each, or a single
/// unattributed `OK` when every target resource is accounted for.
pub fn unmatched_target_resources(
    source_names: &BTreeSet<String>,
    target: &[ResourceHeaders],
) -> Result<Check, Vec<(String, Check)>> {
    const TYPE: ValidationType = ValidationType::TargetResourceExistsInSource;
    let unmatched: Vec<(String, Check)> = target
        .iter()
        .filter(|h| h.is_binary() && !source_names.contains(h.name()))
        .map(|h| (h.id.clone(), Check::fail(TYPE, "target resource not found in source")))
        .collect();
    if unmatched.is_empty() {
        Ok(Check::pass(
            TYPE,
            format!("all {} target resource(s) found in source", target.len()),
        ))
    } else {
        Err(unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migval_target::{ResourceKind, Triple};

    fn version(created: &str, mime: Option<&str>, text: &str) -> DatastreamVersion {
        DatastreamVersion {
            id: "DS1.0".into(),
            label: None,
            mime_type: mime.map(str::to_string),
            created: created.into(),
            content: Content::Inline { text: text.into() },
        }
    }

    fn headers() -> ResourceHeaders {
        ResourceHeaders::new("info:fedora/demo:1/DS1", ResourceKind::Binary)
    }

    #[test]
    fn instants_tolerate_formatting() {
        let a = parse_instant("2020-01-01T00:00:00Z").unwrap();
        assert_eq!(parse_instant("2020-01-01T00:00:00.000Z").unwrap(), a);
        assert_eq!(parse_instant("2020-01-01T01:00:00+01:00").unwrap(), a);
        assert_eq!(parse_instant("2020-01-01T00:00:00").unwrap(), a);
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn property_resolution_prefers_header_then_graph() {
        let mut h = headers();
        h.created = Some("2020-01-01T00:00:00Z".into());
        h.triples.push(Triple::new(
            &h.id,
            PropertyName::CreatedDate.uri(),
            "1999-01-01T00:00:00Z",
        ));
        h.triples.push(Triple::new(&h.id, PropertyName::Label.uri(), "Demo"));
        assert_eq!(
            resolve_target_property(PropertyName::CreatedDate, &h),
            Some("2020-01-01T00:00:00Z")
        );
        assert_eq!(resolve_target_property(PropertyName::Label, &h), Some("Demo"));
        assert_eq!(resolve_target_property(PropertyName::Owner, &h), None);
    }

    #[test]
    fn property_equality_outcomes() {
        let mut h = headers();
        h.triples.push(Triple::new(&h.id, PropertyName::Label.uri(), "Demo"));
        h.triples.push(Triple::new(&h.id, PropertyName::State.uri(), "Active"));
        h.last_modified = Some("2020-01-01T00:00:00.000Z".into());

        assert!(property_equality(PropertyName::Label, "Demo", &h).is_ok());
        assert!(!property_equality(PropertyName::Label, "Other", &h).is_ok());
        assert!(property_equality(PropertyName::State, "A", &h).is_ok());
        assert!(property_equality(PropertyName::LastModifiedDate, "2020-01-01T00:00:00Z", &h).is_ok());

        let missing = property_equality(PropertyName::Owner, "admin", &h);
        assert!(!missing.is_ok());
        assert!(missing.details.contains("not found"));

        let garbage = property_equality(PropertyName::LastModifiedDate, "soon", &h);
        assert!(!garbage.is_ok());
        assert!(garbage.details.contains("unparseable"));
    }

    #[test]
    fn existence_matrix() {
        let ty = ValidationType::SourceObjectExistsInTarget;
        let found: Lookup<()> = Lookup::Found(());
        let check = existence(ty, true, &Lookup::<()>::NotFound);
        assert!(check.is_ok());
        assert_eq!(check.validation_type, ty);
        assert!(!existence(ty, true, &found).is_ok());
        assert!(existence(ty, false, &found).is_ok());
        assert!(!existence(ty, false, &Lookup::<()>::NotFound).is_ok());

        let tomb = existence(ty, true, &Lookup::<()>::Tombstone);
        assert!(tomb.is_ok());
        assert_eq!(tomb.validation_type, ValidationType::Deleted);
        let tomb = existence(ty, false, &Lookup::<()>::Tombstone);
        assert!(!tomb.is_ok());
        assert_eq!(tomb.validation_type, ValidationType::Deleted);
    }

    #[test]
    fn version_dates() {
        let v = version("2020-01-01T00:00:00Z", None, "x");
        let mut h = headers();
        assert!(!created_date(&v, &h).is_ok());
        h.created = Some("2020-01-01T00:00:00.000Z".into());
        h.last_modified = Some("2020-01-02T00:00:00Z".into());
        assert!(created_date(&v, &h).is_ok());
        assert!(!last_modified_date(&v, &h).is_ok());
    }

    #[test]
    fn mime_type_is_optional_on_source() {
        let mut h = headers();
        assert!(binary_metadata(&version("2020-01-01T00:00:00Z", None, ""), &h).is_none());
        let v = version("2020-01-01T00:00:00Z", Some("text/plain"), "");
        assert!(!binary_metadata(&v, &h).unwrap().is_ok());
        h.mime_type = Some("TEXT/PLAIN".into());
        assert!(binary_metadata(&v, &h).unwrap().is_ok());
    }

    #[test]
    fn size_checks_header_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("0.bin");
        fs::write(&file, b"hello").unwrap();
        let v = version("2020-01-01T00:00:00Z", None, "hello");
        let mut h = headers();

        assert!(binary_size(&v, &h, Some(&file)).details.contains("not found"));
        h.content_length = Some(5);
        assert!(binary_size(&v, &h, Some(&file)).is_ok());
        assert!(!binary_size(&v, &h, None).is_ok());

        let missing = binary_size(&v, &h, Some(&dir.path().join("gone.bin")));
        assert!(!missing.is_ok());
        assert!(missing.details.contains("not found"));

        fs::write(&file, b"hello world").unwrap();
        assert!(!binary_size(&v, &h, Some(&file)).is_ok());
        h.content_length = Some(4);
        assert!(!binary_size(&v, &h, Some(&file)).is_ok());
    }

    #[test]
    fn checksum_outcomes() {
        let alg = DigestAlgorithm::Sha256;
        let content = Content::Inline { text: "abc".into() };
        let mut h = headers();
        let absent = checksum(alg, &content, &h);
        assert!(absent.details.contains("not found"));

        h.digests.push(DigestUrn::new(DigestAlgorithm::Sha512, "00").to_string());
        assert!(!checksum(alg, &content, &h).is_ok());

        h.digests.push(DigestUrn::new(alg, alg.hex_digest(b"abc")).to_string());
        assert!(checksum(alg, &content, &h).is_ok());

        let other = Content::Inline { text: "abd".into() };
        let mismatch = checksum(alg, &other, &h);
        assert!(!mismatch.is_ok());
        assert!(mismatch.details.contains("mismatch"));

        let unreadable = Content::Url { url: "http://example.org/x".into() };
        assert!(checksum(alg, &unreadable, &h).details.contains("cannot digest"));
    }

    #[test]
    fn counts() {
        assert!(version_count(2, 2).is_ok());
        assert!(!version_count(1, 3).is_ok());
        assert!(binary_head_count(4, 4).is_ok());
        assert!(!binary_head_count(4, 3).is_ok());
    }

    #[test]
    fn unmatched_resources_fail_individually() {
        let names: BTreeSet<String> = ["DS1".to_string()].into();
        let ds1 = ResourceHeaders::new("info:fedora/demo:1/DS1", ResourceKind::Binary);
        let extra = ResourceHeaders::new("info:fedora/demo:1/EXTRA", ResourceKind::Binary);
        assert!(unmatched_target_resources(&names, std::slice::from_ref(&ds1)).is_ok());
        let failures = unmatched_target_resources(&names, &[ds1, extra]).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "info:fedora/demo:1/EXTRA");
    }
}
