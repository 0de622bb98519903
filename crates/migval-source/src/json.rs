use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::object::SourceObject;
use crate::traits::{BufferedReader, ObjectHandle, ObjectReader, ObjectSource};

/// Extension of export files.
pub const EXPORT_EXTENSION: &str = "json";

/// Object source over a directory of JSON exports, one file per object.
///
/// File names are the percent-encoded pid (`demo%3A1.json`). Files are
/// listed once at construction and served sorted by name, so the object
/// order is stable across runs over the same directory. Relative content
/// paths inside an export resolve against the export directory.
#[derive(Debug)]
pub struct JsonExportSource {
    dir: PathBuf,
    files: std::vec::IntoIter<(String, PathBuf)>,
}

impl JsonExportSource {
    pub fn open(dir: impl Into<PathBuf>) -> SourceResult<Self> {
        let dir = dir.into();
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXPORT_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let pid = decode_pid(stem).ok_or_else(|| SourceError::Malformed {
                path: path.clone(),
                reason: "file name is not a valid percent-encoded pid".into(),
            })?;
            files.push((pid, path));
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        debug!(dir = %dir.display(), objects = files.len(), "export directory listed");
        Ok(Self {
            dir,
            files: files.into_iter(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Objects not yet pulled.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl ObjectSource for JsonExportSource {
    fn next_object(&mut self) -> Option<SourceResult<Box<dyn ObjectHandle>>> {
        let (pid, path) = self.files.next()?;
        Some(Ok(Box::new(JsonHandle {
            pid,
            path,
            base: self.dir.clone(),
            closed: false,
        })))
    }
}

struct JsonHandle {
    pid: String,
    path: PathBuf,
    base: PathBuf,
    closed: bool,
}

impl ObjectHandle for JsonHandle {
    fn pid(&self) -> &str {
        &self.pid
    }

    fn open(&mut self) -> SourceResult<Box<dyn ObjectReader>> {
        if self.closed {
            return Err(SourceError::Closed(self.pid.clone()));
        }
        let data = fs::read(&self.path)?;
        let mut object: SourceObject =
            serde_json::from_slice(&data).map_err(|e| SourceError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        if object.pid() != self.pid {
            return Err(SourceError::PidMismatch {
                listed: self.pid.clone(),
                found: object.pid().to_string(),
            });
        }
        for datastream in &mut object.datastreams {
            for version in &mut datastream.versions {
                version.content = version.content.clone().resolve(&self.base);
            }
        }
        Ok(Box::new(BufferedReader::new(object)))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Percent-encode a pid for use as an export file stem.
///
/// Alphanumerics and `-`, `_`, `.`, `~` pass through; everything else
/// becomes `%XX`.
pub fn encode_pid(pid: &str) -> String {
    urlencoding::encode(pid).into_owned()
}

/// Decode a percent-encoded file stem back into a pid.
///
/// Only canonical stems, as produced by [`encode_pid`], are accepted.
pub fn decode_pid(stem: &str) -> Option<String> {
    let pid = urlencoding::decode(stem).ok()?;
    if pid.is_empty() || urlencoding::encode(&pid) != stem {
        return None;
    }
    Some(pid.into_owned())
}
