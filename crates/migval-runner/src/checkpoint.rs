use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResumeError, ResumeResult};

/// The last object of a complete, gap-free prefix of the object sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// 1-based position in the source sequence.
    pub ordinal: u64,
    pub pid: String,
}

impl Checkpoint {
    pub fn new(ordinal: u64, pid: impl Into<String>) -> Self {
        Self {
            ordinal,
            pid: pid.into(),
        }
    }

    fn crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.ordinal.to_le_bytes());
        hasher.update(self.pid.as_bytes());
        hasher.finalize()
    }
}

/// On-disk form: the checkpoint plus a CRC32 over its fields.
#[derive(Serialize, Deserialize)]
struct CheckpointRecord {
    ordinal: u64,
    pid: String,
    crc32: u32,
}

/// A single overwritten checkpoint record.
///
/// Writes go to a temporary file in the same directory that is then renamed
/// over the old record, so a crash leaves either the old or the new
/// checkpoint, never a torn one.
#[derive(Clone, Debug)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint, if one was ever written.
    pub fn load(&self) -> ResumeResult<Option<Checkpoint>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: CheckpointRecord =
            serde_json::from_slice(&data).map_err(|e| self.corrupt(e.to_string()))?;
        let checkpoint = Checkpoint::new(record.ordinal, record.pid);
        if checkpoint.crc() != record.crc32 {
            return Err(self.corrupt("checksum mismatch".into()));
        }
        Ok(Some(checkpoint))
    }

    /// Atomically replace the checkpoint.
    pub fn store(&self, checkpoint: &Checkpoint) -> ResumeResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let data = serde_json::to_vec(&CheckpointRecord {
            ordinal: checkpoint.ordinal,
            pid: checkpoint.pid.clone(),
            crc32: checkpoint.crc(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_data()?;
        tmp.persist(&self.path)?;
        debug!(ordinal = checkpoint.ordinal, pid = %checkpoint.pid, "checkpoint written");
        Ok(())
    }

    /// Remove the checkpoint so the next run starts fresh.
    pub fn clear(&self) -> ResumeResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, reason: String) -> ResumeError {
        ResumeError::CorruptCheckpoint {
            path: self.path.clone(),
            reason,
        }
    }
}
