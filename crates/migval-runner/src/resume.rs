use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{error, info};

use crate::checkpoint::{Checkpoint, CheckpointFile};
use crate::error::{ResumeError, ResumeResult};

/// What to do with the object just pulled from the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Validate it.
    Admit,
    /// Already validated by an earlier run; release it unvalidated.
    Skip,
    /// The per-run limit is reached; admit nothing further.
    HaltLimit,
}

/// An ordinal and the decision taken for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub ordinal: u64,
    pub admission: Admission,
}

/// How a [`ResumeManager`] treats earlier runs.
#[derive(Clone, Debug)]
pub struct ResumeOptions {
    pub file: PathBuf,
    /// Continue from the stored checkpoint instead of starting over.
    pub resume: bool,
    /// With `resume`, validate objects below the checkpoint anyway.
    pub accept_all: bool,
    /// Maximum number of objects admitted in this run.
    pub limit: Option<u64>,
}

struct AdmissionState {
    /// Last ordinal handed out.
    ordinal: u64,
    admitted: u64,
    in_flight: BTreeSet<(u64, String)>,
    /// Finished, but a lower ordinal is still in flight.
    finished: BTreeMap<u64, String>,
    checkpoint: Option<Checkpoint>,
}

/// Ordinal-based admission and crash-safe checkpointing.
///
/// Every object pulled from the source gets the next ordinal. The persisted
/// checkpoint only ever names an ordinal whose predecessors have all
/// finished: a completion writes the checkpoint only if it was the smallest
/// ordinal still in flight, and then advances over every successor that
/// had already finished. All state, including the checkpoint file, is
/// mutated under one lock.
pub struct ResumeManager {
    file: CheckpointFile,
    /// Checkpoint found at startup when resuming.
    prior: Option<Checkpoint>,
    accept_all: bool,
    limit: Option<u64>,
    state: Mutex<AdmissionState>,
}

impl ResumeManager {
    /// Load the checkpoint when resuming, or clear it for a fresh run.
    pub fn open(options: ResumeOptions) -> ResumeResult<Self> {
        let file = CheckpointFile::new(options.file);
        let prior = if options.resume {
            let prior = file.load()?;
            match &prior {
                Some(c) => info!(ordinal = c.ordinal, pid = %c.pid, "resuming after checkpoint"),
                None => info!("no checkpoint found, starting from the beginning"),
            }
            prior
        } else {
            file.clear()?;
            None
        };
        Ok(Self {
            file,
            prior: prior.clone(),
            accept_all: options.accept_all,
            limit: options.limit,
            state: Mutex::new(AdmissionState {
                ordinal: 0,
                admitted: 0,
                in_flight: BTreeSet::new(),
                finished: BTreeMap::new(),
                checkpoint: prior,
            }),
        })
    }

    /// Assign the next ordinal to `pid` and decide whether to admit it.
    ///
    /// Fails when the object at the checkpoint ordinal is not the recorded
    /// one; the run must not continue.
    pub fn accept(&self, pid: &str) -> ResumeResult<Ticket> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.ordinal += 1;
        let ordinal = state.ordinal;
        let ticket = |admission| Ticket { ordinal, admission };

        if let (Some(prior), false) = (&self.prior, self.accept_all) {
            if ordinal < prior.ordinal {
                return Ok(ticket(Admission::Skip));
            }
            if ordinal == prior.ordinal {
                if prior.pid != pid {
                    error!(ordinal, expected = %prior.pid, found = pid, "object sequence changed since checkpoint");
                    return Err(ResumeError::SequenceMismatch {
                        ordinal,
                        expected: prior.pid.clone(),
                        found: pid.to_string(),
                    });
                }
                return Ok(ticket(Admission::Skip));
            }
        }

        if let Some(limit) = self.limit {
            if state.admitted >= limit {
                return Ok(ticket(Admission::HaltLimit));
            }
        }
        state.admitted += 1;
        state.in_flight.insert((ordinal, pid.to_string()));
        Ok(ticket(Admission::Admit))
    }

    /// Record that the task for `ordinal` finished, successfully or not.
    pub fn complete(&self, ordinal: u64, pid: &str) -> ResumeResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        let was_min = state.in_flight.first().map(|(o, _)| *o) == Some(ordinal);
        if !state.in_flight.remove(&(ordinal, pid.to_string())) {
            return Ok(());
        }
        state.finished.insert(ordinal, pid.to_string());
        if !was_min {
            return Ok(());
        }

        let bound = state.in_flight.first().map(|(o, _)| *o);
        let mut advanced = None;
        while let Some(entry) = state.finished.first_entry() {
            if bound.is_some_and(|b| *entry.key() > b) {
                break;
            }
            advanced = Some(entry.remove_entry());
        }
        if let Some((ordinal, pid)) = advanced {
            let checkpoint = Checkpoint::new(ordinal, pid);
            self.file.store(&checkpoint)?;
            state.checkpoint = Some(checkpoint);
        }
        Ok(())
    }

    /// The checkpoint as last persisted (or loaded).
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.state.lock().expect("lock poisoned").checkpoint.clone()
    }

    pub fn admitted(&self) -> u64 {
        self.state.lock().expect("lock poisoned").admitted
    }
}

impl fmt::Debug for ResumeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeManager")
            .field("file", &self.file.path())
            .field("prior", &self.prior)
            .field("accept_all", &self.accept_all)
            .field("limit", &self.limit)
            .finish()
    }
}
