use std::collections::HashSet;

use tracing::trace;

use crate::error::SourceResult;
use crate::traits::{ObjectHandle, ObjectSource};

/// Restricts a source to an explicit set of pids.
///
/// Handles for other pids are closed unopened and never surface. Pids in
/// the set that the source never yields are simply absent from the run.
pub struct PidFilter<S> {
    inner: S,
    pids: HashSet<String>,
    passed_over: u64,
}

impl<S: ObjectSource> PidFilter<S> {
    pub fn new(inner: S, pids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            inner,
            pids: pids.into_iter().map(Into::into).collect(),
            passed_over: 0,
        }
    }

    /// Handles dropped because their pid was not selected.
    pub fn passed_over(&self) -> u64 {
        self.passed_over
    }
}

impl<S: ObjectSource> ObjectSource for PidFilter<S> {
    fn next_object(&mut self) -> Option<SourceResult<Box<dyn ObjectHandle>>> {
        loop {
            match self.inner.next_object()? {
                Ok(handle) if self.pids.contains(handle.pid()) => return Some(Ok(handle)),
                Ok(mut handle) => {
                    trace!(pid = handle.pid(), "not selected");
                    handle.close();
                    self.passed_over += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
