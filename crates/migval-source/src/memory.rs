use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{SourceError, SourceResult};
use crate::object::{Datastream, ObjectInfo, SourceObject};
use crate::traits::{BufferedReader, ObjectHandle, ObjectReader, ObjectSource};

/// Counters shared by every handle a [`MemorySource`] hands out.
#[derive(Debug, Default)]
pub struct HandleStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    open_now: AtomicUsize,
    peak_open: AtomicUsize,
}

impl HandleStats {
    /// Handles opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles closed so far (opened or not).
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open handles observed.
    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    fn on_open(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_open.fetch_max(now, Ordering::SeqCst);
    }

    fn on_close(&self, was_open: bool) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if was_open {
            self.open_now.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Fault {
    /// `open` fails.
    Open,
    /// Streaming fails after this many datastreams.
    StreamAfter(usize),
}

/// In-memory object source.
///
/// Intended for tests and embedding. Objects are served in insertion order.
/// Faults can be injected per pid to exercise the unreadable-object paths.
#[derive(Default)]
pub struct MemorySource {
    objects: VecDeque<SourceObject>,
    faults: HashMap<String, Fault>,
    stats: Arc<HandleStats>,
}

impl MemorySource {
    pub fn new(objects: impl IntoIterator<Item = SourceObject>) -> Self {
        Self {
            objects: objects.into_iter().collect(),
            faults: HashMap::new(),
            stats: Arc::new(HandleStats::default()),
        }
    }

    /// Make `open` fail for `pid`.
    pub fn with_unreadable(mut self, pid: impl Into<String>) -> Self {
        self.faults.insert(pid.into(), Fault::Open);
        self
    }

    /// Make streaming `pid` fail after `after` datastreams were read.
    pub fn with_broken_stream(mut self, pid: impl Into<String>, after: usize) -> Self {
        self.faults.insert(pid.into(), Fault::StreamAfter(after));
        self
    }

    /// Shared handle counters.
    pub fn stats(&self) -> Arc<HandleStats> {
        Arc::clone(&self.stats)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectSource for MemorySource {
    fn next_object(&mut self) -> Option<SourceResult<Box<dyn ObjectHandle>>> {
        let object = self.objects.pop_front()?;
        let fault = self.faults.get(object.pid()).copied();
        Some(Ok(Box::new(MemoryHandle {
            pid: object.pid().to_string(),
            object: Some(object),
            fault,
            is_open: false,
            closed: false,
            stats: Arc::clone(&self.stats),
        })))
    }
}

struct MemoryHandle {
    pid: String,
    object: Option<SourceObject>,
    fault: Option<Fault>,
    is_open: bool,
    closed: bool,
    stats: Arc<HandleStats>,
}

impl ObjectHandle for MemoryHandle {
    fn pid(&self) -> &str {
        &self.pid
    }

    fn open(&mut self) -> SourceResult<Box<dyn ObjectReader>> {
        if self.closed {
            return Err(SourceError::Closed(self.pid.clone()));
        }
        if let Some(Fault::Open) = self.fault {
            return Err(SourceError::Unreadable {
                pid: self.pid.clone(),
                reason: "injected open failure".into(),
            });
        }
        let object = self
            .object
            .take()
            .ok_or_else(|| SourceError::Closed(self.pid.clone()))?;
        if !self.is_open {
            self.is_open = true;
            self.stats.on_open();
        }
        let reader = BufferedReader::new(object);
        Ok(match self.fault {
            Some(Fault::StreamAfter(after)) => Box::new(FailingReader {
                inner: reader,
                remaining: after,
            }),
            _ => Box::new(reader),
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.object = None;
        self.stats.on_close(self.is_open);
    }
}

/// Reader that errors once `remaining` datastreams have been served.
struct FailingReader {
    inner: BufferedReader,
    remaining: usize,
}

impl ObjectReader for FailingReader {
    fn object_info(&mut self) -> SourceResult<ObjectInfo> {
        self.inner.object_info()
    }

    fn next_datastream(&mut self) -> SourceResult<Option<Datastream>> {
        if self.remaining == 0 {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "injected stream failure",
            )));
        }
        self.remaining -= 1;
        self.inner.next_datastream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &mut MemorySource) -> Vec<Box<dyn ObjectHandle>> {
        let mut handles = Vec::new();
        while let Some(h) = source.next_object() {
            handles.push(h.unwrap());
        }
        handles
    }

    #[test]
    fn serves_objects_in_order() {
        let mut source = MemorySource::new(vec![SourceObject::new("a"), SourceObject::new("b")]);
        let pids: Vec<String> = drain(&mut source).iter().map(|h| h.pid().to_string()).collect();
        assert_eq!(pids, vec!["a", "b"]);
        assert!(source.next_object().is_none());
    }

    #[test]
    fn stats_track_open_and_close() {
        let mut source = MemorySource::new(vec![SourceObject::new("a"), SourceObject::new("b")]);
        let stats = source.stats();
        let mut handles = drain(&mut source);
        handles[0].open().unwrap();
        handles[1].open().unwrap();
        assert_eq!(stats.peak_open(), 2);
        handles[0].close();
        handles[0].close();
        handles[1].close();
        assert_eq!(stats.opened(), 2);
        assert_eq!(stats.closed(), 2);
    }

    #[test]
    fn closed_handle_cannot_open() {
        let mut source = MemorySource::new(vec![SourceObject::new("a")]);
        let mut h = source.next_object().unwrap().unwrap();
        h.close();
        assert!(matches!(h.open(), Err(SourceError::Closed(_))));
    }

    #[test]
    fn injected_open_failure() {
        let mut source = MemorySource::new(vec![SourceObject::new("a")]).with_unreadable("a");
        let mut h = source.next_object().unwrap().unwrap();
        assert!(matches!(h.open(), Err(SourceError::Unreadable { .. })));
    }

    #[test]
    fn injected_stream_failure() {
        let mut source =
            MemorySource::new(vec![SourceObject::new("a")]).with_broken_stream("a", 0);
        let mut h = source.next_object().unwrap().unwrap();
        let mut reader = h.open().unwrap();
        assert!(reader.object_info().is_ok());
        assert!(reader.next_datastream().is_err());
    }
}
