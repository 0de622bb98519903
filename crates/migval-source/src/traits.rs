use std::collections::VecDeque;

use crate::error::SourceResult;
use crate::object::{Datastream, ObjectInfo, SourceObject};

/// A finite, single-pass sequence of legacy objects.
pub trait ObjectSource: Send {
    /// Pull the next object handle, or `None` once the source is exhausted.
    ///
    /// Handles are cheap: nothing is opened until [`ObjectHandle::open`].
    fn next_object(&mut self) -> Option<SourceResult<Box<dyn ObjectHandle>>>;
}

impl<S: ObjectSource + ?Sized> ObjectSource for Box<S> {
    fn next_object(&mut self) -> Option<SourceResult<Box<dyn ObjectHandle>>> {
        (**self).next_object()
    }
}

/// An identified legacy object that has not necessarily been opened yet.
///
/// Every handle must be closed after use, whether or not it was opened.
/// Closing twice is a no-op.
pub trait ObjectHandle: Send {
    fn pid(&self) -> &str;

    /// Materialize the object for reading.
    fn open(&mut self) -> SourceResult<Box<dyn ObjectReader>>;

    /// Release whatever the handle holds.
    fn close(&mut self);
}

/// Streams an opened object: properties first, then datastreams in order.
pub trait ObjectReader: Send {
    fn object_info(&mut self) -> SourceResult<ObjectInfo>;

    /// The next datastream, or `None` when all have been read.
    fn next_datastream(&mut self) -> SourceResult<Option<Datastream>>;
}

/// An [`ObjectReader`] over an already materialized [`SourceObject`].
#[derive(Debug)]
pub struct BufferedReader {
    info: ObjectInfo,
    datastreams: VecDeque<Datastream>,
}

impl BufferedReader {
    pub fn new(object: SourceObject) -> Self {
        Self {
            info: object.info,
            datastreams: object.datastreams.into(),
        }
    }
}

impl ObjectReader for BufferedReader {
    fn object_info(&mut self) -> SourceResult<ObjectInfo> {
        Ok(self.info.clone())
    }

    fn next_datastream(&mut self) -> SourceResult<Option<Datastream>> {
        Ok(self.datastreams.pop_front())
    }
}
