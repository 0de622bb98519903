//! Legacy object source for the migration validator.
//!
//! The validator consumes source objects through three small traits:
//!
//! - [`ObjectSource`] -- a finite, single-pass sequence of object handles
//! - [`ObjectHandle`] -- a cheap, identified handle; opening it materializes
//!   the object and it must be closed after use
//! - [`ObjectReader`] -- streams an opened object's properties, then its
//!   datastreams one at a time
//!
//! # Sources
//!
//! - [`JsonExportSource`] -- one JSON export file per object in a directory
//! - [`MemorySource`] -- in-memory objects for tests and embedding
//! - [`PidFilter`] -- restricts any source to a subset of pids

pub mod error;
pub mod filter;
pub mod json;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{SourceError, SourceResult};
pub use filter::PidFilter;
pub use json::JsonExportSource;
pub use memory::{HandleStats, MemorySource};
pub use object::{
    Content, ControlGroup, Datastream, DatastreamVersion, ObjectInfo, ObjectProperty,
    ObjectState, PropertyName, SourceObject,
};
pub use traits::{BufferedReader, ObjectHandle, ObjectReader, ObjectSource};
