//! The comparison engine of the migration validator.
//!
//! One [`ObjectValidator`] call takes a source object handle, opens a
//! target session for the derived target id, and runs the configured
//! [`Strategy`] over it:
//!
//! 1. existence of the object in the target (or its confirmed absence)
//! 2. object properties
//! 3. per datastream: existence, version count, and per-version checks
//!    (dates, mime type, size and checksum of managed content)
//! 4. binary head count and target resources unknown to the source
//!
//! The checks themselves live in [`rules`] as pure functions; strategies
//! only decide which source versions meet which target resources.

pub mod comparison;
pub mod config;
pub mod error;
pub mod fixture;
pub mod index;
pub mod repository;
pub mod rules;
pub mod validator;

pub use comparison::{ComparisonEngine, ObjectComparison};
pub use config::{Strategy, ValidationConfig};
pub use error::{EngineError, EngineResult};
pub use index::IndexCounter;
pub use repository::repository_resource_count;
pub use validator::ObjectValidator;
