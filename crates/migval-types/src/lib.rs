//! Foundation types for the migration validator.
//!
//! This crate provides the record types shared by the validation path
//! (which produces results) and the report path (which reads them back).
//! Every other `migval` crate depends on `migval-types`.
//!
//! # Key Types
//!
//! - [`ValidationResult`] -- Immutable record of one comparison outcome
//! - [`ResultStatus`] -- `OK` or `FAIL`
//! - [`ValidationLevel`] -- Repository, object, or object-resource scope
//! - [`ValidationType`] -- Which rule produced the result
//! - [`ObjectValidationResultSet`] -- All results for one source object

pub mod error;
pub mod result;
pub mod result_set;

pub use error::TypeError;
pub use result::{ResultStatus, ValidationLevel, ValidationResult, ValidationType};
pub use result_set::ObjectValidationResultSet;
