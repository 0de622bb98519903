//! Sharded file-per-result persistence for the migration validator.
//!
//! The result store is the only hand-off between validation (parallel,
//! write-heavy) and report generation (sequential, read-heavy). Each
//! [`ValidationResult`](migval_types::ValidationResult) becomes one small
//! JSON file; there is no shared index to lock.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   0.json                      repository-level results
//!   3fa/b21/9c0/ZGVtbzox/       SHA-256 prefix of the pid, then base64url(pid)
//!     0.json 1.json 2.json ...  one file per result, named by index
//! ```
//!
//! # Backends
//!
//! All writers implement the [`ResultSink`] trait:
//!
//! - [`ResultStore`] -- sharded directory tree on disk
//! - [`InMemoryResultSink`] -- `Vec`-based sink for tests and embedding
//!
//! # Design Rules
//!
//! 1. Results are written once per object run and never mutated.
//! 2. Writers for different objects never touch the same directory.
//! 3. Each file is written to a temp file and renamed into place, so a
//!    reader never sees a torn record.
//! 4. Order is recovered on read by sorting file names numerically.

pub mod error;
pub mod fs;
pub mod layout;
pub mod memory;
pub mod reader;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::ResultStore;
pub use layout::ResultLayout;
pub use memory::InMemoryResultSink;
pub use reader::{ResultStoreReader, StoreContents};
pub use traits::ResultSink;
