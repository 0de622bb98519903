//! Target object store access for the migration validator.
//!
//! The validator reads the migrated repository through three traits:
//!
//! - [`SessionFactory`] -- opens one [`TargetSession`] per target object;
//!   shared by all workers and safe for concurrent use
//! - [`TargetSession`] -- headers, content, and version listings for the
//!   resources of one object
//! - [`TargetRepository`] -- whole-repository queries (object listing)
//!
//! Every lookup is tri-state ([`Lookup`]): a resource is found, was deleted
//! and left a tombstone, or never existed. "Not found" is an ordinary
//! outcome, not an error.
//!
//! [`LocalTargetStore`] implements all three over a directory tree, and
//! [`LocalTargetWriter`] populates one.

pub mod error;
pub mod ids;
pub mod local;
pub mod model;
pub mod traits;
pub mod writer;

pub use error::{TargetError, TargetResult};
pub use ids::{resource_id, version_id, ResourceRef};
pub use local::{LocalSession, LocalTargetStore};
pub use model::{Lookup, ResourceHeaders, ResourceKind, TargetVersion, Triple};
pub use traits::{SessionFactory, TargetRepository, TargetSession};
pub use writer::LocalTargetWriter;
