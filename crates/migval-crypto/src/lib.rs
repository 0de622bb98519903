//! Digest primitives for the migration validator.
//!
//! Provides streaming content digests in the algorithms a target store may
//! record, parsing of algorithm-qualified digest urns, and the hash used to
//! shard result files across directories.
//!
//! All crypto operations wrap established libraries -- no custom cryptography.

pub mod digest;
pub mod error;
pub mod shard;

pub use digest::{DigestAlgorithm, DigestUrn, Digester};
pub use error::{DigestError, DigestResult};
pub use shard::ShardHasher;
