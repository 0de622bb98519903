//! Run orchestration for the migration validator.
//!
//! An [`ExecutionManager`] pulls object handles from a source, numbers them
//! in source order, and lets the [`ResumeManager`] decide for each one:
//!
//! - **admit** -- validate it on a worker
//! - **skip** -- an earlier run already covered it
//! - **halt** -- the per-run limit is reached
//!
//! At most `workers` objects are validated at once. The first failing task
//! stops admission; tasks already running finish normally.
//!
//! # Resuming
//!
//! The checkpoint file always names the last object of a gap-free prefix of
//! completed ordinals. A crash at any point loses at most the objects that
//! were in flight, and a resumed run re-validates exactly those.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod execution;
pub mod resume;

pub use checkpoint::{Checkpoint, CheckpointFile};
pub use config::RunConfig;
pub use error::{ConfigError, ResumeError, ResumeResult, RunError, RunResult};
pub use execution::{ExecutionManager, RunOutcome};
pub use resume::{Admission, ResumeManager, ResumeOptions, Ticket};
