//! # spd-batch: parallel multi-case dispatch runs
//!
//! Fans independent dispatch solves across a rayon thread pool. Each job
//! owns its casefile, model and solver handle exclusively; there is no
//! shared mutable state, so a batch is just a parallel map over case IDs
//! followed by a manifest write.

pub mod job;
pub mod manifest;
pub mod runner;

pub use job::{BatchJob, BatchJobRecord};
pub use manifest::BatchManifest;
pub use runner::{run_batch, BatchRunnerConfig, BatchSummary};
