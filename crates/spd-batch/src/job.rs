//! Batch job descriptions and per-job result records.

use serde::{Deserialize, Serialize};
use spd_core::{RunMode, SolutionFormat};
use std::path::PathBuf;

/// One dispatch solve within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub case_id: String,
    pub run_mode: RunMode,
    pub solution_format: SolutionFormat,
}

impl BatchJob {
    pub fn new(case_id: impl Into<String>) -> Self {
        BatchJob {
            case_id: case_id.into(),
            run_mode: RunMode::default(),
            solution_format: SolutionFormat::default(),
        }
    }
}

/// Result record for one job, written into the batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobRecord {
    pub case_id: String,
    /// "ok" or "error"
    pub status: String,
    pub detail: Option<String>,
    pub objective: Option<f64>,
    pub output_file: Option<PathBuf>,
}
