//! Batch runner: parallel dispatch solves over a casefile store.

use crate::job::{BatchJob, BatchJobRecord};
use crate::manifest::{write_batch_manifest, BatchManifest};
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use spd_io::CasefileStore;
use std::fs;
use std::path::PathBuf;

/// Batch configuration: where casefiles come from, where solutions go,
/// and how wide to fan out.
pub struct BatchRunnerConfig {
    pub jobs: Vec<BatchJob>,
    pub store_dir: PathBuf,
    pub output_root: PathBuf,
    /// 0 = use all available cores
    pub threads: usize,
}

/// Summary returned after the run so callers can log success/failure
/// counts and the manifest location.
pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

pub fn run_batch(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!(
            "creating batch output root '{}'",
            config.output_root.display()
        )
    })?;

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building rayon thread pool for batch runs")?;

    // Every job owns its casefile and model; this is a pure parallel map
    let job_records: Vec<BatchJobRecord> = pool.install(|| {
        config
            .jobs
            .par_iter()
            .map(|job| run_job(job, config))
            .collect()
    });

    let success = job_records
        .iter()
        .filter(|record| record.status == "ok")
        .count();
    let failure = job_records.len() - success;

    let manifest = BatchManifest {
        created_at: Utc::now(),
        num_jobs: job_records.len(),
        success,
        failure,
        jobs: job_records.clone(),
    };
    let manifest_path = config.output_root.join("batch_manifest.json");
    write_batch_manifest(&manifest_path, &manifest)?;

    Ok(BatchSummary {
        success,
        failure,
        manifest_path,
        jobs: job_records,
    })
}

/// Execute one job: load, extract, preprocess, solve, serialize.
fn run_job(job: &BatchJob, config: &BatchRunnerConfig) -> BatchJobRecord {
    let output_dir = config.output_root.join(&job.case_id);
    let output_file = output_dir.join("solution.json");

    let runner = || -> Result<f64> {
        let store = CasefileStore::open(&config.store_dir);
        let document = store.load(&job.case_id)?;
        let case = spd_io::extract_case(&document, job.run_mode)?;
        let pre = spd_solver::preprocess(&case)?;
        let solved = spd_solver::solve_case(&case, &pre)?;
        let solution = spd_solver::serialize_solution(&case, &solved, job.solution_format)?;

        fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating job directory '{}'", output_dir.display()))?;
        fs::write(&output_file, serde_json::to_string_pretty(&solution)?)
            .with_context(|| format!("writing solution '{}'", output_file.display()))?;
        Ok(solved.objective)
    };

    match runner() {
        Ok(objective) => BatchJobRecord {
            case_id: job.case_id.clone(),
            status: "ok".to_string(),
            detail: None,
            objective: Some(objective),
            output_file: Some(output_file),
        },
        Err(error) => {
            tracing::warn!(case_id = %job.case_id, %error, "batch job failed");
            BatchJobRecord {
                case_id: job.case_id.clone(),
                status: "error".to_string(),
                detail: Some(format!("{error:#}")),
                objective: None,
                output_file: None,
            }
        }
    }
}
