use anyhow::{bail, Context, Result};
use clap::Parser;
use spd_batch::{run_batch, BatchJob, BatchRunnerConfig};
use spd_io::{CasefileStore, PatchOperation};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod run;

use cli::{Cli, Commands};
use run::{clean_user_input, run_model, UserInput, UserOptions};

fn main() -> Result<()> {
    let args = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("installing tracing subscriber")?;

    match args.command {
        Commands::Solve {
            input,
            case_id,
            store,
            run_mode,
            format,
            patch,
            output,
        } => {
            let store = store.map(CasefileStore::open);

            let user_input = match (input, case_id) {
                (Some(path), None) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("reading user input '{}'", path.display()))?;
                    clean_user_input(&raw)?
                }
                (None, Some(case_id)) => UserInput {
                    case_id: Some(case_id),
                    case_data: None,
                    patches: load_patches(&patch)?,
                    options: UserOptions {
                        run_mode: FromStr::from_str(&run_mode)?,
                        algorithm: Default::default(),
                        solution_format: FromStr::from_str(&format)?,
                    },
                },
                _ => bail!("supply exactly one of --input or --case-id"),
            };

            let solution = run_model(user_input, store.as_ref())?;
            let payload = serde_json::to_string_pretty(&solution)?;
            match output {
                Some(path) => {
                    fs::write(&path, payload)
                        .with_context(|| format!("writing solution '{}'", path.display()))?;
                    info!(path = %path.display(), "solution written");
                }
                None => println!("{payload}"),
            }
        }

        Commands::Batch {
            store,
            out,
            case_ids,
            threads,
        } => {
            let config = BatchRunnerConfig {
                jobs: case_ids.into_iter().map(BatchJob::new).collect(),
                store_dir: store,
                output_root: out,
                threads,
            };
            let summary = run_batch(&config)?;
            info!(
                success = summary.success,
                failure = summary.failure,
                manifest = %summary.manifest_path.display(),
                "batch complete"
            );
            if summary.failure > 0 {
                bail!("{} of {} jobs failed", summary.failure, summary.jobs.len());
            }
        }
    }

    Ok(())
}

fn load_patches(paths: &[PathBuf]) -> Result<Vec<PatchOperation>> {
    let mut patches = Vec::new();
    for path in paths {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading patch file '{}'", path.display()))?;
        let mut parsed: Vec<PatchOperation> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing patch file '{}'", path.display()))?;
        patches.append(&mut parsed);
    }
    Ok(patches)
}
