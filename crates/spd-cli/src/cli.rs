//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spd", author, version, about = "NEM dispatch-interval solver")]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve a single dispatch interval
    Solve {
        /// User-input document (JSON). Mutually exclusive with --case-id
        #[arg(long, conflicts_with = "case_id")]
        input: Option<PathBuf>,

        /// Case ID to load from the casefile store
        #[arg(long, requires = "store")]
        case_id: Option<String>,

        /// Directory holding casefiles (json/xml/zip, named by case ID)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Run mode: physical or pricing
        #[arg(long, default_value = "physical")]
        run_mode: String,

        /// Solution format: standard or validation
        #[arg(long, default_value = "standard")]
        format: String,

        /// Patch file(s) with {path, value} records, applied in order
        #[arg(long)]
        patch: Vec<PathBuf>,

        /// Write the solution here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Solve many cases in parallel
    Batch {
        /// Directory holding casefiles
        #[arg(long)]
        store: PathBuf,

        /// Output directory (one subdirectory per case)
        #[arg(long)]
        out: PathBuf,

        /// Case IDs to solve
        #[arg(long, required = true, num_args = 1..)]
        case_ids: Vec<String>,

        /// Worker threads (0 = all cores)
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}
