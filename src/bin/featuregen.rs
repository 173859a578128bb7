//! Generate the feature record, query/create routines and metadata table.
//!
//! Usage:
//!   featuregen [--manifest featuregen.json] [generate]
//!   featuregen --manifest featuregen.json check

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use featuregen::{Manifest, find_manifest, init_logging, pipeline};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "featuregen")]
#[command(about = "Generate feature-structure source from API catalogs")]
struct Cli {
    /// Manifest to use instead of the discovered featuregen.json.
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every variant and write the four artifacts plus the state file.
    Generate,
    /// Load and canonicalize every variant; print a JSON summary, write nothing.
    Check,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let manifest_path = find_manifest(cli.manifest.as_deref())?;
    let manifest = Manifest::load(&manifest_path)?;
    info!(manifest = %manifest_path.display(), variants = manifest.variants.len(), "manifest loaded");

    match cli.command.unwrap_or(Command::Generate) {
        Command::Generate => {
            let report = pipeline::generate(&manifest)?;
            for path in &report.written {
                println!("{}", path.display());
            }
            info!(
                state_file = %report.state_file.display(),
                prev = ?report.final_state.prev,
                "run complete"
            );
        }
        Command::Check => {
            let report = pipeline::check(&manifest)?;
            let rendered =
                serde_json::to_string_pretty(&report).context("serializing check report")?;
            println!("{rendered}");
        }
    }
    Ok(())
}
