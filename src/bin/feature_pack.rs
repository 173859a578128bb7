//! Resolve a feature pack against the manifest's canonical feature table.
//!
//! Usage:
//!   feature-pack --pack packs/minimal.json [--supported supported.json]
//!                [--define VK_ENABLE_BETA_EXTENSIONS]...
//!
//! Prints the enabled features, the extensions and guard macros they need
//! and the minimum API version as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use featuregen::pack::{FeaturePack, FeatureTable, load_supported, resolve_pack};
use featuregen::{Manifest, find_manifest, init_logging, pipeline};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "feature-pack")]
#[command(about = "Resolve required and optional features into an enable list")]
struct Cli {
    /// Manifest to use instead of the discovered featuregen.json.
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// JSON file with `required` and `optional` feature lists.
    #[arg(long)]
    pack: PathBuf,
    /// JSON array of features the device reports; optional features outside
    /// it stay off.
    #[arg(long)]
    supported: Option<PathBuf>,
    /// Guard macro defined by the build; features of guarded variants need it.
    #[arg(long = "define", value_name = "MACRO")]
    defines: Vec<String>,
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
    let manifest = Manifest::load(&find_manifest(cli.manifest.as_deref())?)?;
    let plan = pipeline::prepare(&manifest)?;
    let table = FeatureTable::from_catalogs(
        plan.passes
            .iter()
            .map(|pass| (&pass.canonical, pass.guard.as_deref())),
    );

    let pack = FeaturePack::load(&cli.pack)?;
    let supported = match &cli.supported {
        Some(path) => load_supported(path)?,
        None => BTreeSet::new(),
    };
    let defined: BTreeSet<String> = cli.defines.iter().cloned().collect();
    let resolution = resolve_pack(&table, &pack, &supported, &defined)
        .with_context(|| format!("resolving pack {}", cli.pack.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&resolution).context("serializing pack resolution")?
    );
    Ok(())
}
