//! One generator run, end to end.
//!
//! Every variant is loaded and validated before anything else happens, so a
//! failing parser or a bad catalog leaves the previous artifacts alone. The
//! four artifacts are rendered in memory, staged as temporary files in the
//! output directory and only then persisted over the old ones. The state
//! file is written last.

use crate::canonical::{CanonicalCatalog, Ownership, canonicalize};
use crate::catalog::error::CatalogError;
use crate::catalog::identity::{CapabilityName, CatalogKey, StructureName};
use crate::catalog::index::{CatalogIndex, CatalogSchema};
use crate::catalog::repository::CatalogRepository;
use crate::chain::{Chain, ChainBuilder, LinkState};
use crate::emit::{Artifacts, Generator, Pass};
use crate::manifest::{CatalogSource, Manifest};
use crate::state::{read_state, write_state};
use crate::upstream::run_parser;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Canonical catalog and chain of one variant.
pub struct VariantPass {
    pub name: String,
    pub guard: Option<String>,
    pub canonical: CanonicalCatalog,
    pub chain: Chain,
}

/// Everything decided before rendering.
pub struct Plan {
    pub initial: LinkState,
    pub passes: Vec<VariantPass>,
    pub final_state: LinkState,
}

#[derive(Debug)]
pub struct GenerateReport {
    pub written: Vec<PathBuf>,
    pub state_file: PathBuf,
    pub final_state: LinkState,
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub variants: Vec<VariantSummary>,
    pub final_state: Option<StructureName>,
}

#[derive(Debug, Serialize)]
pub struct VariantSummary {
    pub name: String,
    pub edition: CatalogKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    pub structures: BTreeMap<StructureName, Vec<CapabilityName>>,
    pub chain: Vec<StructureName>,
    pub dropped: Vec<StructureName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umbrella: Option<StructureName>,
    pub ownership: Ownership,
}

/// Load the catalog schema named by the manifest, or the bundled one.
pub fn load_schema(manifest: &Manifest) -> Result<CatalogSchema> {
    match manifest.schema_path() {
        Some(path) => CatalogSchema::load(&path),
        None => CatalogSchema::bundled(),
    }
}

/// Load and validate every variant's catalog, in manifest order.
pub fn load_catalogs(manifest: &Manifest, schema: &CatalogSchema) -> Result<CatalogRepository> {
    let mut repository = CatalogRepository::default();
    for variant in &manifest.variants {
        let index = match manifest.source(variant)? {
            CatalogSource::File(path) => CatalogIndex::load(&path, schema, &manifest.roles),
            CatalogSource::Parser(argv) => {
                let document = run_parser(argv, manifest.base_dir())
                    .with_context(|| format!("running parser for variant {}", variant.name))?;
                CatalogIndex::from_document(
                    document,
                    &format!("catalog printed for {}", variant.name),
                    schema,
                    &manifest.roles,
                )
            }
        }
        .with_context(|| format!("loading variant {}", variant.name))?;
        debug!(
            variant = %variant.name,
            edition = %index.key(),
            structures = index.structures().len(),
            "catalog loaded"
        );
        repository.register(index)?;
    }
    Ok(repository)
}

/// Initial chain state: the persisted one when the first variant appends.
pub fn initial_state(manifest: &Manifest) -> Result<LinkState> {
    if manifest.continues_previous_run() {
        read_state(&manifest.state_path())
    } else {
        Ok(LinkState::head())
    }
}

/// Canonicalize and chain every variant, threading the link state.
pub fn plan(
    manifest: &Manifest,
    repository: &CatalogRepository,
    initial: LinkState,
) -> Result<Plan> {
    let builder = ChainBuilder::new(&manifest.roles);
    let mut state = initial.clone();
    let mut passes = Vec::with_capacity(manifest.variants.len());
    for (variant, index) in manifest.variants.iter().zip(repository.iter()) {
        let canonical = canonicalize(index, &manifest.roles, manifest.strategy);
        if let Some(prev) = &initial.prev {
            if canonical.structure(prev).is_some() {
                return Err(CatalogError::CyclicPredecessor {
                    structure: prev.clone(),
                })
                .with_context(|| format!("chaining variant {}", variant.name));
            }
        }
        if canonical.structures.is_empty() && canonical.umbrella.is_none() {
            warn!(variant = %variant.name, "variant contributes no structures");
        }
        let (chain, next) = builder
            .build(&canonical, state)
            .with_context(|| format!("chaining variant {}", variant.name))?;
        info!(
            variant = %variant.name,
            structures = canonical.structures.len(),
            dropped = canonical.dropped.len(),
            links = chain.links(),
            "variant canonicalized"
        );
        state = next;
        passes.push(VariantPass {
            name: variant.name.clone(),
            guard: variant.guard.clone(),
            canonical,
            chain,
        });
    }
    Ok(Plan {
        initial,
        passes,
        final_state: state,
    })
}

/// Render the four artifacts for a plan.
pub fn render(manifest: &Manifest, plan: &Plan) -> Result<Artifacts> {
    let mut generator = Generator::new(
        &manifest.naming,
        &manifest.files,
        &manifest.roles,
        &plan.initial,
    );
    for pass in &plan.passes {
        generator
            .emit_pass(&Pass {
                catalog: &pass.canonical,
                chain: &pass.chain,
                guard: pass.guard.as_deref(),
            })
            .with_context(|| format!("emitting variant {}", pass.name))?;
    }
    generator.finish()
}

/// Write all artifacts, then the state file.
pub fn commit(manifest: &Manifest, artifacts: &Artifacts, state: &LinkState) -> Result<GenerateReport> {
    let out_dir = manifest.output_dir();
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut staged = Vec::new();
    for (name, contents) in artifacts.files(&manifest.files) {
        let mut file = NamedTempFile::new_in(&out_dir)
            .with_context(|| format!("staging {name} in {}", out_dir.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("staging {name}"))?;
        staged.push((file, out_dir.join(name)));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (file, target) in staged {
        file.persist(&target)
            .map_err(|err| err.error)
            .with_context(|| format!("writing {}", target.display()))?;
        info!(path = %target.display(), "artifact written");
        written.push(target);
    }

    let state_file = manifest.state_path();
    write_state(&state_file, state)?;
    Ok(GenerateReport {
        written,
        state_file,
        final_state: state.clone(),
    })
}

/// Load every variant and plan the run without rendering.
pub fn prepare(manifest: &Manifest) -> Result<Plan> {
    let schema = load_schema(manifest)?;
    let initial = initial_state(manifest)?;
    let repository = load_catalogs(manifest, &schema)?;
    plan(manifest, &repository, initial)
}

/// Full run: load, plan, render, commit.
pub fn generate(manifest: &Manifest) -> Result<GenerateReport> {
    let plan = prepare(manifest)?;
    let artifacts = render(manifest, &plan)?;
    commit(manifest, &artifacts, &plan.final_state)
}

/// Load, plan and render without writing anything; summarize the result.
pub fn check(manifest: &Manifest) -> Result<CheckReport> {
    let plan = prepare(manifest)?;
    render(manifest, &plan)?;

    let variants = plan
        .passes
        .iter()
        .map(|pass| VariantSummary {
            name: pass.name.clone(),
            edition: pass.canonical.edition.clone(),
            guard: pass.guard.clone(),
            structures: pass
                .canonical
                .structures
                .iter()
                .map(|structure| {
                    (
                        structure.name.clone(),
                        structure.features.iter().map(|f| f.field.clone()).collect(),
                    )
                })
                .collect(),
            chain: pass.chain.order().cloned().collect(),
            dropped: pass.canonical.dropped.clone(),
            umbrella: pass
                .canonical
                .umbrella
                .as_ref()
                .map(|umbrella| umbrella.wrapper.clone()),
            ownership: pass.canonical.ownership.clone(),
        })
        .collect();
    Ok(CheckReport {
        variants,
        final_state: plan.final_state.prev,
    })
}
