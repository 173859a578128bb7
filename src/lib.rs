//! Shared library for the featuregen tools.
//!
//! The crate turns catalogs of extensible feature structures into C++ source:
//! a flat configuration record, a query routine, a device-creation routine
//! and a name-keyed metadata table. Public functions here form the contract
//! the binaries depend on: manifest discovery, atomic file writes and log
//! setup. The generator itself lives in `canonical`, `chain`, `emit` and
//! `pipeline`.

use anyhow::{Context, Result, bail};
use std::io::Write;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

pub mod canonical;
pub mod catalog;
pub mod chain;
pub mod emit;
pub mod manifest;
pub mod pack;
pub mod pipeline;
pub mod state;
pub mod upstream;

mod schema_loader;

pub use canonical::{CanonicalCatalog, DedupStrategy, Ownership, canonicalize};
pub use catalog::{
    ApiVersion, CapabilityName, CatalogError, CatalogIndex, CatalogKey, CatalogRepository,
    FeatureCatalog, Origin, StructureDecl, StructureName, StructureRoles,
};
pub use chain::{Chain, ChainBuilder, ChainEntry, Link, LinkState};
pub use emit::{Artifacts, Generator, Naming, OutputFiles};
pub use manifest::{MANIFEST_FILE, Manifest};
pub use pack::{FeaturePack, FeatureTable, PackResolution, resolve_pack};

const MANIFEST_ENV: &str = "FEATUREGEN_MANIFEST";
const LOG_ENV: &str = "FEATUREGEN_LOG";

fn manifest_in(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(MANIFEST_FILE);
    candidate.is_file().then_some(candidate)
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if let Some(found) = manifest_in(&dir) {
            return Some(found);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the manifest for this run.
///
/// Search order: an explicit path, then `FEATUREGEN_MANIFEST`, then the
/// nearest `featuregen.json` above the working directory, then the one
/// shipped next to the crate sources.
pub fn find_manifest(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("manifest not found: {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    if let Ok(hint) = env::var(MANIFEST_ENV) {
        if !hint.trim().is_empty() {
            let path = PathBuf::from(hint);
            if !path.is_file() {
                bail!("{MANIFEST_ENV} points at a missing file: {}", path.display());
            }
            return Ok(path);
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(found) = search_upwards(&cwd) {
            return Ok(found);
        }
    }

    if let Some(hint) = option_env!("FEATUREGEN_ROOT_HINT") {
        if let Some(found) = manifest_in(Path::new(hint)) {
            return Ok(found);
        }
    }

    bail!("unable to locate {MANIFEST_FILE}; pass --manifest or set {MANIFEST_ENV}")
}

/// Replace `path` with `contents` through a temporary file in the same
/// directory, so readers never see a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    file.write_all(contents)
        .with_context(|| format!("writing temporary file for {}", path.display()))?;
    file.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Install the stderr log subscriber; `FEATUREGEN_LOG` takes filter
/// directives and defaults to `info`.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // A subscriber may already be installed (tests, embedding tools).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn search_finds_the_nearest_manifest() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();
        fs::write(dir.path().join("a").join(MANIFEST_FILE), "{}").unwrap();

        let found = search_upwards(&nested).expect("manifest above");
        assert_eq!(
            found,
            fs::canonicalize(dir.path().join("a")).unwrap().join(MANIFEST_FILE)
        );
    }

    #[test]
    fn explicit_manifest_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        let err = find_manifest(Some(&missing)).expect_err("missing explicit path");
        assert!(err.to_string().contains("manifest not found"));

        let present = dir.path().join(MANIFEST_FILE);
        fs::write(&present, "{}").unwrap();
        assert_eq!(find_manifest(Some(&present)).unwrap(), present);
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("file.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
