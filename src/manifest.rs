//! Generator manifest (`featuregen.json`).
//!
//! The manifest lists the header variants of one run in order, where each
//! variant's catalog comes from, and how the emitted source is named. Paths
//! are resolved against the manifest's own directory so a manifest can be
//! checked in next to the sources it produces.

use crate::canonical::DedupStrategy;
use crate::catalog::identity::is_identifier;
use crate::catalog::index::StructureRoles;
use crate::emit::{Naming, OutputFiles};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "featuregen.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub files: OutputFiles,
    #[serde(default)]
    pub naming: Naming,
    #[serde(default)]
    pub roles: StructureRoles,
    #[serde(default)]
    pub strategy: DedupStrategy,
    /// One-line file holding the structure linked last by the previous run.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Catalog schema to validate against instead of the bundled one.
    #[serde(default)]
    pub catalog_schema: Option<PathBuf>,
    pub variants: Vec<Variant>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// One header variant: a catalog file or a parser command that prints one.
pub struct Variant {
    pub name: String,
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub parser: Option<Vec<String>>,
    /// Preprocessor macro that must be defined for this variant's output.
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub mode: Option<WriteMode>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Start a fresh chain.
    Overwrite,
    /// Continue the chain left by the previous pass or run.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource<'a> {
    File(PathBuf),
    Parser(&'a [String]),
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".featuregen_prev")
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let mut manifest: Manifest = serde_json::from_str(&data)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        manifest.base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        manifest
            .validate()
            .with_context(|| format!("validating manifest {}", path.display()))?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            bail!("manifest lists no variants");
        }
        let mut names = BTreeSet::new();
        for (position, variant) in self.variants.iter().enumerate() {
            if variant.name.trim().is_empty() {
                bail!("variant {} has an empty name", position + 1);
            }
            if !names.insert(variant.name.as_str()) {
                bail!("variant '{}' listed more than once", variant.name);
            }
            self.source(variant)?;
            if let Some(guard) = &variant.guard {
                if !is_identifier(guard) {
                    bail!("variant '{}' has invalid guard macro '{guard}'", variant.name);
                }
            }
            if position > 0 && variant.mode == Some(WriteMode::Overwrite) {
                bail!(
                    "variant '{}' cannot overwrite; only the first variant starts the output",
                    variant.name
                );
            }
        }
        for name in [
            &self.files.header,
            &self.files.query,
            &self.files.create,
            &self.files.table,
        ] {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                bail!("output file name '{name}' must be a plain file name");
            }
        }
        Ok(())
    }

    /// Where `variant` gets its catalog; exactly one source must be set.
    pub fn source<'a>(&self, variant: &'a Variant) -> Result<CatalogSource<'a>> {
        match (&variant.catalog, &variant.parser) {
            (Some(_), Some(_)) => bail!(
                "variant '{}' sets both catalog and parser",
                variant.name
            ),
            (Some(path), None) => Ok(CatalogSource::File(self.resolve(path))),
            (None, Some(argv)) if argv.is_empty() => {
                bail!("variant '{}' has an empty parser command", variant.name)
            }
            (None, Some(argv)) => Ok(CatalogSource::Parser(argv)),
            (None, None) => bail!(
                "variant '{}' needs either a catalog or a parser",
                variant.name
            ),
        }
    }

    /// Whether the run continues the chain persisted by an earlier run.
    pub fn continues_previous_run(&self) -> bool {
        self.variants
            .first()
            .and_then(|variant| variant.mode)
            .is_some_and(|mode| mode == WriteMode::Append)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.state_file)
    }

    pub fn schema_path(&self) -> Option<PathBuf> {
        self.catalog_schema.as_deref().map(|path| self.resolve(path))
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, value: Value) -> PathBuf {
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
        path
    }

    #[test]
    fn defaults_and_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            json!({
                "variants": [
                    {"name": "vulkan_core", "catalog": "catalogs/vulkan_core.json"},
                    {"name": "vulkan_beta", "parser": ["python3", "genvk.py", "vulkan_beta.h"],
                     "guard": "VK_ENABLE_BETA_EXTENSIONS"}
                ]
            }),
        );
        let manifest = Manifest::load(&path).expect("manifest loads");
        assert_eq!(manifest.output_dir(), dir.path().join("generated"));
        assert_eq!(manifest.state_path(), dir.path().join(".featuregen_prev"));
        assert_eq!(manifest.files.header, "FeaturesConfig.h");
        assert_eq!(manifest.naming.record, "FeaturesConfig");
        assert_eq!(manifest.strategy, DedupStrategy::SkipList);
        assert!(!manifest.continues_previous_run());

        assert_eq!(
            manifest.source(&manifest.variants[0]).unwrap(),
            CatalogSource::File(dir.path().join("catalogs/vulkan_core.json"))
        );
        match manifest.source(&manifest.variants[1]).unwrap() {
            CatalogSource::Parser(argv) => assert_eq!(argv[1], "genvk.py"),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn rejects_ambiguous_or_missing_sources() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            json!({
                "variants": [
                    {"name": "vulkan_core", "catalog": "a.json", "parser": ["gen"]}
                ]
            }),
        );
        let err = Manifest::load(&path).expect_err("both sources must fail");
        assert!(format!("{err:#}").contains("both catalog and parser"));

        let path = write_manifest(&dir, json!({ "variants": [ {"name": "vulkan_core"} ] }));
        let err = Manifest::load(&path).expect_err("no source must fail");
        assert!(format!("{err:#}").contains("either a catalog or a parser"));
    }

    #[test]
    fn rejects_bad_guards_modes_and_duplicates() {
        let dir = TempDir::new().unwrap();
        let cases = [
            (
                json!({ "variants": [
                    {"name": "a", "catalog": "a.json", "guard": "not a macro"}
                ]}),
                "invalid guard",
            ),
            (
                json!({ "variants": [
                    {"name": "a", "catalog": "a.json"},
                    {"name": "b", "catalog": "b.json", "mode": "overwrite"}
                ]}),
                "cannot overwrite",
            ),
            (
                json!({ "variants": [
                    {"name": "a", "catalog": "a.json"},
                    {"name": "a", "catalog": "b.json"}
                ]}),
                "more than once",
            ),
            (json!({ "variants": [] }), "no variants"),
        ];
        for (value, expected) in cases {
            let path = write_manifest(&dir, value);
            let err = Manifest::load(&path).expect_err("invalid manifest must fail");
            assert!(
                format!("{err:#}").contains(expected),
                "expected '{expected}' in {err:#}"
            );
        }
    }

    #[test]
    fn append_on_first_variant_continues_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            json!({
                "state_file": "/tmp/featuregen-state",
                "roles": {
                    "workaround": {
                        "structure": "VkPhysicalDeviceMeshShaderFeaturesEXT",
                        "flag": "intelWorkaround"
                    }
                },
                "variants": [
                    {"name": "vulkan_beta", "catalog": "beta.json", "mode": "append"}
                ]
            }),
        );
        let manifest = Manifest::load(&path).expect("manifest loads");
        assert!(manifest.continues_previous_run());
        assert_eq!(manifest.state_path(), PathBuf::from("/tmp/featuregen-state"));
        assert_eq!(manifest.roles.wrapper.as_str(), "VkPhysicalDeviceFeatures2");
        assert_eq!(
            manifest.roles.workaround.as_ref().map(|w| w.flag.as_str()),
            Some("intelWorkaround")
        );
    }
}
