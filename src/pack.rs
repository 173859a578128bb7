//! Feature packs resolved against the canonical feature table.
//!
//! A pack names features an application needs (`required`) and features it
//! uses when present (`optional`). Resolving a pack yields the features to
//! enable, the extensions they pull in and the lowest API version that
//! covers all of them. This is the same lookup the emitted metadata table
//! serves at run time, done ahead of time.
//!
//! Features emitted by a guarded variant exist only where the guard macro
//! is defined, so the caller states which guards its build defines.

use crate::canonical::CanonicalCatalog;
use crate::catalog::identity::{ApiVersion, CapabilityName, StructureName};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeatureInfo {
    pub structure: StructureName,
    pub min_version: ApiVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Guard macro of the variant that emitted the feature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct FeatureTable {
    features: BTreeMap<CapabilityName, FeatureInfo>,
}

impl FeatureTable {
    /// Build the table from canonical catalogs and their guards.
    pub fn from_catalogs<'a>(
        catalogs: impl IntoIterator<Item = (&'a CanonicalCatalog, Option<&'a str>)>,
    ) -> Self {
        let mut features = BTreeMap::new();
        for (catalog, guard) in catalogs {
            for (field, owner) in catalog.ownership.iter() {
                features.insert(
                    field.clone(),
                    FeatureInfo {
                        structure: owner.structure.clone(),
                        min_version: owner.origin.min_version(),
                        extension: owner.origin.extension().map(str::to_string),
                        guard: guard.map(str::to_string),
                    },
                );
            }
        }
        Self { features }
    }

    pub fn get(&self, field: &CapabilityName) -> Option<&FeatureInfo> {
        self.features.get(field)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturePack {
    #[serde(default)]
    pub required: Vec<CapabilityName>,
    #[serde(default)]
    pub optional: Vec<CapabilityName>,
}

impl FeaturePack {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading feature pack {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("parsing feature pack {}", path.display()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackResolution {
    /// Features to switch on, required first, in pack order.
    pub enabled: Vec<CapabilityName>,
    /// Optional features left off because the device lacks them or their
    /// guard is not defined.
    pub skipped: Vec<CapabilityName>,
    pub extensions: BTreeSet<String>,
    /// Guard macros the enabled features are compiled under.
    pub guards: BTreeSet<String>,
    pub min_version: ApiVersion,
}

/// Resolve `pack` against `table`, enabling optional features only when
/// they appear in `supported`. Features of a guarded variant count only
/// when their guard is in `defined`.
pub fn resolve_pack(
    table: &FeatureTable,
    pack: &FeaturePack,
    supported: &BTreeSet<CapabilityName>,
    defined: &BTreeSet<String>,
) -> Result<PackResolution> {
    let unknown: Vec<&str> = pack
        .required
        .iter()
        .chain(&pack.optional)
        .filter(|name| table.get(name).is_none())
        .map(CapabilityName::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("unknown features in pack: {}", unknown.join(", "));
    }

    let compiled_out = |name: &CapabilityName| {
        table
            .get(name)
            .and_then(|info| info.guard.as_deref())
            .filter(|guard| !defined.contains(*guard))
    };
    let missing: Vec<String> = pack
        .required
        .iter()
        .filter_map(|name| compiled_out(name).map(|guard| format!("{name} ({guard})")))
        .collect();
    if !missing.is_empty() {
        bail!(
            "required features need guards that are not defined: {}",
            missing.join(", ")
        );
    }

    let mut resolution = PackResolution {
        enabled: Vec::new(),
        skipped: Vec::new(),
        extensions: BTreeSet::new(),
        guards: BTreeSet::new(),
        min_version: ApiVersion::V1_0,
    };
    let mut seen = BTreeSet::new();
    let candidates = pack
        .required
        .iter()
        .map(|name| (name, false))
        .chain(pack.optional.iter().map(|name| (name, true)));
    for (name, optional) in candidates {
        if !seen.insert(name) {
            continue;
        }
        if optional && (!supported.contains(name) || compiled_out(name).is_some()) {
            resolution.skipped.push(name.clone());
            continue;
        }
        let Some(info) = table.get(name) else {
            continue;
        };
        resolution.enabled.push(name.clone());
        if let Some(extension) = &info.extension {
            resolution.extensions.insert(extension.clone());
        }
        if let Some(guard) = &info.guard {
            resolution.guards.insert(guard.clone());
        }
        resolution.min_version = resolution.min_version.max(info.min_version);
    }
    Ok(resolution)
}

/// Parse a JSON array of supported feature names.
pub fn load_supported(path: &Path) -> Result<BTreeSet<CapabilityName>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading supported features {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("parsing supported features {}", path.display()))
}
