//! C++ source emission.
//!
//! `Generator` owns the four artifact emitters and the bookkeeping that spans
//! passes: fields claimed so far, structures already linked, the umbrella
//! and the workaround site. Each pass is fed through `emit_structure`, the
//! single per-structure routine, so the record, the query chain, the create
//! chain and the metadata table stay in lock-step with the chain order.
//!
//! Passes are glued together at run time through a `chainTail` local: every
//! section ends by pointing it at its last structure, and the next section
//! (or the wrapper root) links to it. A guarded section that is compiled
//! out simply leaves `chainTail` untouched.

pub mod create;
pub mod fields;
pub mod query;
pub mod table;

use crate::canonical::{CanonicalCatalog, CanonicalFeature, Umbrella};
use crate::catalog::error::CatalogError;
use crate::catalog::identity::{ApiVersion, CapabilityName, CatalogKey, Origin, StructureName};
use crate::catalog::index::StructureRoles;
use crate::chain::{Chain, Link, LinkState};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub use create::CreateEmitter;
pub use fields::FieldEmitter;
pub use query::QueryEmitter;
pub use table::TableEmitter;

pub const GENERATED_BANNER: &str = "// Auto-generated by featuregen, do not modify";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Identifiers used in the emitted source.
pub struct Naming {
    pub record: String,
    pub query_fn: String,
    pub create_fn: String,
    /// Header that declares the API types and entry points.
    pub api_header: String,
    pub table_type: String,
    pub table_name: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            record: "FeaturesConfig".to_string(),
            query_fn: "GetPhysicalDeviceFeatures".to_string(),
            create_fn: "CreateDevice".to_string(),
            api_header: "Vulkan.h".to_string(),
            table_type: "FeatureData".to_string(),
            table_name: "featuresConfigMap".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// File names of the four artifacts, relative to the output directory.
pub struct OutputFiles {
    pub header: String,
    pub query: String,
    pub create: String,
    pub table: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            header: "FeaturesConfig.h".to_string(),
            query: "GetPhysicalDeviceFeatures.cpp".to_string(),
            create: "CreateDevice.cpp".to_string(),
            table: "FeaturesConfigMap.h".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifacts {
    pub header: String,
    pub query: String,
    pub create: String,
    pub table: String,
}

impl Artifacts {
    /// Artifact contents paired with their file names.
    pub fn files<'a>(&'a self, files: &'a OutputFiles) -> [(&'a str, &'a str); 4] {
        [
            (files.header.as_str(), self.header.as_str()),
            (files.query.as_str(), self.query.as_str()),
            (files.create.as_str(), self.create.as_str()),
            (files.table.as_str(), self.table.as_str()),
        ]
    }
}

/// One variant's worth of input to the generator.
pub struct Pass<'a> {
    pub catalog: &'a CanonicalCatalog,
    pub chain: &'a Chain,
    pub guard: Option<&'a str>,
}

/// A structure as the emitters see it.
pub struct Site<'a> {
    pub ty: &'a StructureName,
    pub var: String,
    pub s_type: String,
    /// Expression stored in the structure's `pNext`.
    pub next: String,
    pub origin: &'a Origin,
    pub features: &'a [CanonicalFeature],
}

/// The wrapper root that heads the API-facing chain.
pub struct Root {
    pub ty: StructureName,
    pub var: String,
    pub s_type: String,
    pub nested_field: String,
    pub origin: Origin,
    pub features: Vec<CanonicalFeature>,
}

pub struct WorkaroundSite {
    pub var: String,
    pub flag: String,
    pub guard: Option<String>,
}

/// Everything the emitters need once all passes are in.
pub struct Frame<'a> {
    pub naming: &'a Naming,
    pub files: &'a OutputFiles,
    pub root: Root,
    /// Run-time flag parameter, when a workaround role is configured.
    pub flag: Option<&'a str>,
    pub workaround: Option<&'a WorkaroundSite>,
    /// Predecessor inherited from a previous run; its address arrives as a
    /// `chainTail` parameter instead of a local.
    pub carried_in: Option<&'a StructureName>,
}

impl Frame<'_> {
    fn extra_params(&self) -> String {
        let mut params = String::new();
        if let Some(flag) = self.flag {
            params.push_str(&format!(", const bool {flag}"));
        }
        if self.carried_in.is_some() {
            params.push_str(", void* chainTail");
        }
        params
    }

    pub fn query_signature(&self) -> String {
        format!(
            "void {}( const VkPhysicalDevice physicalDevice, {}& cfg{} )",
            self.naming.query_fn,
            self.naming.record,
            self.extra_params()
        )
    }

    pub fn create_signature(&self) -> String {
        format!(
            "VkResult {}( const VkPhysicalDevice physicalDevice, VkDeviceCreateInfo& deviceInfo, \
             const VkAllocationCallbacks* allocator, VkDevice* device, const {}& cfg{} )",
            self.naming.create_fn,
            self.naming.record,
            self.extra_params()
        )
    }

    /// Opening of a routine body that walks the chain.
    pub fn chain_prologue(&self) -> &'static str {
        if self.carried_in.is_some() {
            ""
        } else {
            "\tvoid* chainTail = nullptr;\n\n"
        }
    }
}

/// Shared surface of the four emitters.
pub trait SectionEmitter {
    /// Start a pass; guarded passes open a conditional block.
    fn open(&mut self, guard: Option<&str>) -> fmt::Result;
    fn structure(&mut self, site: &Site<'_>) -> fmt::Result;
    /// End a pass whose last structure is reached through `tail`.
    fn close(&mut self, guard: Option<&str>, tail: &str) -> fmt::Result;
}

pub struct Generator<'a> {
    naming: &'a Naming,
    files: &'a OutputFiles,
    roles: &'a StructureRoles,
    carried_in: Option<StructureName>,
    fields: FieldEmitter,
    query: QueryEmitter,
    create: CreateEmitter,
    table: TableEmitter,
    claimed: BTreeMap<CapabilityName, StructureName>,
    visited: BTreeSet<StructureName>,
    umbrella: Option<(CatalogKey, Umbrella)>,
    workaround: Option<WorkaroundSite>,
}

impl<'a> Generator<'a> {
    /// Start a run whose first pass continues from `initial`.
    pub fn new(
        naming: &'a Naming,
        files: &'a OutputFiles,
        roles: &'a StructureRoles,
        initial: &LinkState,
    ) -> Self {
        Self {
            naming,
            files,
            roles,
            carried_in: initial.prev.clone(),
            fields: FieldEmitter::default(),
            query: QueryEmitter::default(),
            create: CreateEmitter::default(),
            table: TableEmitter::default(),
            claimed: BTreeMap::new(),
            visited: BTreeSet::new(),
            umbrella: None,
            workaround: None,
        }
    }

    pub fn emit_pass(&mut self, pass: &Pass<'_>) -> Result<()> {
        if let Some(umbrella) = &pass.catalog.umbrella {
            self.take_umbrella(pass, umbrella)?;
        }
        if pass.chain.is_empty() {
            return Ok(());
        }

        self.open(pass.guard)?;
        let mut tail = String::new();
        for entry in &pass.chain.entries {
            // The carried structure already sits behind `chainTail`.
            if self.carried_in.as_ref() == Some(&entry.structure) {
                return Err(CatalogError::CyclicPredecessor {
                    structure: entry.structure.clone(),
                }
                .into());
            }
            if !self.visited.insert(entry.structure.clone()) {
                return Err(CatalogError::RepeatedChainEntry {
                    structure: entry.structure.clone(),
                }
                .into());
            }
            let structure = pass.catalog.structure(&entry.structure).ok_or_else(|| {
                anyhow!(
                    "chain entry {} is not part of catalog {}",
                    entry.structure,
                    pass.catalog.edition
                )
            })?;
            self.claim(&structure.name, &structure.features)?;

            let var = variable_name(&structure.name);
            let next = match &entry.link {
                Link::Head => "nullptr".to_string(),
                Link::Carried(_) => "chainTail".to_string(),
                Link::Local(prev) => match (entry.detachable, &self.workaround) {
                    (true, Some(site)) => detached_link(site),
                    _ => format!("&{}", variable_name(prev)),
                },
            };
            let site = Site {
                ty: &structure.name,
                var,
                s_type: structure
                    .s_type
                    .clone()
                    .unwrap_or_else(|| structure_type_constant(&structure.name)),
                next,
                origin: &structure.origin,
                features: &structure.features,
            };
            self.emit_structure(&site)?;

            tail = format!("&{}", site.var);
            if pass.chain.workaround.as_ref() == Some(&structure.name) {
                if let Some(role) = &self.roles.workaround {
                    let workaround = WorkaroundSite {
                        var: site.var.clone(),
                        flag: role.flag.clone(),
                        guard: pass.guard.map(str::to_string),
                    };
                    // Only entry of its pass: whatever links to it next
                    // must be able to skip it.
                    if pass.chain.entries.len() == 1 {
                        tail = detached_link(&workaround);
                    }
                    self.workaround = Some(workaround);
                }
            }
        }
        self.close(pass.guard, &tail)?;
        Ok(())
    }

    /// Feed one structure to every emitter.
    fn emit_structure(&mut self, site: &Site<'_>) -> fmt::Result {
        self.fields.structure(site)?;
        self.query.structure(site)?;
        self.create.structure(site)?;
        self.table.structure(site)
    }

    fn open(&mut self, guard: Option<&str>) -> fmt::Result {
        self.fields.open(guard)?;
        self.query.open(guard)?;
        self.create.open(guard)?;
        self.table.open(guard)
    }

    fn close(&mut self, guard: Option<&str>, tail: &str) -> fmt::Result {
        self.fields.close(guard, tail)?;
        self.query.close(guard, tail)?;
        self.create.close(guard, tail)?;
        self.table.close(guard, tail)
    }

    fn take_umbrella(&mut self, pass: &Pass<'_>, umbrella: &Umbrella) -> Result<()> {
        let edition = &pass.catalog.edition;
        if pass.guard.is_some() {
            return Err(CatalogError::UmbrellaInGuardedVariant {
                structure: umbrella.wrapper.clone(),
                edition: edition.clone(),
            }
            .into());
        }
        if let Some((first, _)) = &self.umbrella {
            return Err(CatalogError::DuplicateUmbrella {
                structure: umbrella.wrapper.clone(),
                first: first.clone(),
                second: edition.clone(),
            }
            .into());
        }
        self.claim(&umbrella.wrapper, &umbrella.features)?;
        self.umbrella = Some((edition.clone(), umbrella.clone()));
        Ok(())
    }

    fn claim(&mut self, owner: &StructureName, features: &[CanonicalFeature]) -> Result<()> {
        for feature in features {
            if let Some(first) = self.claimed.get(&feature.field) {
                return Err(CatalogError::DuplicateField {
                    capability: feature.field.clone(),
                    first: first.clone(),
                    second: owner.clone(),
                }
                .into());
            }
            self.claimed.insert(feature.field.clone(), owner.clone());
        }
        Ok(())
    }

    /// Render the four artifacts, appending the umbrella root last.
    pub fn finish(self) -> Result<Artifacts> {
        let root = match &self.umbrella {
            Some((_, umbrella)) => Root {
                ty: umbrella.wrapper.clone(),
                var: variable_name(&umbrella.wrapper),
                s_type: umbrella
                    .wrapper_s_type
                    .clone()
                    .unwrap_or_else(|| structure_type_constant(&umbrella.wrapper)),
                nested_field: umbrella.nested_field.clone(),
                origin: umbrella.origin.clone(),
                features: umbrella.features.clone(),
            },
            None => Root {
                ty: self.roles.wrapper.clone(),
                var: variable_name(&self.roles.wrapper),
                s_type: structure_type_constant(&self.roles.wrapper),
                nested_field: self.roles.wrapper_field.clone(),
                origin: Origin::Version(ApiVersion::V1_0),
                features: Vec::new(),
            },
        };
        let frame = Frame {
            naming: self.naming,
            files: self.files,
            root,
            flag: self.roles.workaround.as_ref().map(|role| role.flag.as_str()),
            workaround: self.workaround.as_ref(),
            carried_in: self.carried_in.as_ref(),
        };

        Ok(Artifacts {
            header: self.fields.finish(&frame)?,
            query: self.query.finish(&frame)?,
            create: self.create.finish(&frame)?,
            table: self.table.finish(&frame)?,
        })
    }
}

fn detached_link(site: &WorkaroundSite) -> String {
    format!("{} ? {}.pNext : &{}", site.flag, site.var, site.var)
}

/// Local variable name for a structure: `VkPhysicalDeviceFoo` becomes
/// `physicalDeviceFoo`.
pub fn variable_name(structure: &StructureName) -> String {
    let bare = structure.as_str();
    let bare = bare.strip_prefix("Vk").unwrap_or(bare);
    let mut chars = bare.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Structure-type constant derived from the structure name.
///
/// Covers the regular spellings (`VkPhysicalDeviceFeatures2` becomes
/// `VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_FEATURES_2`); catalogs carry an
/// explicit `s_type` for the rest.
pub fn structure_type_constant(structure: &StructureName) -> String {
    let bare = structure.as_str();
    let bare = bare.strip_prefix("Vk").unwrap_or(bare);
    let mut words = upper_snake(bare);
    if let Some(at) = words.find("VULKAN") {
        let digits: Vec<char> = words[at + 6..].chars().take(2).collect();
        if digits.len() == 2 && digits.iter().all(char::is_ascii_digit) {
            words.replace_range(
                at + 6..at + 8,
                &format!("_{}_{}", digits[0], digits[1]),
            );
        }
    }
    format!("VK_STRUCTURE_TYPE_{words}")
}

/// `FeaturesConfigMap` becomes `FEATURES_CONFIG_MAP`; a trailing number is
/// split off as its own word.
pub fn upper_snake(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let trailing_digits = chars
        .iter()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let digits_start = chars.len() - trailing_digits;

    let mut out = String::with_capacity(ident.len() + 8);
    for (at, c) in chars.iter().enumerate() {
        if at > 0 {
            let prev = chars[at - 1];
            let word_break = (c.is_ascii_uppercase() && (prev.is_ascii_lowercase() || prev.is_ascii_digit()))
                || (at == digits_start && prev.is_ascii_alphabetic());
            if word_break && !out.ends_with('_') {
                out.push('_');
            }
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push('_');
        }
    }
    out
}

/// Include guard for a header file name.
pub fn include_guard(file: &str) -> String {
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    format!("{}_H", upper_snake(stem))
}

/// `{ major, minor, patch }` initializer for a version.
pub fn version_triple(version: ApiVersion) -> String {
    format!("{{ {}, {}, {} }}", version.major, version.minor, version.patch)
}
