//! Validated, indexed view of one catalog edition.
//!
//! The index enforces the catalog schema version and the ownership rules the
//! generator relies on, then records every capability declaration with its
//! final field name. It is strict about duplicates so the emitters never see
//! a catalog that would produce a record with clashing fields.

use crate::catalog::error::CatalogError;
use crate::catalog::identity::{CapabilityName, CatalogKey, Origin, StructureName};
use crate::catalog::model::{FeatureCatalog, StructureDecl};
use crate::schema_loader::{
    SchemaLoadOptions, bundled_schema_path, load_json_schema, validate_document,
};
use anyhow::{Context, Result, bail};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

// Only one catalog layout exists.
const DEFAULT_SCHEMA_VERSION: &str = "feature_catalog_v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Which structures play a special part in canonicalization and chaining.
pub struct StructureRoles {
    /// Legacy flat structure holding the 1.0 capabilities.
    pub legacy: StructureName,
    /// Extensible wrapper that embeds `legacy` and heads the chain.
    pub wrapper: StructureName,
    /// Member of `wrapper` that holds the embedded legacy structure.
    pub wrapper_field: String,
    /// Structures that directly represent a numbered API version.
    pub core_versions: Vec<StructureName>,
    /// Structure that trips a driver defect when more chain follows it.
    pub workaround: Option<WorkaroundRole>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkaroundRole {
    pub structure: StructureName,
    /// Name of the run-time boolean parameter that enables the workaround.
    pub flag: String,
}

impl Default for StructureRoles {
    fn default() -> Self {
        Self {
            legacy: StructureName("VkPhysicalDeviceFeatures".to_string()),
            wrapper: StructureName("VkPhysicalDeviceFeatures2".to_string()),
            wrapper_field: "features".to_string(),
            core_versions: [
                "VkPhysicalDeviceVulkan11Features",
                "VkPhysicalDeviceVulkan12Features",
                "VkPhysicalDeviceVulkan13Features",
                "VkPhysicalDeviceVulkan14Features",
            ]
            .into_iter()
            .map(|name| StructureName(name.to_string()))
            .collect(),
            workaround: None,
        }
    }
}

impl StructureRoles {
    pub fn class_of(&self, name: &StructureName) -> StructureClass {
        if name == &self.legacy || name == &self.wrapper {
            StructureClass::Umbrella
        } else if self.core_versions.contains(name) {
            StructureClass::CoreVersion
        } else {
            StructureClass::Other
        }
    }

    pub fn is_workaround(&self, name: &StructureName) -> bool {
        self.workaround
            .as_ref()
            .is_some_and(|role| &role.structure == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Ranking class of a declaring structure.
pub enum StructureClass {
    /// Extension structures and promoted structures that are not a version
    /// structure of their own.
    Other,
    /// One of the numbered-version structures from the skip-list.
    CoreVersion,
    /// The legacy/wrapper pair; handled by a dedicated pass.
    Umbrella,
}

impl StructureClass {
    /// Core-version and umbrella structures outrank every other declarer.
    pub fn is_core(self) -> bool {
        !matches!(self, StructureClass::Other)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// One capability member of one structure, after vendor-suffix naming.
pub struct Declaration {
    pub structure: StructureName,
    /// Position of the declaring structure in the catalog.
    pub position: usize,
    pub class: StructureClass,
    /// Member name inside the API structure.
    pub member: CapabilityName,
    /// Field name in the emitted record.
    pub field: CapabilityName,
}

/// Compiled catalog schema, shared by every variant of a run.
pub struct CatalogSchema {
    schema_version: String,
    compiled: JSONSchema,
}

impl CatalogSchema {
    /// Load the schema shipped under `schema/` in the crate.
    pub fn bundled() -> Result<Self> {
        Self::load(&bundled_schema_path(crate::catalog::DEFAULT_CATALOG_SCHEMA_PATH))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let allowed = allowed_schema_versions();
        let loaded = load_json_schema(
            path,
            SchemaLoadOptions {
                allowed_versions: Some(&allowed),
                ..Default::default()
            },
        )
        .with_context(|| format!("loading catalog schema {}", path.display()))?;
        Ok(Self {
            schema_version: loaded.schema_version,
            compiled: loaded.compiled,
        })
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn validate(&self, document: &Value, label: &str) -> Result<()> {
        validate_document(&self.compiled, document, label)
    }
}

#[derive(Debug, Clone)]
/// Catalog plus its checked capability declarations.
pub struct CatalogIndex {
    catalog: FeatureCatalog,
    positions: BTreeMap<StructureName, usize>,
    declarations: Vec<Declaration>,
}

impl CatalogIndex {
    /// Load, schema-check and index a catalog file.
    pub fn load(path: &Path, schema: &CatalogSchema, roles: &StructureRoles) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let document: Value = serde_json::from_str(&data)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        Self::from_document(document, &format!("catalog {}", path.display()), schema, roles)
    }

    /// Schema-check and index a catalog document held in memory.
    pub fn from_document(
        document: Value,
        label: &str,
        schema: &CatalogSchema,
        roles: &StructureRoles,
    ) -> Result<Self> {
        schema.validate(&document, label)?;
        let catalog: FeatureCatalog =
            serde_json::from_value(document).with_context(|| format!("decoding {label}"))?;
        Self::checked(catalog, schema, roles).with_context(|| format!("validating {label}"))
    }

    fn checked(
        catalog: FeatureCatalog,
        schema: &CatalogSchema,
        roles: &StructureRoles,
    ) -> Result<Self> {
        if catalog.schema_version != schema.schema_version() {
            bail!(
                "catalog schema_version '{}' does not match schema '{}'",
                catalog.schema_version,
                schema.schema_version()
            );
        }
        Ok(Self::new(catalog, roles)?)
    }

    /// Index an already-parsed catalog, enforcing the ownership rules.
    pub fn new(catalog: FeatureCatalog, roles: &StructureRoles) -> Result<Self, CatalogError> {
        let positions = index_structures(&catalog)?;
        validate_roles(&catalog, roles)?;
        let declarations = build_declarations(&catalog, roles);
        validate_claims(&declarations)?;
        Ok(Self {
            catalog,
            positions,
            declarations,
        })
    }

    pub fn key(&self) -> &CatalogKey {
        &self.catalog.edition
    }

    /// Structures in catalog order.
    pub fn structures(&self) -> &[StructureDecl] {
        &self.catalog.structures
    }

    pub fn structure(&self, name: &StructureName) -> Option<&StructureDecl> {
        self.positions
            .get(name)
            .map(|&position| &self.catalog.structures[position])
    }

    /// Every capability declaration in catalog order.
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
}

pub fn allowed_schema_versions() -> BTreeSet<String> {
    BTreeSet::from_iter([DEFAULT_SCHEMA_VERSION.to_string()])
}

fn index_structures(
    catalog: &FeatureCatalog,
) -> Result<BTreeMap<StructureName, usize>, CatalogError> {
    let mut positions = BTreeMap::new();
    for (position, decl) in catalog.structures.iter().enumerate() {
        if decl.name.0.trim().is_empty() {
            return Err(CatalogError::EmptyStructureName {
                edition: catalog.edition.clone(),
            });
        }
        if positions.insert(decl.name.clone(), position).is_some() {
            return Err(CatalogError::DuplicateStructure {
                structure: decl.name.clone(),
            });
        }

        let mut seen = BTreeSet::new();
        for feature in &decl.features {
            if feature.0.trim().is_empty() {
                return Err(CatalogError::EmptyCapabilityName {
                    structure: decl.name.clone(),
                });
            }
            if !seen.insert(feature) {
                return Err(CatalogError::RepeatedCapability {
                    structure: decl.name.clone(),
                    capability: feature.clone(),
                });
            }
        }
    }

    for (structure, suffix) in &catalog.vendor_suffixes {
        if suffix.trim().is_empty() {
            return Err(CatalogError::EmptyVendorSuffix {
                structure: structure.clone(),
            });
        }
    }
    Ok(positions)
}

fn validate_roles(catalog: &FeatureCatalog, roles: &StructureRoles) -> Result<(), CatalogError> {
    for decl in &catalog.structures {
        if roles.core_versions.contains(&decl.name) {
            if let Origin::Extension(_) = decl.origin {
                return Err(CatalogError::CoreVersionNotCore {
                    structure: decl.name.clone(),
                    origin: decl.origin.to_string(),
                });
            }
        }
        if decl.name == roles.wrapper && !decl.features.is_empty() {
            return Err(CatalogError::WrapperDeclaresCapabilities {
                structure: decl.name.clone(),
            });
        }
    }

    let has_legacy = catalog.structure(&roles.legacy).is_some();
    let has_wrapper = catalog.structure(&roles.wrapper).is_some();
    if has_legacy && !has_wrapper {
        return Err(CatalogError::LegacyWithoutWrapper {
            legacy: roles.legacy.clone(),
            wrapper: roles.wrapper.clone(),
        });
    }
    Ok(())
}

/// Resolve the record field name of every declaration.
///
/// A bare member name keeps its spelling unless no core structure claims it
/// and at least two suffixed structures of the same family declare it; those
/// declarations get their vendor suffix appended.
fn build_declarations(catalog: &FeatureCatalog, roles: &StructureRoles) -> Vec<Declaration> {
    let mut declarers: BTreeMap<&CapabilityName, Vec<(usize, StructureClass)>> = BTreeMap::new();
    for (position, decl) in catalog.structures.iter().enumerate() {
        let class = roles.class_of(&decl.name);
        for feature in &decl.features {
            declarers.entry(feature).or_default().push((position, class));
        }
    }

    let mut suffixed: BTreeSet<(usize, &CapabilityName)> = BTreeSet::new();
    for (member, claims) in &declarers {
        if claims.iter().any(|(_, class)| class.is_core()) {
            continue;
        }
        let mut families: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (position, _) in claims {
            if let Some(family) = structure_family(catalog, &catalog.structures[*position]) {
                families.entry(family).or_default().push(*position);
            }
        }
        for positions in families.values().filter(|positions| positions.len() > 1) {
            for position in positions {
                suffixed.insert((*position, *member));
            }
        }
    }

    let mut declarations = Vec::new();
    for (position, decl) in catalog.structures.iter().enumerate() {
        let class = roles.class_of(&decl.name);
        for feature in &decl.features {
            let field = match catalog.vendor_suffix(&decl.name) {
                Some(suffix) if suffixed.contains(&(position, feature)) => {
                    CapabilityName(format!("{}{}", feature.0, suffix))
                }
                _ => feature.clone(),
            };
            declarations.push(Declaration {
                structure: decl.name.clone(),
                position,
                class,
                member: feature.clone(),
                field,
            });
        }
    }
    declarations
}

/// Structure name with its vendor suffix stripped, for suffixed structures.
fn structure_family<'a>(catalog: &FeatureCatalog, decl: &'a StructureDecl) -> Option<&'a str> {
    let suffix = catalog.vendor_suffix(&decl.name)?;
    Some(decl.name.0.strip_suffix(suffix).unwrap_or(&decl.name.0))
}

fn validate_claims(declarations: &[Declaration]) -> Result<(), CatalogError> {
    let mut by_field: BTreeMap<&CapabilityName, Vec<&Declaration>> = BTreeMap::new();
    for declaration in declarations {
        by_field.entry(&declaration.field).or_default().push(declaration);
    }

    for (field, claims) in by_field {
        let core: Vec<&&Declaration> = claims.iter().filter(|d| d.class.is_core()).collect();
        if core.len() > 1 {
            return Err(CatalogError::CoreVersionConflict {
                capability: field.clone(),
                first: core[0].structure.clone(),
                second: core[1].structure.clone(),
            });
        }
        if core.is_empty() && claims.len() > 1 {
            return Err(CatalogError::AmbiguousCapability {
                capability: field.clone(),
                first: claims[0].structure.clone(),
                second: claims[1].structure.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::identity::ApiVersion;
    use serde_json::json;

    fn catalog(value: Value) -> FeatureCatalog {
        serde_json::from_value(value).expect("fixture catalog")
    }

    #[test]
    fn suffixes_apply_only_inside_one_family() {
        let index = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "vendor_suffixes": {
                    "VkPhysicalDeviceMeshShaderFeaturesNV": "NV",
                    "VkPhysicalDeviceMeshShaderFeaturesEXT": "EXT"
                },
                "structures": [
                    {"name": "VkPhysicalDeviceMeshShaderFeaturesNV",
                     "origin": {"extension": "VK_NV_mesh_shader"},
                     "features": ["taskShader", "meshShader"]},
                    {"name": "VkPhysicalDeviceMeshShaderFeaturesEXT",
                     "origin": {"extension": "VK_EXT_mesh_shader"},
                     "features": ["taskShader", "meshShader", "multiviewMeshShader"]}
                ]
            })),
            &StructureRoles::default(),
        )
        .expect("suffixes disambiguate");

        let fields: Vec<&str> = index
            .declarations()
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(
            fields,
            [
                "taskShaderNV",
                "meshShaderNV",
                "taskShaderEXT",
                "meshShaderEXT",
                "multiviewMeshShader"
            ]
        );
    }

    #[test]
    fn unsuffixed_duplicates_are_ambiguous() {
        let err = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkA", "origin": {"extension": "VK_A"}, "features": ["shared"]},
                    {"name": "VkB", "origin": {"extension": "VK_B"}, "features": ["shared"]}
                ]
            })),
            &StructureRoles::default(),
        )
        .expect_err("duplicate without resolution must fail");
        assert_eq!(
            err,
            CatalogError::AmbiguousCapability {
                capability: CapabilityName("shared".into()),
                first: StructureName("VkA".into()),
                second: StructureName("VkB".into()),
            }
        );
    }

    #[test]
    fn two_core_version_claims_are_fatal() {
        let err = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkPhysicalDeviceVulkan12Features", "origin": {"version": "1.2"},
                     "features": ["shaderFloat16"]},
                    {"name": "VkPhysicalDeviceVulkan13Features", "origin": {"version": "1.3"},
                     "features": ["shaderFloat16"]}
                ]
            })),
            &StructureRoles::default(),
        )
        .expect_err("core/core conflict must fail");
        assert!(matches!(err, CatalogError::CoreVersionConflict { .. }));
        assert!(err.to_string().contains("shaderFloat16"));
    }

    #[test]
    fn legacy_requires_wrapper_and_core_versions_need_core_origin() {
        let roles = StructureRoles::default();
        let err = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkPhysicalDeviceFeatures", "origin": {"version": "1.0"},
                     "features": ["robustBufferAccess"]}
                ]
            })),
            &roles,
        )
        .expect_err("legacy alone must fail");
        assert!(matches!(err, CatalogError::LegacyWithoutWrapper { .. }));

        let err = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkPhysicalDeviceVulkan11Features",
                     "origin": {"extension": "VK_KHR_fake"}, "features": ["multiview"]}
                ]
            })),
            &roles,
        )
        .expect_err("core-version structure from an extension must fail");
        assert!(matches!(err, CatalogError::CoreVersionNotCore { .. }));
    }

    #[test]
    fn structural_errors_name_the_structure() {
        let roles = StructureRoles::default();
        let err = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkA", "origin": {"version": "1.1"}, "features": ["x", "x"]}
                ]
            })),
            &roles,
        )
        .expect_err("repeated member must fail");
        assert!(err.to_string().contains("VkA"));

        let err = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkA", "origin": {"version": "1.1"}, "features": ["x"]},
                    {"name": "VkA", "origin": {"version": "1.1"}, "features": ["y"]}
                ]
            })),
            &roles,
        )
        .expect_err("duplicate structure must fail");
        assert!(matches!(err, CatalogError::DuplicateStructure { .. }));
    }

    #[test]
    fn index_reports_positions_and_classes() {
        let index = CatalogIndex::new(
            catalog(json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [
                    {"name": "VkPhysicalDeviceFeatures2", "origin": {"version": "1.1"}},
                    {"name": "VkPhysicalDeviceFeatures", "origin": {"version": "1.0"},
                     "features": ["robustBufferAccess"]},
                    {"name": "VkPhysicalDeviceVulkan12Features", "origin": {"version": "1.2"},
                     "features": ["drawIndirectCount"]}
                ]
            })),
            &StructureRoles::default(),
        )
        .expect("valid catalog");
        let vk12 = StructureName("VkPhysicalDeviceVulkan12Features".into());
        assert_eq!(index.declarations()[1].position, 2);
        assert_eq!(
            index.structure(&vk12).map(|d| d.origin.min_version()),
            Some(ApiVersion::new(1, 2, 0))
        );
        let classes: Vec<StructureClass> =
            index.declarations().iter().map(|d| d.class).collect();
        assert_eq!(
            classes,
            [StructureClass::Umbrella, StructureClass::CoreVersion]
        );
    }

    #[test]
    fn bundled_catalogs_load_against_bundled_schema() {
        let schema = CatalogSchema::bundled().expect("bundled schema");
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("catalogs");
        for name in ["vulkan_core.json", "vulkan_beta.json"] {
            let index = CatalogIndex::load(&root.join(name), &schema, &StructureRoles::default())
                .unwrap_or_else(|err| panic!("{name}: {err:#}"));
            assert!(!index.structures().is_empty(), "{name} is empty");
        }
    }

    #[test]
    fn schema_rejects_malformed_documents() {
        let schema = CatalogSchema::bundled().expect("bundled schema");
        let err = CatalogIndex::from_document(
            json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_core",
                "structures": [{"name": "VkA", "origin": {"version": "latest"}}]
            }),
            "fixture",
            &schema,
            &StructureRoles::default(),
        )
        .expect_err("bad origin must fail");
        assert!(format!("{err:#}").contains("fixture"), "{err:#}");
    }
}
