//! Deserializable representation of a feature catalog document.
//!
//! The types mirror `schema/feature_catalog.schema.json` so the generator and
//! tests can reason about structures without ad-hoc JSON handling. Use
//! `CatalogIndex` for validated access; these structs are the raw surface.

use crate::catalog::identity::{CapabilityName, CatalogKey, Origin, StructureName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
/// One catalog edition as produced by the upstream registry parser.
pub struct FeatureCatalog {
    pub schema_version: String,
    pub edition: CatalogKey,
    /// Vendor suffix per declaring structure, used to disambiguate bare
    /// capability names shared by several vendor variants of one family.
    #[serde(default)]
    pub vendor_suffixes: BTreeMap<StructureName, String>,
    /// Structures in declaration order.
    pub structures: Vec<StructureDecl>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// A feature structure and the ordered capability members it declares.
pub struct StructureDecl {
    pub name: StructureName,
    pub origin: Origin,
    /// Structure-type tag when it cannot be derived from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_type: Option<String>,
    #[serde(default)]
    pub features: Vec<CapabilityName>,
}

impl FeatureCatalog {
    /// Look up a structure by name.
    pub fn structure(&self, name: &StructureName) -> Option<&StructureDecl> {
        self.structures.iter().find(|decl| &decl.name == name)
    }

    /// Vendor suffix recorded for `name`, if any.
    pub fn vendor_suffix(&self, name: &StructureName) -> Option<&str> {
        self.vendor_suffixes.get(name).map(String::as_str)
    }
}
