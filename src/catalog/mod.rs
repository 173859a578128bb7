//! Feature catalog wiring.
//!
//! This module wraps catalog documents emitted by the upstream registry parser
//! (for example `catalogs/vulkan_core.json`) so the generator can load a
//! validated snapshot and expose consistent identifiers. Types here mirror the
//! schema fields; callers use `CatalogIndex` for checked access and
//! `CatalogRepository` when several editions take part in one run.

pub mod error;
pub mod identity;
pub mod index;
pub mod model;
pub mod repository;

pub use error::CatalogError;
pub use identity::{ApiVersion, CapabilityName, CatalogKey, Origin, StructureName};
pub use index::{CatalogIndex, StructureRoles};
pub use model::{FeatureCatalog, StructureDecl};
pub use repository::CatalogRepository;

/// Default relative path to the bundled catalog schema.
pub const DEFAULT_CATALOG_SCHEMA_PATH: &str = "schema/feature_catalog.schema.json";
