//! Typed catalog failures.
//!
//! The upstream parser is trusted, but a catalog that breaks an ownership
//! rule would otherwise produce source that only fails at compile time. Each
//! variant names the offending structure or capability so the report points
//! straight at the registry entry.

use crate::catalog::identity::{CapabilityName, CatalogKey, StructureName};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog {edition} contains a structure with an empty name")]
    EmptyStructureName { edition: CatalogKey },

    #[error("structure {structure} is declared more than once")]
    DuplicateStructure { structure: StructureName },

    #[error("structure {structure} contains an empty capability name")]
    EmptyCapabilityName { structure: StructureName },

    #[error("structure {structure} lists capability {capability} more than once")]
    RepeatedCapability {
        structure: StructureName,
        capability: CapabilityName,
    },

    #[error(
        "capability {capability} is claimed by core-version structures {first} and {second}"
    )]
    CoreVersionConflict {
        capability: CapabilityName,
        first: StructureName,
        second: StructureName,
    },

    #[error(
        "capability {capability} is declared by {first} and {second} and no core-version structure or vendor suffix resolves it"
    )]
    AmbiguousCapability {
        capability: CapabilityName,
        first: StructureName,
        second: StructureName,
    },

    #[error("vendor suffix for {structure} must not be empty")]
    EmptyVendorSuffix { structure: StructureName },

    #[error("wrapper structure {structure} must not declare capabilities of its own")]
    WrapperDeclaresCapabilities { structure: StructureName },

    #[error("legacy structure {legacy} is present without its wrapper {wrapper}")]
    LegacyWithoutWrapper {
        legacy: StructureName,
        wrapper: StructureName,
    },

    #[error("core-version structure {structure} must be declared by a core version, not {origin}")]
    CoreVersionNotCore {
        structure: StructureName,
        origin: String,
    },

    #[error("umbrella structure {structure} appears in guarded variant {edition}")]
    UmbrellaInGuardedVariant {
        structure: StructureName,
        edition: CatalogKey,
    },

    #[error("umbrella structure {structure} is provided by both {first} and {second}")]
    DuplicateUmbrella {
        structure: StructureName,
        first: CatalogKey,
        second: CatalogKey,
    },

    #[error("capability {capability} is emitted by both {first} and {second}")]
    DuplicateField {
        capability: CapabilityName,
        first: StructureName,
        second: StructureName,
    },

    #[error("structure {structure} is visited twice in one chain")]
    RepeatedChainEntry { structure: StructureName },

    #[error(
        "persisted predecessor {structure} is also emitted by this run; the chain would link to itself"
    )]
    CyclicPredecessor { structure: StructureName },

    #[error("persisted predecessor '{value}' is not a structure name")]
    MalformedPredecessor { value: String },
}
