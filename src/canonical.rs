//! Capability ownership resolution.
//!
//! Every capability field must end up owned by exactly one structure. A
//! core-version structure always outranks any other declarer; among the
//! rest the earliest declaration wins. The legacy flat structure is handled
//! in a final umbrella pass: its capabilities move to the wrapper, which
//! reaches them through its nested field, and same-named capabilities are
//! stripped from every other structure.
//!
//! Two strategies encode the same ownership. `SkipList` strips whatever a
//! core-version or umbrella structure already covers; `Ranked` reduces each
//! capability's declarers with an explicit rank key. The catalog index has
//! already rejected the inputs on which they could disagree.

use crate::catalog::identity::{CapabilityName, CatalogKey, Origin, StructureName};
use crate::catalog::index::{CatalogIndex, Declaration, StructureClass, StructureRoles};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    #[default]
    SkipList,
    Ranked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
/// Priority of one declaration; the greatest rank owns the capability.
pub struct OwnerRank {
    pub core_version: bool,
    pub declaration: Reverse<usize>,
}

/// Rank a non-umbrella declaration.
pub fn owner_rank(declaration: &Declaration) -> OwnerRank {
    OwnerRank {
        core_version: declaration.class == StructureClass::CoreVersion,
        declaration: Reverse(declaration.position),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Winning declarer of one capability.
pub struct Owner {
    pub structure: StructureName,
    pub origin: Origin,
    /// Read and written through the wrapper's nested legacy field.
    pub nested: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ownership {
    owners: BTreeMap<CapabilityName, Owner>,
}

impl Ownership {
    pub fn get(&self, field: &CapabilityName) -> Option<&Owner> {
        self.owners.get(field)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityName, &Owner)> {
        self.owners.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CanonicalFeature {
    /// Member name inside the API structure.
    pub member: CapabilityName,
    /// Field name in the emitted record.
    pub field: CapabilityName,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// A surviving structure with the capabilities it owns, in declared order.
pub struct CanonicalStructure {
    pub name: StructureName,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_type: Option<String>,
    pub features: Vec<CanonicalFeature>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// The wrapper/legacy pair, emitted after every other structure.
pub struct Umbrella {
    pub wrapper: StructureName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper_s_type: Option<String>,
    pub nested_field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy: Option<StructureName>,
    pub origin: Origin,
    pub features: Vec<CanonicalFeature>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CanonicalCatalog {
    pub edition: CatalogKey,
    /// Non-umbrella structures in catalog order, none of them empty.
    pub structures: Vec<CanonicalStructure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umbrella: Option<Umbrella>,
    /// Structures left with no capability after resolution.
    pub dropped: Vec<StructureName>,
    /// Owner of every emitted field, umbrella fields included.
    pub ownership: Ownership,
}

impl CanonicalCatalog {
    pub fn structure(&self, name: &StructureName) -> Option<&CanonicalStructure> {
        self.structures.iter().find(|structure| &structure.name == name)
    }

    /// Every emitted field, umbrella last.
    pub fn fields(&self) -> impl Iterator<Item = &CapabilityName> {
        self.structures
            .iter()
            .flat_map(|structure| structure.features.iter())
            .chain(self.umbrella.iter().flat_map(|umbrella| umbrella.features.iter()))
            .map(|feature| &feature.field)
    }
}

/// Reduce `index` to one owning structure per capability.
pub fn canonicalize(
    index: &CatalogIndex,
    roles: &StructureRoles,
    strategy: DedupStrategy,
) -> CanonicalCatalog {
    let declarations = index.declarations();
    let winners = match strategy {
        DedupStrategy::SkipList => skip_list_winners(declarations),
        DedupStrategy::Ranked => ranked_winners(declarations),
    };

    let mut per_structure: Vec<Vec<CanonicalFeature>> = vec![Vec::new(); index.structures().len()];
    let mut ownership = Ownership::default();
    for (slot, declaration) in declarations.iter().enumerate() {
        let winner = winners.get(&declaration.field).copied();
        if winner != Some(slot) {
            if let Some(winner) = winner {
                debug!(
                    capability = %declaration.field,
                    owner = %declarations[winner].structure,
                    stripped = %declaration.structure,
                    "capability stripped"
                );
            }
            continue;
        }
        per_structure[declaration.position].push(CanonicalFeature {
            member: declaration.member.clone(),
            field: declaration.field.clone(),
        });
        let nested = declaration.class == StructureClass::Umbrella;
        let structure = if nested {
            roles.wrapper.clone()
        } else {
            declaration.structure.clone()
        };
        let origin = index.structures()[declaration.position].origin.clone();
        ownership.owners.insert(
            declaration.field.clone(),
            Owner {
                structure,
                origin,
                nested,
            },
        );
    }

    let mut structures = Vec::new();
    let mut dropped = Vec::new();
    let mut legacy_features = Vec::new();
    for (decl, features) in index.structures().iter().zip(per_structure) {
        if decl.name == roles.legacy {
            legacy_features = features;
            continue;
        }
        if decl.name == roles.wrapper {
            continue;
        }
        if features.is_empty() {
            debug!(structure = %decl.name, "structure dropped after dedup");
            dropped.push(decl.name.clone());
            continue;
        }
        structures.push(CanonicalStructure {
            name: decl.name.clone(),
            origin: decl.origin.clone(),
            s_type: decl.s_type.clone(),
            features,
        });
    }

    let umbrella = index.structure(&roles.wrapper).map(|wrapper| {
        let legacy = index.structure(&roles.legacy);
        Umbrella {
            wrapper: wrapper.name.clone(),
            wrapper_s_type: wrapper.s_type.clone(),
            nested_field: roles.wrapper_field.clone(),
            legacy: legacy.map(|decl| decl.name.clone()),
            origin: legacy.unwrap_or(wrapper).origin.clone(),
            features: legacy_features,
        }
    });

    CanonicalCatalog {
        edition: index.key().clone(),
        structures,
        umbrella,
        dropped,
        ownership,
    }
}

/// Declarations covered by core-version or umbrella structures win; other
/// declarers keep what is left, first declaration first.
fn skip_list_winners(declarations: &[Declaration]) -> BTreeMap<&CapabilityName, usize> {
    let mut winners = BTreeMap::new();
    for (slot, declaration) in declarations.iter().enumerate() {
        if declaration.class.is_core() {
            winners.insert(&declaration.field, slot);
        }
    }
    for (slot, declaration) in declarations.iter().enumerate() {
        winners.entry(&declaration.field).or_insert(slot);
    }
    winners
}

/// Max-by-rank over the non-umbrella declarers, then the umbrella pass.
fn ranked_winners(declarations: &[Declaration]) -> BTreeMap<&CapabilityName, usize> {
    let mut candidates: BTreeMap<&CapabilityName, Vec<usize>> = BTreeMap::new();
    for (slot, declaration) in declarations.iter().enumerate() {
        if declaration.class != StructureClass::Umbrella {
            candidates.entry(&declaration.field).or_default().push(slot);
        }
    }

    let mut winners: BTreeMap<&CapabilityName, usize> = candidates
        .into_iter()
        .filter_map(|(field, slots)| {
            slots
                .into_iter()
                .max_by_key(|slot| owner_rank(&declarations[*slot]))
                .map(|slot| (field, slot))
        })
        .collect();

    for (slot, declaration) in declarations.iter().enumerate() {
        if declaration.class == StructureClass::Umbrella {
            winners.insert(&declaration.field, slot);
        }
    }
    winners
}
