//! Chain ordering for canonical structures.
//!
//! Structures are visited in catalog order and each one links back to the
//! structure visited before it, so the API-facing chain runs from the last
//! visited structure to the first. The previous structure is threaded
//! through `LinkState` so a later pass (or a later run, via the state file)
//! can continue a chain started elsewhere.
//!
//! A workaround structure is visited first. Every later entry of the pass is
//! marked `workaround_active`, and the entry that links straight to the
//! workaround structure is `detachable`: with the run-time flag set it skips
//! over the workaround structure, which is then queried on its own.

use crate::canonical::CanonicalCatalog;
use crate::catalog::error::CatalogError;
use crate::catalog::identity::{CatalogKey, StructureName};
use crate::catalog::index::StructureRoles;
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Structure linked last so far; `None` is the head of the chain.
pub struct LinkState {
    pub prev: Option<StructureName>,
}

impl LinkState {
    pub fn head() -> Self {
        Self::default()
    }

    pub fn after(structure: StructureName) -> Self {
        Self {
            prev: Some(structure),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    /// No predecessor; links to null.
    Head,
    /// Predecessor emitted earlier in the same pass.
    Local(StructureName),
    /// Predecessor inherited from an earlier pass or run.
    Carried(StructureName),
}

impl Link {
    pub fn target(&self) -> Option<&StructureName> {
        match self {
            Link::Head => None,
            Link::Local(name) | Link::Carried(name) => Some(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEntry {
    pub structure: StructureName,
    pub link: Link,
    pub workaround_active: bool,
    pub detachable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Visiting order of one pass.
pub struct Chain {
    pub edition: CatalogKey,
    pub entries: Vec<ChainEntry>,
    /// Workaround structure, when this pass visits it.
    pub workaround: Option<StructureName>,
}

impl Chain {
    /// Number of link relations (entries with a predecessor).
    pub fn links(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.link != Link::Head)
            .count()
    }

    pub fn order(&self) -> impl Iterator<Item = &StructureName> {
        self.entries.iter().map(|entry| &entry.structure)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ChainBuilder<'a> {
    roles: &'a StructureRoles,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(roles: &'a StructureRoles) -> Self {
        Self { roles }
    }

    /// Order the non-umbrella structures of `catalog`, continuing from
    /// `state`, and return the chain with the state after the pass.
    pub fn build(
        &self,
        catalog: &CanonicalCatalog,
        state: LinkState,
    ) -> Result<(Chain, LinkState), CatalogError> {
        if let Some(prev) = &state.prev {
            if catalog.structure(prev).is_some() {
                return Err(CatalogError::CyclicPredecessor {
                    structure: prev.clone(),
                });
            }
        }

        let workaround = catalog
            .structures
            .iter()
            .find(|structure| self.roles.is_workaround(&structure.name))
            .map(|structure| structure.name.clone());

        let mut order: Vec<&StructureName> = Vec::with_capacity(catalog.structures.len());
        order.extend(workaround.iter());
        order.extend(
            catalog
                .structures
                .iter()
                .map(|structure| &structure.name)
                .filter(|name| Some(*name) != workaround.as_ref()),
        );

        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(order.len());
        let mut link = match state.prev {
            Some(prev) => Link::Carried(prev),
            None => Link::Head,
        };
        for (visit, name) in order.into_iter().enumerate() {
            if !seen.insert(name) {
                return Err(CatalogError::RepeatedChainEntry {
                    structure: name.clone(),
                });
            }
            let workaround_active = workaround.is_some() && visit > 0;
            let detachable = workaround_active && link.target() == workaround.as_ref();
            entries.push(ChainEntry {
                structure: name.clone(),
                link,
                workaround_active,
                detachable,
            });
            link = Link::Local(name.clone());
        }

        let next = LinkState {
            prev: link.target().cloned(),
        };
        Ok((
            Chain {
                edition: catalog.edition.clone(),
                entries,
                workaround,
            },
            next,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{DedupStrategy, canonicalize};
    use crate::catalog::index::{CatalogIndex, WorkaroundRole};
    use crate::catalog::model::FeatureCatalog;
    use serde_json::{Value, json};

    fn canonical(value: Value, roles: &StructureRoles) -> CanonicalCatalog {
        let catalog: FeatureCatalog = serde_json::from_value(value).expect("fixture catalog");
        let index = CatalogIndex::new(catalog, roles).expect("valid fixture");
        canonicalize(&index, roles, DedupStrategy::SkipList)
    }

    fn three_extensions() -> Value {
        json!({
            "schema_version": "feature_catalog_v1",
            "edition": "vulkan_core",
            "structures": [
                {"name": "VkA", "origin": {"extension": "VK_A"}, "features": ["a"]},
                {"name": "VkB", "origin": {"extension": "VK_B"}, "features": ["b"]},
                {"name": "VkC", "origin": {"extension": "VK_C"}, "features": ["c"]}
            ]
        })
    }

    fn name(value: &str) -> StructureName {
        StructureName(value.to_string())
    }

    #[test]
    fn worked_example_links_back_to_core() {
        let roles = StructureRoles {
            core_versions: vec![name("Core1_1")],
            ..StructureRoles::default()
        };
        let catalog = canonical(
            json!({
                "schema_version": "feature_catalog_v1",
                "edition": "example",
                "structures": [
                    {"name": "Core1_1", "origin": {"version": "1.1"}, "features": ["feat_a"]},
                    {"name": "Ext_X", "origin": {"extension": "VK_X"},
                     "features": ["feat_a", "feat_b"]}
                ]
            }),
            &roles,
        );
        let (chain, state) = ChainBuilder::new(&roles)
            .build(&catalog, LinkState::head())
            .expect("chain builds");
        assert_eq!(
            chain.entries,
            [
                ChainEntry {
                    structure: name("Core1_1"),
                    link: Link::Head,
                    workaround_active: false,
                    detachable: false,
                },
                ChainEntry {
                    structure: name("Ext_X"),
                    link: Link::Local(name("Core1_1")),
                    workaround_active: false,
                    detachable: false,
                },
            ]
        );
        assert_eq!(state, LinkState::after(name("Ext_X")));
    }

    #[test]
    fn link_count_is_survivors_minus_one_from_head() {
        let roles = StructureRoles::default();
        let catalog = canonical(three_extensions(), &roles);
        let (chain, _) = ChainBuilder::new(&roles)
            .build(&catalog, LinkState::head())
            .expect("chain builds");
        assert_eq!(chain.links(), chain.entries.len() - 1);
        let heads = chain
            .entries
            .iter()
            .filter(|entry| entry.link == Link::Head)
            .count();
        assert_eq!(heads, 1);
    }

    #[test]
    fn carried_state_links_the_first_entry() {
        let roles = StructureRoles::default();
        let catalog = canonical(three_extensions(), &roles);
        let (chain, state) = ChainBuilder::new(&roles)
            .build(&catalog, LinkState::after(name("VkEarlier")))
            .expect("chain builds");
        assert_eq!(chain.entries[0].link, Link::Carried(name("VkEarlier")));
        assert_eq!(chain.links(), chain.entries.len());
        assert_eq!(state.prev, Some(name("VkC")));
    }

    #[test]
    fn empty_pass_leaves_state_unchanged() {
        let roles = StructureRoles::default();
        let catalog = canonical(
            json!({
                "schema_version": "feature_catalog_v1",
                "edition": "vulkan_beta",
                "structures": []
            }),
            &roles,
        );
        let (chain, state) = ChainBuilder::new(&roles)
            .build(&catalog, LinkState::after(name("VkEarlier")))
            .expect("chain builds");
        assert!(chain.is_empty());
        assert_eq!(state, LinkState::after(name("VkEarlier")));
    }

    #[test]
    fn predecessor_inside_the_pass_is_cyclic() {
        let roles = StructureRoles::default();
        let catalog = canonical(three_extensions(), &roles);
        let err = ChainBuilder::new(&roles)
            .build(&catalog, LinkState::after(name("VkB")))
            .expect_err("self-referencing chain must fail");
        assert_eq!(
            err,
            CatalogError::CyclicPredecessor {
                structure: name("VkB")
            }
        );
    }

    #[test]
    fn workaround_structure_is_visited_first() {
        let roles = StructureRoles {
            workaround: Some(WorkaroundRole {
                structure: name("VkC"),
                flag: "intelWorkaround".to_string(),
            }),
            ..StructureRoles::default()
        };
        let catalog = canonical(three_extensions(), &roles);
        let (chain, state) = ChainBuilder::new(&roles)
            .build(&catalog, LinkState::head())
            .expect("chain builds");

        let order: Vec<&str> = chain.order().map(StructureName::as_str).collect();
        assert_eq!(order, ["VkC", "VkA", "VkB"]);
        assert_eq!(chain.workaround, Some(name("VkC")));
        assert!(!chain.entries[0].workaround_active);
        assert!(chain.entries[1..].iter().all(|entry| entry.workaround_active));
        let detachable: Vec<&str> = chain
            .entries
            .iter()
            .filter(|entry| entry.detachable)
            .map(|entry| entry.structure.as_str())
            .collect();
        assert_eq!(detachable, ["VkA"]);
        assert_eq!(chain.links(), 2);
        assert_eq!(state.prev, Some(name("VkB")));
    }
}
