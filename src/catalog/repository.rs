//! Holds the validated catalogs of one generator run, keyed by edition.
//!
//! Variants are registered in manifest order; the repository keeps that
//! order so later passes can walk the editions exactly as the chain will.

use crate::catalog::identity::CatalogKey;
use crate::catalog::index::CatalogIndex;
use anyhow::{Result, bail};

#[derive(Default)]
/// In-memory store for indexed catalogs keyed by `CatalogKey`.
pub struct CatalogRepository {
    catalogs: Vec<CatalogIndex>,
}

impl CatalogRepository {
    /// Register a catalog; each edition may appear once per run.
    pub fn register(&mut self, catalog: CatalogIndex) -> Result<()> {
        if self.get(catalog.key()).is_some() {
            bail!("catalog edition {} registered twice", catalog.key());
        }
        self.catalogs.push(catalog);
        Ok(())
    }

    /// Fetch a catalog by key, if present.
    pub fn get(&self, key: &CatalogKey) -> Option<&CatalogIndex> {
        self.catalogs.iter().find(|catalog| catalog.key() == key)
    }

    /// Catalogs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogIndex> {
        self.catalogs.iter()
    }

}
