//! Catalogs of available module definitions

use crate::error::CatalogError;
use indexmap::IndexMap;
use modsys_core::{ModuleDeclaration, ModuleId, ModuleIdQuery, ModuleInfo};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// A source of module metadata, optionally chained to a parent
///
/// Every view id and alias id of a module is an id of that module: reading
/// any of them returns the owning module's info. Entries in a child catalog
/// shadow entries with the same id in its parents.
pub trait Catalog: Send + Sync {
    /// Catalog name for diagnostics
    fn name(&self) -> &str;

    fn parent(&self) -> Option<&dyn Catalog>;

    /// Add ids known to this catalog alone, matching `name` when given
    fn gather_local_module_ids(
        &self,
        name: Option<&str>,
        ids: &mut BTreeSet<ModuleId>,
    ) -> CatalogResult<()>;

    /// Read module info from this catalog alone
    fn read_local_module_info(&self, id: &ModuleId) -> CatalogResult<Option<Arc<ModuleInfo>>>;

    /// Ids across the whole chain, matching `name` when given
    fn gather_module_ids(&self, name: Option<&str>) -> CatalogResult<BTreeSet<ModuleId>> {
        let mut ids = BTreeSet::new();
        self.gather_local_module_ids(name, &mut ids)?;
        let mut parent = self.parent();
        while let Some(catalog) = parent {
            catalog.gather_local_module_ids(name, &mut ids)?;
            parent = catalog.parent();
        }
        Ok(ids)
    }

    fn list_module_ids(&self) -> CatalogResult<BTreeSet<ModuleId>> {
        self.gather_module_ids(None)
    }

    /// Ids matching a query, newest first
    fn find_module_ids(&self, query: &ModuleIdQuery) -> CatalogResult<Vec<ModuleId>> {
        let ids = self.gather_module_ids(Some(query.name()))?;
        Ok(ids.into_iter().rev().filter(|id| query.matches(id)).collect())
    }

    fn find_latest_module_id(&self, query: &ModuleIdQuery) -> CatalogResult<Option<ModuleId>> {
        Ok(self.find_module_ids(query)?.into_iter().next())
    }

    /// Read module info, child catalog first
    fn read_module_info(&self, id: &ModuleId) -> CatalogResult<Option<Arc<ModuleInfo>>> {
        if let Some(info) = self.read_local_module_info(id)? {
            return Ok(Some(info));
        }
        let mut parent = self.parent();
        while let Some(catalog) = parent {
            if let Some(info) = catalog.read_local_module_info(id)? {
                trace!("{} found in parent catalog {}", id, catalog.name());
                return Ok(Some(info));
            }
            parent = catalog.parent();
        }
        Ok(None)
    }
}

/// In-memory catalog of modules currently being compiled
pub struct LocalCatalog {
    name: String,
    parent: Option<Arc<dyn Catalog>>,
    modules: IndexMap<ModuleId, Arc<ModuleInfo>>,
    index: FxHashMap<ModuleId, Arc<ModuleInfo>>,
}

impl LocalCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            modules: IndexMap::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn with_parent(mut self, parent: Arc<dyn Catalog>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Build a catalog from module declarations, validating each
    pub fn from_declarations<'a>(
        name: impl Into<String>,
        declarations: impl IntoIterator<Item = &'a ModuleDeclaration>,
        base: Option<&ModuleIdQuery>,
    ) -> CatalogResult<Self> {
        let mut catalog = Self::new(name);
        for declaration in declarations {
            catalog.add_declaration(declaration, base)?;
        }
        Ok(catalog)
    }

    pub fn add_declaration(
        &mut self,
        declaration: &ModuleDeclaration,
        base: Option<&ModuleIdQuery>,
    ) -> CatalogResult<()> {
        let info = declaration.validate(base)?;
        self.add(info)
    }

    /// Add a module; every id it answers to must be new to this catalog
    pub fn add(&mut self, info: ModuleInfo) -> CatalogResult<()> {
        if let Some(taken) = info.view_ids().find(|id| self.index.contains_key(*id)) {
            return Err(CatalogError::Inconsistent {
                catalog: self.name.clone(),
                message: format!("{} already defined", taken),
            });
        }
        debug!("Catalog {}: adding {}", self.name, info.id());
        let info = Arc::new(info);
        for id in info.view_ids() {
            self.index.insert(id.clone(), Arc::clone(&info));
        }
        self.modules.insert(info.id().clone(), info);
        Ok(())
    }

    /// Modules in insertion order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleInfo>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Catalog for LocalCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&dyn Catalog> {
        self.parent.as_deref()
    }

    fn gather_local_module_ids(
        &self,
        name: Option<&str>,
        ids: &mut BTreeSet<ModuleId>,
    ) -> CatalogResult<()> {
        ids.extend(
            self.index
                .keys()
                .filter(|id| name.map_or(true, |n| id.name() == n))
                .cloned(),
        );
        Ok(())
    }

    fn read_local_module_info(&self, id: &ModuleId) -> CatalogResult<Option<Arc<ModuleInfo>>> {
        Ok(self.index.get(id).cloned())
    }
}
