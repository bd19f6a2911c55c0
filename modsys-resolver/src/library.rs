//! Directory-backed library catalog
//!
//! Layout: `<root>/<name>/<version>/module-info.json`, with `_` standing in
//! for the version directory of an unversioned module. Version directories
//! use the canonical spelling, so equal versions share one directory.

use crate::catalog::{Catalog, CatalogResult};
use crate::error::CatalogError;
use modsys_core::{ModuleId, ModuleInfo, Version};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

const MODULE_INFO_FILE: &str = "module-info.json";
const UNVERSIONED_DIR: &str = "_";

/// A persisted library of installed modules
pub struct LibraryCatalog {
    name: String,
    root: PathBuf,
    parent: Option<Arc<dyn Catalog>>,
    /// Installed modules by module id, filled on first full scan
    modules: RwLock<Option<FxHashMap<ModuleId, Arc<ModuleInfo>>>>,
}

impl LibraryCatalog {
    /// Open an existing library directory
    pub fn open(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CatalogError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "library directory not found"),
            ));
        }
        Ok(Self::at(root))
    }

    /// Create the library directory if needed and open it
    pub fn create(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| CatalogError::io(&root, e))?;
        Ok(Self::at(root))
    }

    fn at(root: PathBuf) -> Self {
        Self {
            name: root.display().to_string(),
            root,
            parent: None,
            modules: RwLock::new(None),
        }
    }

    pub fn with_parent(mut self, parent: Arc<dyn Catalog>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn module_dir(&self, id: &ModuleId) -> PathBuf {
        let version = id
            .version()
            .map(Version::canonical)
            .unwrap_or_else(|| UNVERSIONED_DIR.to_string());
        self.root.join(id.name()).join(version)
    }

    /// Write a module's info into the library, replacing any previous entry
    pub fn install(&self, info: &ModuleInfo) -> CatalogResult<()> {
        let dir = self.module_dir(info.id());
        std::fs::create_dir_all(&dir).map_err(|e| CatalogError::io(&dir, e))?;
        let path = dir.join(MODULE_INFO_FILE);
        let content = serde_json::to_string_pretty(info).map_err(|e| CatalogError::Malformed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| CatalogError::io(&path, e))?;
        debug!("Installed {} into {}", info.id(), self.root.display());

        if let Some(modules) = self.modules.write().as_mut() {
            // the key keeps its old spelling on replace
            modules.remove(info.id());
            modules.insert(info.id().clone(), Arc::new(info.clone()));
        }
        Ok(())
    }

    /// Read one stored module info, checking it against its location
    fn read_entry(&self, path: &Path, expected: &str) -> CatalogResult<Arc<ModuleInfo>> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        let info: ModuleInfo =
            serde_json::from_str(&content).map_err(|e| CatalogError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if !info.is_well_formed() || info.id().name() != expected {
            return Err(CatalogError::Malformed {
                path: path.to_path_buf(),
                message: format!("entry for {} stored under {}", info.id(), expected),
            });
        }
        trace!("Read {} from {}", info.id(), path.display());
        Ok(Arc::new(info))
    }

    fn scan(&self) -> CatalogResult<FxHashMap<ModuleId, Arc<ModuleInfo>>> {
        let mut modules = FxHashMap::default();
        let entries = std::fs::read_dir(&self.root).map_err(|e| CatalogError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CatalogError::io(&self.root, e))?;
            let name_dir = entry.path();
            if !name_dir.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping non-UTF-8 entry {}", name_dir.display());
                continue;
            };
            let versions =
                std::fs::read_dir(&name_dir).map_err(|e| CatalogError::io(&name_dir, e))?;
            for version in versions {
                let version = version.map_err(|e| CatalogError::io(&name_dir, e))?;
                let path = version.path().join(MODULE_INFO_FILE);
                if !path.is_file() {
                    continue;
                }
                let info = self.read_entry(&path, &name)?;
                if let Some(previous) = modules.insert(info.id().clone(), Arc::clone(&info)) {
                    warn!(
                        "{} and {} are stored twice under {}",
                        previous.id(),
                        info.id(),
                        name_dir.display()
                    );
                }
            }
        }
        debug!("Scanned {} modules in {}", modules.len(), self.root.display());
        Ok(modules)
    }

    fn with_modules<T>(
        &self,
        f: impl FnOnce(&FxHashMap<ModuleId, Arc<ModuleInfo>>) -> T,
    ) -> CatalogResult<T> {
        if let Some(modules) = self.modules.read().as_ref() {
            return Ok(f(modules));
        }
        let mut guard = self.modules.write();
        if guard.is_none() {
            *guard = Some(self.scan()?);
        }
        match guard.as_ref() {
            Some(modules) => Ok(f(modules)),
            None => Ok(f(&FxHashMap::default())),
        }
    }
}

impl Catalog for LibraryCatalog {
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
        self.with_modules(|modules| {
            for info in modules.values() {
                ids.extend(
                    info.view_ids()
                        .filter(|id| name.map_or(true, |n| id.name() == n))
                        .cloned(),
                );
            }
        })
    }

    fn read_local_module_info(&self, id: &ModuleId) -> CatalogResult<Option<Arc<ModuleInfo>>> {
        self.with_modules(|modules| {
            modules.get(id).cloned().or_else(|| {
                modules
                    .values()
                    .find(|info| info.view_ids().any(|v| v == id))
                    .cloned()
            })
        })
    }
}
