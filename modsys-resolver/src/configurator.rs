//! Configurator entry points
//!
//! Ties the stages together: resolve root queries, partition the selected
//! modules into path contexts, then link the contexts.

use crate::catalog::Catalog;
use crate::config::ResolverConfig;
use crate::configuration::Configuration;
use crate::context::ContextBuilder;
use crate::error::Result;
use crate::linker;
use crate::resolver;
use indexmap::IndexSet;
use modsys_core::{ModuleIdQuery, ModuleInfo};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolve `root_queries` and build the path configuration for them
pub fn configure_paths(
    catalog: &dyn Catalog,
    root_queries: &[ModuleIdQuery],
    config: &ResolverConfig,
) -> Result<Configuration> {
    config.validate()?;
    let resolution = resolver::resolve(catalog, root_queries, config)?;
    let mut contexts = ContextBuilder::new(&resolution).build()?;
    linker::link(
        &resolution,
        &mut contexts.contexts,
        &contexts.context_for_name,
    );

    let roots: IndexSet<_> = resolution.root_ids().iter().cloned().collect();
    let configuration = Configuration::new(roots, contexts.contexts, contexts.context_for_name);
    info!(
        "Configured {} module(s) into {} context(s)",
        resolution.len(),
        configuration.len()
    );
    Ok(configuration)
}

/// Search paths of a module the configurator does not own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLocation {
    #[serde(default)]
    pub source_path: Vec<PathBuf>,
    #[serde(default)]
    pub class_path: Vec<PathBuf>,
}

/// The unnamed module of a compilation: its requires seed the roots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnnamedModule {
    #[serde(default)]
    pub requires: Vec<ModuleIdQuery>,
    #[serde(default)]
    pub location: ModuleLocation,
}

/// A root handed to [`ModuleResolver::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootModule {
    Named(ModuleIdQuery),
    Unnamed(UnnamedModule),
}

/// Modules to load for a set of roots
#[derive(Debug, Clone)]
pub struct ResolvedModules {
    /// Unnamed roots, as given
    pub unnamed: Vec<UnnamedModule>,
    pub configuration: Configuration,
    /// Selected modules, dependents first
    pub modules: Vec<Arc<ModuleInfo>>,
}

/// Resolves compilation roots against a fixed catalog
pub struct ModuleResolver {
    catalog: Arc<dyn Catalog>,
    config: ResolverConfig,
}

impl ModuleResolver {
    pub fn new(catalog: Arc<dyn Catalog>, config: ResolverConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(&self, roots: &[RootModule]) -> Result<ResolvedModules> {
        let mut queries: Vec<ModuleIdQuery> = Vec::new();
        let mut unnamed = Vec::new();
        for root in roots {
            match root {
                RootModule::Named(query) => queries.push(query.clone()),
                RootModule::Unnamed(module) => {
                    queries.extend(module.requires.iter().cloned());
                    unnamed.push(module.clone());
                }
            }
        }
        debug!(
            "{} root queries, {} unnamed module(s)",
            queries.len(),
            unnamed.len()
        );

        let configuration = configure_paths(self.catalog.as_ref(), &queries, &self.config)?;
        let modules = configuration
            .ordered_contexts()
            .into_iter()
            .flat_map(|cx| cx.modules().cloned())
            .collect();
        Ok(ResolvedModules {
            unnamed,
            configuration,
            modules,
        })
    }
}
