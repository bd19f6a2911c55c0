//! Modsys module resolver
//!
//! This crate turns a set of root module queries into a path configuration:
//! - Catalogs of module metadata (in-memory and directory-backed)
//! - Version-aware resolution with backtracking over candidates
//! - Partitioning into path contexts, merging dependency cycles
//! - Linking contexts, including public re-exports
//! - Dependency ordering of contexts (Tarjan)
//! - Class accessibility checks over a configuration

pub mod catalog;
pub mod config;
pub mod configuration;
pub mod configurator;
mod context;
pub mod error;
pub mod library;
mod linker;
pub mod resolver;
pub mod tarjan;
pub mod visibility;

pub use catalog::{Catalog, CatalogResult, LocalCatalog};
pub use config::ResolverConfig;
pub use configuration::{Configuration, PathContext};
pub use configurator::{
    configure_paths, ModuleLocation, ModuleResolver, ResolvedModules, RootModule, UnnamedModule,
};
pub use error::{CatalogError, Conflict, ResolutionError, Result};
pub use library::LibraryCatalog;
pub use resolver::{resolve, Resolution, Supplier};
pub use tarjan::Components;
pub use visibility::AccessChecker;
