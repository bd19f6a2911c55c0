//! Command implementations

use anyhow::{bail, Context, Result};
use modsys_core::{ModuleDeclaration, ModuleIdQuery};
use modsys_resolver::{
    configure_paths, AccessChecker, Catalog, Configuration, LibraryCatalog, LocalCatalog,
    ResolverConfig,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Where module definitions come from
pub struct Sources<'a> {
    pub library: Option<&'a Path>,
    pub modules: Option<&'a Path>,
}

pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
    let config = match path {
        Some(path) => ResolverConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ResolverConfig::load()?,
    };
    debug!("Using config: {:?}", config);
    Ok(config)
}

fn open_library(
    config: &ResolverConfig,
    library: Option<&Path>,
) -> Result<Option<LibraryCatalog>> {
    let Some(root) = library.or(config.library_path.as_deref()) else {
        return Ok(None);
    };
    let catalog = LibraryCatalog::open(root)
        .with_context(|| format!("Failed to open library {}", root.display()))?;
    Ok(Some(catalog))
}

fn open_catalog(config: &ResolverConfig, sources: &Sources<'_>) -> Result<Arc<dyn Catalog>> {
    let library = open_library(config, sources.library)?;

    let Some(path) = sources.modules else {
        return match library {
            Some(library) => Ok(Arc::new(library)),
            None => bail!("No library given; use --library or set library_path in the config"),
        };
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let declarations: Vec<ModuleDeclaration> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse module declarations in {}", path.display()))?;
    let base = config.base_query()?;
    let name = path.display().to_string();
    let mut catalog = LocalCatalog::from_declarations(name, &declarations, base.as_ref())?;
    if let Some(library) = library {
        catalog = catalog.with_parent(Arc::new(library));
    }
    info!("Loaded {} module declaration(s)", catalog.len());
    Ok(Arc::new(catalog))
}

fn parse_roots(roots: &[String]) -> Result<Vec<ModuleIdQuery>> {
    roots
        .iter()
        .map(|root| {
            ModuleIdQuery::parse(root).with_context(|| format!("Invalid root module query: {root}"))
        })
        .collect()
}

fn configure(
    config: &ResolverConfig,
    sources: &Sources<'_>,
    roots: &[String],
) -> Result<Configuration> {
    let catalog = open_catalog(config, sources)?;
    let roots = parse_roots(roots)?;
    let configuration = configure_paths(catalog.as_ref(), &roots, config)?;
    Ok(configuration)
}

/// Print the ids in a library, optionally only those of one module
pub fn list(
    config: &ResolverConfig,
    library: Option<&Path>,
    name: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let Some(catalog) = open_library(config, library)? else {
        bail!("No library given; use --library or set library_path in the config");
    };
    for id in catalog.gather_module_ids(name)? {
        writeln!(out, "{id}")?;
    }
    Ok(())
}

pub fn resolve(
    config: &ResolverConfig,
    sources: &Sources<'_>,
    roots: &[String],
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let configuration = configure(config, sources, roots)?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &configuration)?;
        writeln!(out)?;
    } else {
        configuration.dump(out)?;
    }
    Ok(())
}

/// Report whether `class` is accessible from `from`; returns the answer
pub fn access(
    config: &ResolverConfig,
    sources: &Sources<'_>,
    roots: &[String],
    from: &str,
    class: &str,
    out: &mut impl Write,
) -> Result<bool> {
    let configuration = configure(config, sources, roots)?;
    if configuration.module(from).is_none() {
        bail!("Module {from} is not part of the configuration");
    }

    let checker = AccessChecker::new(&configuration);
    let accessible = checker.is_accessible_to(class, from);
    let package = class.rsplit_once('.').map_or("", |(package, _)| package);
    match checker.owner(package) {
        Some(owner) if accessible => {
            writeln!(out, "{class} (from {owner}) is accessible to {from}")?
        }
        Some(owner) => writeln!(out, "{class} (from {owner}) is not accessible to {from}")?,
        None => writeln!(out, "{class}: no module defines package {package:?}")?,
    }
    Ok(accessible)
}
