//! Resolver error types

use modsys_core::{DirectiveError, ModuleError, ModuleId, ModuleIdQuery, ParseError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolutionError>;

/// Failures reading or writing a catalog's backing store
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed module info at {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Catalog {catalog}: {message}")]
    Inconsistent { catalog: String, message: String },

    #[error("Invalid module declaration: {0}")]
    Declaration(#[from] ModuleError),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The structural problem behind a configuration conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// A module of this name is already resolved to an id the query rejects
    Version {
        query: ModuleIdQuery,
        resolved: ModuleId,
    },
    /// The supplying view does not permit the requester
    NotPermitted { requester: ModuleId, view: ModuleId },
    /// A candidate answers to a name already claimed by another module
    NameCollision {
        name: String,
        existing: ModuleId,
        candidate: ModuleId,
    },
    /// Two contexts claim the same module name
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
    /// A module declaration is structurally invalid
    Directive(DirectiveError),
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::Version { query, resolved } => {
                write!(f, "{query} conflicts with previously resolved {resolved}")
            }
            Conflict::NotPermitted { requester, view } => {
                write!(f, "{view} does not permit {requester}")
            }
            Conflict::NameCollision {
                name,
                existing,
                candidate,
            } => write!(f, "{candidate} reuses name {name} already taken by {existing}"),
            Conflict::DuplicateName {
                name,
                first,
                second,
            } => write!(f, "module {name} claimed by contexts {first} and {second}"),
            Conflict::Directive(e) => write!(f, "{e}"),
        }
    }
}

fn render_chain(chain: &[ModuleId]) -> String {
    if chain.is_empty() {
        return String::new();
    }
    let hops: Vec<String> = chain.iter().map(ToString::to_string).collect();
    format!(" (required by {})", hops.join(" -> "))
}

/// Errors that abort a resolution request
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A non-optional query has no acceptable catalog entry
    #[error("Module not found: {query}{}", render_chain(.chain))]
    ModuleNotFound {
        query: ModuleIdQuery,
        /// Requiring modules, root first
        chain: Vec<ModuleId>,
    },

    #[error("Configuration conflict: {conflict}{}", render_chain(.chain))]
    ConfigurationConflict {
        conflict: Conflict,
        /// Requiring modules, root first
        chain: Vec<ModuleId>,
    },

    #[error("No implementations of service {service}, required by {module}")]
    MissingService { service: String, module: ModuleId },

    #[error("Catalog read failed: {0}")]
    CatalogRead(CatalogError),

    #[error("Resolution gave up after {limit} search steps")]
    SearchLimitExceeded { limit: usize },

    #[error("Invalid resolver configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl From<ModuleError> for ResolutionError {
    fn from(e: ModuleError) -> Self {
        match e {
            ModuleError::Parse(p) => ResolutionError::Parse(p),
            ModuleError::Directive(d) => ResolutionError::ConfigurationConflict {
                conflict: Conflict::Directive(d),
                chain: Vec::new(),
            },
        }
    }
}

impl From<CatalogError> for ResolutionError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Declaration(m) => m.into(),
            other => ResolutionError::CatalogRead(other),
        }
    }
}
