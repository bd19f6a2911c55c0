//! Resolver configuration

use crate::error::{ResolutionError, Result};
use modsys_core::ModuleIdQuery;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Query text of the implicit base module every module requires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_module: Option<String>,

    /// Synthesize optional edges toward service providers
    #[serde(default = "default_resolve_services")]
    pub resolve_services: bool,

    /// Upper bound on resolver search steps
    #[serde(default = "default_max_search_steps")]
    pub max_search_steps: usize,

    /// Library directory used when none is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_path: Option<PathBuf>,
}

fn default_resolve_services() -> bool {
    true
}

fn default_max_search_steps() -> usize {
    100_000
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_module: None,
            resolve_services: default_resolve_services(),
            max_search_steps: default_max_search_steps(),
            library_path: None,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from the default location, or defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                return Self::from_file(&config_path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("modsys").join("resolver.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_search_steps == 0 {
            return Err(ResolutionError::InvalidConfig(
                "max_search_steps must be positive".to_string(),
            ));
        }
        self.base_query()?;
        Ok(())
    }

    /// The parsed base module query, if configured
    pub fn base_query(&self) -> Result<Option<ModuleIdQuery>> {
        match &self.base_module {
            Some(text) => ModuleIdQuery::parse(text).map(Some).map_err(|e| {
                ResolutionError::InvalidConfig(format!("base_module: {e}"))
            }),
            None => Ok(None),
        }
    }
}
