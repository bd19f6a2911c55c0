//! Require edges between modules

use crate::module_id::ModuleIdQuery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Modifiers on a require edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// The target's exports are re-exported to the requirer's own dependents
    Public,
    /// Absence of the target is not an error
    Optional,
    /// The requirer and target share an implementation context
    Local,
    /// Injected by the module system, not declared
    Synthetic,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modifier::Public => "public",
            Modifier::Optional => "optional",
            Modifier::Local => "local",
            Modifier::Synthetic => "synthetic",
        })
    }
}

/// A module dependence: modifiers plus a target query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependence {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    modifiers: BTreeSet<Modifier>,
    query: ModuleIdQuery,
}

impl Dependence {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, query: ModuleIdQuery) -> Self {
        Dependence {
            modifiers: modifiers.into_iter().collect(),
            query,
        }
    }

    /// A dependence with no modifiers
    pub fn plain(query: ModuleIdQuery) -> Self {
        Dependence {
            modifiers: BTreeSet::new(),
            query,
        }
    }

    pub fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    pub fn query(&self) -> &ModuleIdQuery {
        &self.query
    }

    pub fn is_optional(&self) -> bool {
        self.modifiers.contains(&Modifier::Optional)
    }

    pub fn is_local(&self) -> bool {
        self.modifiers.contains(&Modifier::Local)
    }

    pub fn is_public(&self) -> bool {
        self.modifiers.contains(&Modifier::Public)
    }

    pub fn is_synthetic(&self) -> bool {
        self.modifiers.contains(&Modifier::Synthetic)
    }
}

impl fmt::Display for Dependence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("requires")?;
        for m in &self.modifiers {
            write!(f, " {m}")?;
        }
        write!(f, " {}", self.query)
    }
}

/// A service requirement: `requires service S`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceDependence {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    modifiers: BTreeSet<Modifier>,
    service: String,
}

impl ServiceDependence {
    pub fn new(modifiers: impl IntoIterator<Item = Modifier>, service: impl Into<String>) -> Self {
        ServiceDependence {
            modifiers: modifiers.into_iter().collect(),
            service: service.into(),
        }
    }

    pub fn modifiers(&self) -> &BTreeSet<Modifier> {
        &self.modifiers
    }

    /// Fully qualified service interface name
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_optional(&self) -> bool {
        self.modifiers.contains(&Modifier::Optional)
    }
}

impl fmt::Display for ServiceDependence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("requires")?;
        for m in &self.modifiers {
            write!(f, " {m}")?;
        }
        write!(f, " service {}", self.service)
    }
}
